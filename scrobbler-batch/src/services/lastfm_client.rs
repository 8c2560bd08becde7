//! Last.fm API client
//!
//! Submits listens through the `track.scrobble` method of the Last.fm 2.0 web
//! service (or a compatible endpoint such as Libre.fm). Every call is signed
//! with `api_sig`: the MD5 of the alphabetically sorted `name + value` pairs
//! followed by the shared secret.

use crate::models::ListenEvent;
use crate::services::{SubmissionClient, SubmitError};
use async_trait::async_trait;
use md5::{Digest, Md5};
use scrobbler_common::config::{Credentials, SessionAuth};
use serde_json::Value;
use std::time::Duration;

pub const LASTFM_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";
const USER_AGENT: &str = concat!("scrobbler-batch/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Statuses reported as server errors regardless of the response body
const SERVER_FAILURE_STATUSES: [u16; 3] = [500, 502, 503];

/// `ignoredMessage` code for the daily scrobble cap
const IGNORED_DAILY_LIMIT: u64 = 5;

/// Last.fm API client
pub struct LastFmClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    session_key: String,
}

impl LastFmClient {
    pub fn new(api_key: String, api_secret: String, session_key: String) -> Result<Self, SubmitError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SubmitError::Unexpected(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: LASTFM_API_URL.to_string(),
            api_key,
            api_secret,
            session_key,
        })
    }

    /// Point the client at a different API root (e.g. `https://libre.fm/2.0/`)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build a client from resolved credentials
    ///
    /// With a username/password pair, exchanges them for a session key first.
    pub async fn connect(
        credentials: &Credentials,
        base_url: Option<&str>,
    ) -> Result<Self, SubmitError> {
        let mut client = Self::new(
            credentials.api_key.clone(),
            credentials.api_secret.clone(),
            String::new(),
        )?;
        if let Some(url) = base_url {
            client = client.with_base_url(url);
        }

        client.session_key = match &credentials.auth {
            SessionAuth::SessionKey(key) => key.clone(),
            SessionAuth::Password { username, password } => {
                client.mobile_session(username, password).await?
            }
        };

        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Obtain a session key via `auth.getMobileSession`
    pub async fn mobile_session(&self, username: &str, password: &str) -> Result<String, SubmitError> {
        let params = vec![
            ("method", "auth.getMobileSession".to_string()),
            ("username", username.to_string()),
            ("password", password.to_string()),
            ("api_key", self.api_key.clone()),
        ];

        let response = self.call(params).await?;
        let key = parse_session_key(&response)?;

        tracing::info!(username = %username, "Obtained Last.fm session");
        Ok(key)
    }

    fn scrobble_params(&self, event: &ListenEvent) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("method", "track.scrobble".to_string()),
            ("artist", event.artist_name.clone()),
            ("track", event.track_name.clone()),
            ("timestamp", event.timestamp.to_string()),
            ("api_key", self.api_key.clone()),
            ("sk", self.session_key.clone()),
        ];
        if !event.album_name.is_empty() {
            params.push(("album", event.album_name.clone()));
        }
        params
    }

    /// Sign and POST one API call, returning the decoded JSON body
    async fn call(&self, mut params: Vec<(&'static str, String)>) -> Result<Value, SubmitError> {
        let signature = api_signature(&params, &self.api_secret);
        params.push(("api_sig", signature));
        params.push(("format", "json".to_string()));

        let response = self
            .http_client
            .post(&self.base_url)
            .form(&params)
            .send()
            .await
            .map_err(SubmitError::from_transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(SubmitError::from_transport)?;

        interpret_body(status, &body)
    }
}

#[async_trait]
impl SubmissionClient for LastFmClient {
    async fn submit(&self, event: &ListenEvent) -> Result<(), SubmitError> {
        let response = self.call(self.scrobble_params(event)).await?;
        interpret_scrobble_response(&response)
    }
}

/// Compute `api_sig` for a parameter set
///
/// `format` and `callback` are excluded, as the service requires.
pub fn api_signature(params: &[(&str, String)], secret: &str) -> String {
    let mut signed: Vec<&(&str, String)> = params
        .iter()
        .filter(|(name, _)| *name != "format" && *name != "callback")
        .collect();
    signed.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Md5::new();
    for (name, value) in signed {
        hasher.update(name.as_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.update(secret.as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Classify a raw HTTP response
///
/// A 500/502/503 status is always a server error, with any service error payload
/// folded into its message. Otherwise a service error payload
/// (`{"error": N, "message": ...}`) takes precedence over the HTTP status, other
/// non-2xx statuses are server errors, and an undecodable 2xx body is malformed.
pub fn interpret_body(status: u16, body: &str) -> Result<Value, SubmitError> {
    let parsed: Result<Value, _> = serde_json::from_str(body);
    let payload = match &parsed {
        Ok(value) => service_error(value)?,
        Err(_) => None,
    };

    if SERVER_FAILURE_STATUSES.contains(&status) {
        let message = match payload {
            Some((code, message)) => format!("Last.fm error {}: {}", code, message),
            None => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        };
        return Err(SubmitError::Server { status, message });
    }

    if let Some((code, message)) = payload {
        return Err(SubmitError::from_service_code(code, message));
    }

    if !(200..300).contains(&status) {
        return Err(SubmitError::Server {
            status,
            message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    parsed.map_err(|e| SubmitError::MalformedResponse(e.to_string()))
}

/// Service error code and message, if the body carries an error payload
fn service_error(value: &Value) -> Result<Option<(u32, String)>, SubmitError> {
    let code = match as_count(value.get("error")) {
        Some(code) => code,
        None => return Ok(None),
    };
    let code = u32::try_from(code).map_err(|_| {
        SubmitError::MalformedResponse(format!("error code out of range: {}", code))
    })?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(Some((code, message)))
}

/// Check a decoded `track.scrobble` response for ignored scrobbles
pub fn interpret_scrobble_response(value: &Value) -> Result<(), SubmitError> {
    let scrobbles = value
        .get("scrobbles")
        .ok_or_else(|| SubmitError::MalformedResponse("missing 'scrobbles' element".to_string()))?;

    let ignored = as_count(scrobbles.get("@attr").and_then(|attr| attr.get("ignored"))).unwrap_or(0);
    if ignored == 0 {
        return Ok(());
    }

    let scrobble = match scrobbles.get("scrobble") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    let ignored_message = scrobble.and_then(|s| s.get("ignoredMessage"));
    let code = as_count(ignored_message.and_then(|m| m.get("code"))).unwrap_or(0);
    let text = ignored_message
        .and_then(|m| m.get("#text"))
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ignored_reason(code).to_string());

    if code == IGNORED_DAILY_LIMIT {
        Err(SubmitError::RateLimited(text))
    } else {
        Err(SubmitError::Rejected(text))
    }
}

fn ignored_reason(code: u64) -> &'static str {
    match code {
        1 => "Artist was ignored",
        2 => "Track was ignored",
        3 => "Timestamp was too old",
        4 => "Timestamp was too new",
        5 => "Daily scrobble limit exceeded",
        _ => "Scrobble ignored by service",
    }
}

fn parse_session_key(value: &Value) -> Result<String, SubmitError> {
    value
        .get("session")
        .and_then(|s| s.get("key"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SubmitError::MalformedResponse("missing session key".to_string()))
}

/// Last.fm encodes counters as either numbers or numeric strings
fn as_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
