//! Google OAuth for the Sheets API
//!
//! The token file uses the same layout as the Python client's `token.json`,
//! so an existing token keeps working. Deleting it forces a new consent.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::config::AuthConfig;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// Tokens this close to expiry are refreshed early
const EXPIRY_SKEW_SECS: i64 = 60;

/// Contents of `token.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

impl StoredToken {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read token: {}", path.display()))?;
        let token = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse token: {}", path.display()))?;
        Ok(Some(token))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write token: {}", path.display()))?;
        Ok(())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let expiry = self.expiry.as_deref()?;
        DateTime::parse_from_rfc3339(expiry)
            .map(|t| t.with_timezone(&Utc))
            .or_else(|_| {
                // Python writes naive UTC timestamps without an offset
                chrono::NaiveDateTime::parse_from_str(expiry, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|t| t.and_utc())
            })
            .ok()
    }

    /// Usable as-is at `now`. A token without an expiry never expires.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_empty() {
            return false;
        }
        match self.expires_at() {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_SKEW_SECS) > now,
            None => self.expiry.is_none(),
        }
    }

    fn apply(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.token = response.access_token;
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self.expiry = response.expires_in.map(|secs| {
            (now + Duration::seconds(secs)).to_rfc3339_opts(SecondsFormat::Micros, true)
        });
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// `credentials.json` as downloaded from the Google Cloud console
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: ClientSecrets,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Return a valid access token, refreshing or re-authorizing as needed
pub fn obtain_access_token(client: &Client, auth: &AuthConfig) -> Result<String> {
    let now = Utc::now();

    if let Some(mut token) = StoredToken::load(&auth.token_path)? {
        if token.is_valid(now) {
            log::debug!("Using stored access token");
            return Ok(token.token);
        }
        if let Some(refresh_token) = token.refresh_token.clone() {
            log::info!("Refreshing expired access token");
            let response = request_token(
                client,
                &token.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                    ("client_id", token.client_id.as_str()),
                    ("client_secret", token.client_secret.as_str()),
                ],
            )?;
            token.apply(response, now);
            token.save(&auth.token_path)?;
            return Ok(token.token);
        }
    }

    let secrets = load_client_secrets(&auth.credentials_path)?;
    let token = authorize_interactively(client, &secrets, &auth.scope)?;
    token.save(&auth.token_path)?;
    log::info!("Saved new token to {}", auth.token_path.display());
    Ok(token.token)
}

fn load_client_secrets(path: &Path) -> Result<ClientSecrets> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read OAuth client secrets: {}. Download them from the Google Cloud console.",
            path.display()
        )
    })?;
    let file: ClientSecretsFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse OAuth client secrets: {}", path.display()))?;
    Ok(file.installed)
}

/// Installed-app consent: the user opens the URL, approves, and pastes back
/// the redirected address (or just its `code` parameter).
fn authorize_interactively(client: &Client, secrets: &ClientSecrets, scope: &str) -> Result<StoredToken> {
    let redirect_uri = secrets
        .redirect_uris
        .first()
        .map(String::as_str)
        .unwrap_or(DEFAULT_REDIRECT_URI);
    let consent_url = Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )?;

    println!("Open this URL to authorize access to your spreadsheets:\n\n  {}\n", consent_url);
    print!("Paste the address you were redirected to: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let Some(code) = extract_code(&input) else {
        bail!("No authorization code found in the pasted input");
    };

    let response = request_token(
        client,
        &secrets.token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ],
    )?;

    let mut token = StoredToken {
        token: String::new(),
        refresh_token: None,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: vec![scope.to_string()],
        expiry: None,
    };
    token.apply(response, Utc::now());
    Ok(token)
}

fn request_token(client: &Client, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .with_context(|| format!("Failed to reach token endpoint: {}", token_uri))?;
    log::debug!("{} {}", response.status(), response.url());

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        bail!("Token request failed with {}: {}", status, body);
    }
    response.json().context("Failed to parse token response")
}

/// The `code` query parameter of a redirect URL, or the input itself
fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned()),
        Err(_) => Some(input.to_string()),
    }
}
