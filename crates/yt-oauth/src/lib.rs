//! OAuth 2.0 authentication for the YouTube Data API.
//!
//! Credentials come from a Google "installed application" client secrets
//! file. The grant obtained on first consent is cached on disk through a
//! [`TokenStore`], so every later run is non-interactive.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default OAuth callback port
pub const OAUTH_CALLBACK_PORT: u16 = 8080;

/// Scope needed to list and delete comments.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("failed to read client secrets file '{}': {source}", .path.display())]
    SecretsRead { path: PathBuf, source: std::io::Error },

    #[error("failed to parse client secrets file '{}': {source}", .path.display())]
    SecretsParse { path: PathBuf, source: serde_json::Error },

    #[error("failed to read token file '{}': {source}", .path.display())]
    TokenRead { path: PathBuf, source: std::io::Error },

    #[error("failed to parse token file '{}': {source}", .path.display())]
    TokenParse { path: PathBuf, source: serde_json::Error },

    #[error("failed to write token file '{}': {source}", .path.display())]
    TokenWrite { path: PathBuf, source: std::io::Error },

    #[error("failed to encode token: {0}")]
    TokenEncode(serde_json::Error),

    #[error("failed to read authorization code from stdin: {0}")]
    CodeInput(std::io::Error),

    #[error("no authorization code entered")]
    EmptyCode,

    #[error("token endpoint returned status {status}: {body}")]
    TokenEndpoint {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("token response missing field '{0}'")]
    MissingTokenField(&'static str),

    #[error("failed to bind the callback listener: {0}")]
    CallbackBind(std::io::Error),

    #[error("authorization timed out waiting for the browser callback")]
    CallbackTimeout,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Google client secrets file, installed-application flavor.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub installed: InstalledApp,
}

/// The nested `installed` block of the client secrets file.
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    pub client_secret: String,
    /// Authorization endpoint; Google's unless the file says otherwise.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint; Google's unless the file says otherwise.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl ClientSecrets {
    /// Load and parse the client secrets file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AuthError::SecretsRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| AuthError::SecretsParse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// OAuth configuration
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI sent with the authorization request
    pub redirect_uri: String,
    /// OAuth scope(s)
    pub scope: String,
    /// Authorization endpoint
    pub auth_uri: String,
    /// Token endpoint
    pub token_uri: String,
}

impl OAuthConfig {
    /// Build a configuration from an installed-app descriptor, using its
    /// first registered redirect URI and the comment-management scope.
    pub fn from_secrets(secrets: &ClientSecrets) -> Self {
        let app = &secrets.installed;
        let redirect_uri = app.redirect_uris.first().cloned().unwrap_or_else(|| {
            format!("http://localhost:{}/oauth2callback", OAUTH_CALLBACK_PORT)
        });
        Self {
            client_id: app.client_id.clone(),
            client_secret: app.client_secret.clone(),
            redirect_uri,
            scope: YOUTUBE_SCOPE.to_string(),
            auth_uri: app.auth_uri.clone(),
            token_uri: app.token_uri.clone(),
        }
    }
}

/// OAuth 2.0 token information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Access token for API requests
    pub access_token: String,
    /// Refresh token for getting new access tokens
    pub refresh_token: String,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// Expiry time as Unix timestamp (seconds since epoch)
    pub expires_at: u64,
}

impl OAuthToken {
    /// Check if the token is expired or will expire soon (within 60 seconds)
    pub fn is_expired(&self) -> bool {
        // Consider token expired if it expires within 60 seconds
        unix_now() + 60 >= self.expires_at
    }
}

/// Handle to the on-disk grant file.
///
/// All reads and writes of the cached grant go through this store; nothing
/// else touches the file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a cached grant exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the cached grant. The contents are trusted as-is; expiry is not
    /// checked here.
    pub fn load(&self) -> Result<OAuthToken, AuthError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| AuthError::TokenRead {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| AuthError::TokenParse {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Save the grant with secure permissions.
    pub fn save(&self, token: &OAuthToken) -> Result<(), AuthError> {
        let content = serde_json::to_string_pretty(token).map_err(AuthError::TokenEncode)?;

        std::fs::write(&self.path, content).map_err(|e| AuthError::TokenWrite {
            path: self.path.clone(),
            source: e,
        })?;

        // Owner read/write only on Unix-like systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, permissions).map_err(|e| {
                AuthError::TokenWrite {
                    path: self.path.clone(),
                    source: e,
                }
            })?;
        }

        Ok(())
    }
}

/// Holds the live grant and refreshes the access token when it goes stale.
pub struct OAuthManager {
    config: OAuthConfig,
    token: OAuthToken,
}

impl OAuthManager {
    pub fn new(config: OAuthConfig, token: OAuthToken) -> Self {
        Self { config, token }
    }

    pub fn token(&self) -> &OAuthToken {
        &self.token
    }

    /// Get a valid access token, refreshing in memory if the cached one has
    /// expired. The grant file is not rewritten on refresh.
    pub async fn get_access_token(&mut self) -> Result<String, AuthError> {
        if self.token.is_expired() {
            log::info!("Access token expired, refreshing...");
            self.refresh().await?;
        }
        Ok(self.token.access_token.clone())
    }

    /// Refresh the access token using the refresh token
    async fn refresh(&mut self) -> Result<(), AuthError> {
        let client = reqwest::Client::new();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.token.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = client
            .post(&self.config.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(AuthError::TokenEndpoint { status, body });
        }

        let body: serde_json::Value = response.json().await?;
        // The refresh response usually omits the refresh token; keep the
        // existing one in that case.
        self.token = token_from_response(&body, Some(&self.token.refresh_token))?;

        log::info!("OAuth token refreshed");
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Build an [`OAuthToken`] from a token-endpoint response body.
fn token_from_response(
    body: &serde_json::Value,
    existing_refresh: Option<&str>,
) -> Result<OAuthToken, AuthError> {
    let access_token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or(AuthError::MissingTokenField("access_token"))?
        .to_string();

    let refresh_token = match body.get("refresh_token").and_then(|v| v.as_str()) {
        Some(token) => token.to_string(),
        None => existing_refresh
            .ok_or(AuthError::MissingTokenField("refresh_token"))?
            .to_string(),
    };

    let expires_in = body
        .get("expires_in")
        .and_then(|v| v.as_u64())
        .ok_or(AuthError::MissingTokenField("expires_in"))?;

    Ok(OAuthToken {
        access_token,
        refresh_token,
        token_type: body
            .get("token_type")
            .and_then(|v| v.as_str())
            .unwrap_or("Bearer")
            .to_string(),
        expires_at: unix_now() + expires_in,
    })
}

/// Generate PKCE verifier and challenge
pub fn generate_pkce() -> (String, String) {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use rand::Rng;
    use rand::distributions::Alphanumeric;
    use sha2::{Digest, Sha256};

    // Generate random verifier (43-128 characters) using cryptographically secure RNG
    let verifier: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();

    // Generate challenge: base64url(SHA256(verifier))
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let hash = hasher.finalize();
    let challenge = URL_SAFE_NO_PAD.encode(hash);

    (verifier, challenge)
}

/// Generate authorization URL
pub fn generate_auth_url(config: &OAuthConfig) -> (String, String) {
    let (verifier, challenge) = generate_pkce();

    let auth_url = format!(
        "{}?\
        client_id={}&\
        redirect_uri={}&\
        response_type=code&\
        scope={}&\
        code_challenge={}&\
        code_challenge_method=S256&\
        access_type=offline&\
        prompt=consent",
        config.auth_uri,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scope),
        urlencoding::encode(&challenge),
    );

    (auth_url, verifier)
}

/// Exchange authorization code for tokens
pub async fn exchange_code(
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<OAuthToken, AuthError> {
    log::info!("Exchanging authorization code for tokens...");

    let client = reqwest::Client::new();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("code_verifier", verifier),
        ("grant_type", "authorization_code"),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];

    let response = client
        .post(&config.token_uri)
        .form(&params)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await?;
        return Err(AuthError::TokenEndpoint { status, body });
    }

    let body: serde_json::Value = response.json().await?;
    let token = token_from_response(&body, None)?;

    log::info!("Successfully obtained OAuth tokens");
    Ok(token)
}

/// Obtain a credential, interactively if no cached grant exists.
///
/// With a cached grant the call is non-interactive: the file is loaded
/// directly and returned without any validity check or consent prompt.
/// Otherwise the authorization URL is printed, one line containing the
/// grant code is read from stdin, the code is exchanged, and the resulting
/// grant is persisted through `store` before returning.
pub async fn authorize(config: &OAuthConfig, store: &TokenStore) -> Result<OAuthManager, AuthError> {
    if store.exists() {
        let token = store.load()?;
        log::debug!("Loaded cached grant from {}", store.path().display());
        return Ok(OAuthManager::new(config.clone(), token));
    }

    let (auth_url, verifier) = generate_auth_url(config);

    eprintln!("Authorize this app by visiting this URL:\n{}", auth_url);
    eprint!("Enter the code from that page here: ");

    let mut code = String::new();
    std::io::stdin()
        .read_line(&mut code)
        .map_err(AuthError::CodeInput)?;
    let code = code.trim();
    if code.is_empty() {
        return Err(AuthError::EmptyCode);
    }

    let token = exchange_code(config, code, &verifier).await?;
    store.save(&token)?;
    log::info!("Token stored to {}", store.path().display());

    Ok(OAuthManager::new(config.clone(), token))
}

/// Start OAuth flow with a local callback server instead of a console
/// prompt. Used by the `yt-oauth-helper` binary.
pub async fn start_auth_flow(config: &OAuthConfig) -> Result<OAuthToken, AuthError> {
    use std::sync::Arc;
    use tokio::sync::Mutex;

    let (auth_url, verifier) = generate_auth_url(config);

    eprintln!("\n=================================================");
    eprintln!("OAuth 2.0 Authorization Required");
    eprintln!("=================================================");
    eprintln!("\nPlease visit the following URL to authorize the application:\n");
    eprintln!("{}\n", auth_url);
    eprintln!("Waiting for authorization...");
    eprintln!("=================================================\n");

    // Shared state for callback
    let code_receiver = Arc::new(Mutex::new(None::<String>));
    let code_receiver_clone = code_receiver.clone();

    // Create callback handler
    use axum::{
        Router,
        extract::Query,
        response::{Html, IntoResponse},
        routing::get,
    };

    #[derive(Deserialize)]
    struct AuthCallback {
        code: Option<String>,
        error: Option<String>,
    }

    let callback_handler = move |Query(params): Query<AuthCallback>| async move {
        if let Some(error) = params.error {
            return Html(format!(
                "<html><body><h1>Authorization Failed</h1><p>Error: {}</p>\
                <p>You can close this window.</p></body></html>",
                error
            ))
            .into_response();
        }

        if let Some(code) = params.code {
            *code_receiver_clone.lock().await = Some(code);
            return Html(
                "<html><body><h1>Authorization Successful!</h1>\
                <p>You can close this window and return to the application.</p></body></html>",
            )
            .into_response();
        }

        Html("<html><body><h1>Authorization Failed</h1><p>No code received</p></body></html>")
            .into_response()
    };

    let app = Router::new().route("/oauth2callback", get(callback_handler));

    // Start server
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", OAUTH_CALLBACK_PORT))
        .await
        .map_err(AuthError::CallbackBind)?;
    let server = axum::serve(listener, app);

    // Run server until we get a code
    let server_handle = tokio::spawn(async move {
        server.await.ok();
    });

    // Wait for authorization code (with timeout)
    let timeout = tokio::time::Duration::from_secs(300); // 5 minutes
    let start = tokio::time::Instant::now();

    let code = loop {
        if start.elapsed() > timeout {
            server_handle.abort();
            return Err(AuthError::CallbackTimeout);
        }

        let code_opt = code_receiver.lock().await.clone();
        if let Some(code) = code_opt {
            break code;
        }

        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
    };

    // Stop server
    server_handle.abort();

    // Exchange code for tokens
    exchange_code(config, &code, &verifier).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_token(expires_at: u64) -> OAuthToken {
        OAuthToken {
            access_token: "ya29.sample-access".to_string(),
            refresh_token: "1//sample-refresh".to_string(),
            token_type: "Bearer".to_string(),
            expires_at,
        }
    }

    #[test]
    fn secrets_parse_full_descriptor() {
        let raw = r#"{
            "installed": {
                "client_id": "abc.apps.googleusercontent.com",
                "project_id": "sweeper-test",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "shh",
                "redirect_uris": ["http://localhost"]
            }
        }"#;
        let secrets: ClientSecrets = serde_json::from_str(raw).unwrap();
        assert_eq!(secrets.installed.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(secrets.installed.client_secret, "shh");
        assert_eq!(secrets.installed.redirect_uris, vec!["http://localhost"]);

        let config = OAuthConfig::from_secrets(&secrets);
        assert_eq!(config.redirect_uri, "http://localhost");
        assert_eq!(config.scope, YOUTUBE_SCOPE);
        assert_eq!(config.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn secrets_parse_fills_endpoint_defaults() {
        let raw = r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#;
        let secrets: ClientSecrets = serde_json::from_str(raw).unwrap();
        assert_eq!(
            secrets.installed.auth_uri,
            "https://accounts.google.com/o/oauth2/v2/auth"
        );
        assert_eq!(
            secrets.installed.token_uri,
            "https://oauth2.googleapis.com/token"
        );

        // No registered redirect URIs: fall back to the local callback.
        let config = OAuthConfig::from_secrets(&secrets);
        assert_eq!(config.redirect_uri, "http://localhost:8080/oauth2callback");
    }

    #[test]
    fn token_expiry_window() {
        assert!(!sample_token(unix_now() + 3600).is_expired());
        // Expiring within the 60 second margin counts as expired.
        assert!(sample_token(unix_now() + 30).is_expired());
        assert!(sample_token(unix_now().saturating_sub(10)).is_expired());
    }

    #[test]
    fn token_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert!(!store.exists());

        let token = sample_token(1_900_000_000);
        store.save(&token).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.access_token, token.access_token);
        assert_eq!(loaded.refresh_token, token.refresh_token);
        assert_eq!(loaded.expires_at, token.expires_at);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn token_store_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(AuthError::TokenRead { .. })));
    }

    #[test]
    fn token_from_full_response() {
        let body = json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "token_type": "Bearer",
            "expires_in": 3599
        });
        let token = token_from_response(&body, None).unwrap();
        assert_eq!(token.access_token, "new-access");
        assert_eq!(token.refresh_token, "new-refresh");
        assert!(token.expires_at > unix_now());
    }

    #[test]
    fn token_from_refresh_response_keeps_refresh_token() {
        let body = json!({
            "access_token": "refreshed-access",
            "expires_in": 3599
        });
        let token = token_from_response(&body, Some("old-refresh")).unwrap();
        assert_eq!(token.refresh_token, "old-refresh");
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn token_response_missing_access_token_errors() {
        let body = json!({"expires_in": 3599});
        match token_from_response(&body, None) {
            Err(AuthError::MissingTokenField(field)) => assert_eq!(field, "access_token"),
            other => panic!("unexpected result: {:?}", other.map(|t| t.access_token)),
        }
    }

    #[test]
    fn pkce_challenge_matches_verifier() {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use sha2::{Digest, Sha256};

        let (verifier, challenge) = generate_pkce();
        assert_eq!(verifier.len(), 64);
        assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        assert_eq!(challenge, URL_SAFE_NO_PAD.encode(hasher.finalize()));
    }

    #[test]
    fn auth_url_carries_encoded_parameters() {
        let config = OAuthConfig {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8080/oauth2callback".to_string(),
            scope: YOUTUBE_SCOPE.to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        };
        let (auth_url, verifier) = generate_auth_url(&config);

        assert!(auth_url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(auth_url.contains("client_id=client%20id"));
        assert!(auth_url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Foauth2callback"));
        assert!(auth_url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fyoutube.force-ssl"));
        assert!(auth_url.contains("code_challenge_method=S256"));
        assert!(auth_url.contains("access_type=offline"));
        // The verifier itself never appears in the URL.
        assert!(!auth_url.contains(&verifier));
    }
}
