//! Authorization-code flow with PKCE against the Microsoft identity platform.
//!
//! The browser is opened through a [`UrlOpener`]; the redirect is picked up
//! by polling a [`RedirectSource`], a loopback HTTP listener by default.

use crate::jwt::{decode_claims, user_from_claims};
use crate::{AuthError, AuthProvider, AuthResult, Session};
use akv_config_and_utils::{AuthStrategy, OAuthSettings};
use akv_storage::{AuthTokens, SessionStore, UserInfo};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use parking_lot::Mutex;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

pub const OAUTH_SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub authority: Url,
    pub tenant: String,
    pub client_id: String,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    /// Upper bound on waiting for the browser redirect.
    pub login_timeout: Duration,
    pub poll_interval: Duration,
}

impl OAuthConfig {
    pub fn from_settings(settings: &OAuthSettings, tenant: &str) -> AuthResult<Self> {
        let client_id = settings
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AuthError::Config("oauth.client_id is not set".into()))?;
        let authority = settings
            .authority_url()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        Ok(Self {
            authority,
            tenant: tenant.to_string(),
            client_id,
            redirect_uri: Url::parse(&settings.redirect_uri())?,
            scopes: settings.scopes.clone(),
            login_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        })
    }

    fn endpoint(&self, leaf: &str) -> AuthResult<Url> {
        let base = self.authority.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!(
            "{base}/{}/oauth2/v2.0/{leaf}",
            self.tenant
        ))?)
    }

    pub fn authorize_endpoint(&self) -> AuthResult<Url> {
        self.endpoint("authorize")
    }

    pub fn token_endpoint(&self) -> AuthResult<Url> {
        self.endpoint("token")
    }

    fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// Build a fresh authorization request with its own state, nonce and
    /// PKCE pair.
    pub fn authorization_request(&self) -> AuthResult<AuthorizationRequest> {
        let state = uuid::Uuid::new_v4().to_string();
        let nonce = uuid::Uuid::new_v4().to_string();
        let pkce = PkcePair::generate();

        let url = Url::parse_with_params(
            self.authorize_endpoint()?.as_str(),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("response_mode", "query"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scope().as_str()),
                ("state", state.as_str()),
                ("nonce", nonce.as_str()),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )?;

        Ok(AuthorizationRequest {
            url,
            state,
            nonce,
            pkce,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    /// base64url(SHA-256(verifier))
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
    pub nonce: String,
    pub pkce: PkcePair,
}

/// Opens the authorization URL for the user.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &Url) -> AuthResult<()>;
}

/// Opens URLs in the system browser.
pub struct BrowserOpener;

impl UrlOpener for BrowserOpener {
    fn open(&self, url: &Url) -> AuthResult<()> {
        open::that(url.as_str())?;
        Ok(())
    }
}

/// Somewhere the browser's redirect lands.
#[async_trait]
pub trait RedirectSource: Send + Sync {
    async fn start(&self, redirect_uri: &Url) -> AuthResult<()>;

    /// The captured redirect URL, if one has arrived. Consumes it.
    fn take_redirect(&self) -> Option<String>;

    async fn stop(&self);
}

/// Single-use HTTP listener on `127.0.0.1` at the redirect URI's port.
#[derive(Default)]
pub struct LoopbackRedirect {
    captured: Arc<Mutex<Option<String>>>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl LoopbackRedirect {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RedirectSource for LoopbackRedirect {
    async fn start(&self, redirect_uri: &Url) -> AuthResult<()> {
        let port = redirect_uri
            .port_or_known_default()
            .ok_or_else(|| AuthError::Config(format!("redirect URI has no port: {redirect_uri}")))?;
        let addr = format!("127.0.0.1:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AuthError::OAuth(format!("Failed to bind to {addr}: {e}")))?;

        info!(port, "OAuth redirect listener started");

        let captured = self.captured.clone();
        let redirect_uri = redirect_uri.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let captured = captured.clone();
                        let redirect_uri = redirect_uri.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(socket, &redirect_uri, captured).await {
                                error!("Error handling redirect connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.server.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    fn take_redirect(&self) -> Option<String> {
        self.captured.lock().take()
    }

    async fn stop(&self) {
        if let Some(handle) = self.server.lock().take() {
            handle.abort();
            debug!("OAuth redirect listener stopped");
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    redirect_uri: &Url,
    captured: Arc<Mutex<Option<String>>>,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // GET /callback?code=...&state=... HTTP/1.1
    let Some(rest) = request_line.strip_prefix("GET ") else {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    };
    let target = rest.split(" HTTP/").next().unwrap_or(rest).trim();

    let Ok(url) = redirect_uri.join(target) else {
        send_response(&mut writer, 400, "Bad Request", "Bad Request").await?;
        return Ok(());
    };
    if url.path() != redirect_uri.path() {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    debug!(path = %url.path(), "OAuth redirect received");

    let error = url
        .query_pairs()
        .find(|(k, _)| k == "error")
        .map(|(_, v)| v.into_owned());

    *captured.lock() = Some(url.to_string());

    let body = match error {
        Some(err) => error_page(&err),
        None => success_page(),
    };
    send_response(&mut writer, 200, "OK", &body).await
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>AKV Manager - Signed In</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Signed in</h1>
<p>You can close this window and return to AKV Manager.</p>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str) -> String {
    let escaped = error
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>AKV Manager - Sign-in Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Sign-in failed</h1>
<p>Error: {escaped}</p>
<p>You can close this window and try again.</p>
</body>
</html>"#
    )
}

/// The ID token must echo the nonce sent with the authorization request.
fn check_nonce(id_token: &str, expected: &str) -> AuthResult<()> {
    let claims = decode_claims(id_token)?;
    match claims.get("nonce").and_then(|value| value.as_str()) {
        Some(nonce) if nonce == expected => Ok(()),
        Some(_) => Err(AuthError::InvalidToken("ID token nonce does not match the sign-in request".into())),
        None => Err(AuthError::InvalidToken("ID token carries no nonce".into())),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct OAuthAuth {
    config: OAuthConfig,
    http: reqwest::Client,
    opener: Arc<dyn UrlOpener>,
    redirects: Arc<dyn RedirectSource>,
}

impl OAuthAuth {
    pub fn new(config: OAuthConfig) -> AuthResult<Self> {
        Self::with_parts(config, Arc::new(BrowserOpener), Arc::new(LoopbackRedirect::new()))
    }

    pub fn with_parts(
        config: OAuthConfig,
        opener: Arc<dyn UrlOpener>,
        redirects: Arc<dyn RedirectSource>,
    ) -> AuthResult<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            config,
            http,
            opener,
            redirects,
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Extract the authorization code from a redirect. `Ok(None)` when the
    /// URL is not our redirect at all.
    fn accept_redirect(&self, raw: &str, expected_state: &str) -> AuthResult<Option<String>> {
        let url = Url::parse(raw)?;
        let expected = &self.config.redirect_uri;
        if url.origin() != expected.origin() || url.path() != expected.path() {
            debug!(path = %url.path(), "ignoring unrelated redirect");
            return Ok(None);
        }

        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };

        if let Some(error) = param("error") {
            let description = param("error_description").unwrap_or_default();
            return Err(AuthError::OAuth(format!("{error}: {description}")));
        }
        if param("state").as_deref() != Some(expected_state) {
            warn!("OAuth redirect state mismatch");
            return Err(AuthError::StateMismatch);
        }
        param("code")
            .filter(|code| !code.is_empty())
            .map(Some)
            .ok_or_else(|| AuthError::OAuth("redirect carried no authorization code".into()))
    }

    async fn wait_for_code(&self, request: &AuthorizationRequest) -> AuthResult<String> {
        self.opener.open(&request.url)?;
        info!("waiting for OAuth redirect");

        let deadline = Instant::now() + self.config.login_timeout;
        loop {
            if let Some(raw) = self.redirects.take_redirect() {
                if let Some(code) = self.accept_redirect(&raw, &request.state)? {
                    return Ok(code);
                }
            }
            if Instant::now() >= deadline {
                warn!("OAuth login timed out waiting for redirect");
                return Err(AuthError::Timeout);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn request_tokens(&self, form: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let response = self
            .http
            .post(self.config.token_endpoint()?)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(response.error_for_status().err().map_or_else(
                || AuthError::OAuth(format!("token endpoint returned {status}")),
                AuthError::from,
            ));
        }

        let body = response.text().await?;
        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => Err(AuthError::OAuth(match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            })),
            Err(_) => Err(AuthError::OAuth(format!("token endpoint returned {status}"))),
        }
    }

    fn tokens_from(&self, response: &TokenResponse, previous_refresh: Option<&str>) -> AuthTokens {
        let scopes = response
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_else(|| self.config.scopes.clone());
        let mut tokens = AuthTokens::expiring_in(
            response.access_token.clone(),
            response
                .refresh_token
                .clone()
                .or_else(|| previous_refresh.map(str::to_string)),
            response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            scopes,
        );
        if let Some(token_type) = &response.token_type {
            tokens.token_type = token_type.clone();
        }
        tokens
    }

    fn user_from(response: &TokenResponse) -> AuthResult<UserInfo> {
        let token = response
            .id_token
            .as_deref()
            .unwrap_or(&response.access_token);
        let claims = decode_claims(token)?;
        user_from_claims(&claims, Utc::now())
    }
}

#[async_trait]
impl AuthProvider for OAuthAuth {
    fn strategy(&self) -> AuthStrategy {
        AuthStrategy::OAuth
    }

    async fn probe(&self, store: &SessionStore) -> AuthResult<Option<Session>> {
        let (Some(user), Some(tokens)) = (store.load_user()?, store.load_tokens()?) else {
            return Ok(None);
        };
        let session = Session::new(user, Some(tokens));
        if !session.is_expired() {
            return Ok(Some(session));
        }
        if session.refresh_token().is_none() {
            debug!("stored OAuth tokens expired without a refresh token");
            store.clear()?;
            return Ok(None);
        }

        match self.refresh(&session).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                warn!(error = %err, "stored OAuth session could not be refreshed");
                store.clear()?;
                Ok(None)
            }
        }
    }

    async fn login(&self) -> AuthResult<Session> {
        let request = self.config.authorization_request()?;

        self.redirects.start(&self.config.redirect_uri).await?;
        let code = self.wait_for_code(&request).await;
        self.redirects.stop().await;
        let code = code?;

        let redirect_uri = self.config.redirect_uri.to_string();
        let scope = self.config.scope();
        let response = self
            .request_tokens(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("code_verifier", request.pkce.verifier.as_str()),
                ("scope", scope.as_str()),
            ])
            .await?;

        if let Some(id_token) = response.id_token.as_deref() {
            check_nonce(id_token, &request.nonce)?;
        }
        let user = Self::user_from(&response)?;
        info!(user_id = %user.id, "OAuth login completed");
        Ok(Session::new(user, Some(self.tokens_from(&response, None))))
    }

    async fn logout(&self, _session: Option<&Session>) -> AuthResult<()> {
        // Entra ID has no token revocation endpoint; forgetting the tokens is enough.
        debug!("OAuth logout");
        Ok(())
    }

    async fn validate(&self, session: &Session) -> AuthResult<bool> {
        Ok(session.tokens.is_some() && !session.is_expired())
    }

    async fn refresh(&self, session: &Session) -> AuthResult<Session> {
        let refresh_token = session
            .refresh_token()
            .ok_or_else(|| AuthError::TokenRefresh("no refresh token".into()))?;
        let scope = self.config.scope();

        let response = self
            .request_tokens(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", scope.as_str()),
            ])
            .await
            .map_err(|err| match err {
                AuthError::OAuth(message) => AuthError::TokenRefresh(message),
                other => other,
            })?;

        let user = Self::user_from(&response).unwrap_or_else(|err| {
            debug!(error = %err, "refresh response carried no usable claims, keeping user");
            session.user.clone()
        });
        debug!(user_id = %user.id, "OAuth tokens refreshed");
        Ok(Session::new(
            user,
            Some(self.tokens_from(&response, Some(refresh_token))),
        ))
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    fn session_check_interval(&self) -> Duration {
        OAUTH_SESSION_CHECK_INTERVAL
    }
}
