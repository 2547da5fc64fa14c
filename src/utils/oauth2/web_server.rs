use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use log::{debug, error, info};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, Scope, TokenResponse};
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::form_urlencoded::byte_serialize;
use crate::errors::DriveError::FileOperationError;
use crate::errors::DriveResult;
use crate::utils::credential::GoogleDriveToken;
use crate::utils::oauth2::token_refresh::DEFAULT_EXPIRES_IN;

pub(crate) const INIT_PATH: &str = "/auth/init";
pub(crate) const CALLBACK_PATH: &str = "/auth/callback";

pub(crate) type TokenSender = Sender<Result<GoogleDriveToken, String>>;

#[derive(Clone)]
pub(crate) struct AppState {
    oauth_client: BasicClient,
    scopes: Vec<String>,
    pkce_verifier: Arc<Mutex<Option<PkceCodeVerifier>>>,
    csrf_token: Arc<Mutex<Option<CsrfToken>>>,
    shutdown_flag: Arc<AtomicBool>,
    extra_args: HashMap<String, String>,
    sender: TokenSender,
}

impl AppState {
    pub(crate) fn new(client: BasicClient, scopes: &[String], sender: TokenSender) -> Self {
        // Google only returns a refresh token with offline access.
        let extra_args = HashMap::from([
            ("access_type".to_string(), "offline".to_string()),
            ("prompt".to_string(), "consent".to_string()),
        ]);

        Self {
            oauth_client: client,
            scopes: scopes.to_vec(),
            pkce_verifier: Arc::new(Mutex::new(None)),
            csrf_token: Arc::new(Mutex::new(None)),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            extra_args,
            sender,
        }
    }

    /// Reports the outcome of the flow and stops the server.
    async fn report(&self, result: Result<GoogleDriveToken, String>) -> bool {
        self.shutdown_flag.store(true, Ordering::Relaxed);
        match self.sender.send(result).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to send token data: {:?}", e);
                false
            },
        }
    }
}

/// Sets the shutdown flag when dropped, whatever path the callback took.
struct ShutdownGuard(Arc<AtomicBool>);

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        debug!("Dropping oauth2 server by guard.");
        self.0.store(true, Ordering::Relaxed);
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct AuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Binds the callback listener. Port `0` picks a free port.
pub(crate) async fn bind_listener(port: u16) -> DriveResult<TcpListener> {
    TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|e| {
            error!("Failed to bind oauth2 callback port {}: {:?}", port, e);
            FileOperationError(format!("Cannot bind oauth2 callback port {}: {}", port, e))
        })
}

/// Serves the consent flow on `listener` until a callback has been handled.
pub(crate) fn spawn_webserver(listener: TcpListener,
                              client: BasicClient,
                              scopes: &[String],
                              sender: TokenSender) -> JoinHandle<()> {
    let state = AppState::new(client, scopes, sender);
    let shutdown_flag = state.shutdown_flag.clone();

    let app = Router::new()
        .route(INIT_PATH, get(init_auth))
        .route(CALLBACK_PATH, get(callback_auth))
        .route("/auth/complete", get(complete_auth2))
        .route("/auth/failed", get(failed_auth2))
        .route("/auth/infringe", get(infringed_connection))
        .with_state(state);

    tokio::spawn(async move {
        info!("Start oauth2.0 web server.");
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown(shutdown_flag)).await {
            error!("Server error: {}", e);
        }
        info!("Shutting down oauth2.0 web server by finish signal of oauth2.0");
    })
}

async fn shutdown(shutdown_flag: Arc<AtomicBool>) {
    while !shutdown_flag.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

pub(crate) async fn init_auth(State(state): State<AppState>) -> Redirect {
    let mut auth_url = state.oauth_client.authorize_url(CsrfToken::new_random);
    for scope in &state.scopes {
        auth_url = auth_url.add_scope(Scope::new(scope.to_string()));
    }
    for (key, value) in &state.extra_args {
        auth_url = auth_url.add_extra_param(key, value);
    }
    let (pkce_code_challenge, pkce_code_verifier) = PkceCodeChallenge::new_random_sha256();
    let (authorization_uri, csrf_token) = auth_url
        .set_pkce_challenge(pkce_code_challenge)
        .url();
    *state.csrf_token.lock().await = Some(csrf_token);
    *state.pkce_verifier.lock().await = Some(pkce_code_verifier);

    Redirect::to(authorization_uri.as_str())
}

fn failed_redirect(message: &str) -> Redirect {
    let encoded = byte_serialize(message.as_bytes()).collect::<String>();
    Redirect::to(&format!("/auth/failed?message={}", encoded))
}

pub(crate) async fn callback_auth(Query(auth_callback): Query<AuthCallback>,
                                  State(state): State<AppState>) -> Redirect {
    let _server_drop = ShutdownGuard(state.shutdown_flag.clone());

    let stored_csrf_token = state.csrf_token.lock().await.take();
    let stored_csrf_token = match stored_csrf_token {
        Some(token) => token,
        None => {
            error!("Callback received before the authorization was initiated.");
            state.report(Err("Authorization callback without a pending request".to_string())).await;
            return Redirect::to("/auth/failed")
        },
    };

    if auth_callback.state.as_deref() != Some(stored_csrf_token.secret().as_str()) {
        error!("CSRF state is not valid. This connection may be infringed.");
        state.report(Err("CSRF state mismatch in authorization callback".to_string())).await;
        return Redirect::to("/auth/infringe")
    }

    let code = match auth_callback.code.as_deref() {
        Some(code) => code,
        None => {
            debug!("callback query: {:?}", auth_callback);
            error!("Authorization code indicates empty.");
            let message = format!("Failed reason: {} ({})",
                                  auth_callback.error.as_deref().unwrap_or("no code"),
                                  auth_callback.error_description.as_deref().unwrap_or("Unknown details"));
            state.report(Err(format!("Authorization denied. {}", message))).await;
            return failed_redirect(&message)
        }
    };

    let pkce_code_verifier = match state.pkce_verifier.lock().await.take() {
        Some(verifier) => verifier,
        None => {
            error!("Failed to fetch PKCE verifier. PKCE required due to security");
            state.report(Err("PKCE verifier missing".to_string())).await;
            return Redirect::to("/auth/failed")
        },
    };

    let token_result = state.oauth_client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .set_pkce_verifier(pkce_code_verifier)
        .request_async(async_http_client)
        .await;

    match token_result {
        Ok(token) => {
            let expires_in = token.expires_in().unwrap_or(DEFAULT_EXPIRES_IN);
            let token_data = GoogleDriveToken::new(
                token.access_token().secret(),
                token.refresh_token().map(|refresh| refresh.secret().as_str()),
                OffsetDateTime::now_utc() + expires_in,
                &state.scopes,
            );
            info!("Complete get signature.");

            if state.report(Ok(token_data)).await {
                Redirect::to("/auth/complete")
            } else {
                Redirect::to("/auth/failed")
            }
        },
        Err(e) => {
            error!("Failed to fetch access token: {:?}", e);
            let message = format!("Code exchange failed: {}", e);
            state.report(Err(message.clone())).await;
            failed_redirect(&message)
        },
    }
}

pub(crate) async fn complete_auth2() -> &'static str {
    "Authentication successful. Please return your application."
}

#[derive(Deserialize)]
pub(crate) struct ErrorMessage {
    message: Option<String>,
}

pub(crate) async fn failed_auth2(Query(error): Query<ErrorMessage>) -> String {
    match error.message {
        Some(message) => {
            error!("Failed auth2 with error: {}", message);
            format!("Authentication failed.\nError: {}", message)
        },
        None => {
            "Authentication failed.".to_string()
        }
    }
}

pub(crate) async fn infringed_connection() -> &'static str {
    "Csrf token verification failed. This connection may be infringed."
}

#[cfg(test)]
mod tests {
    use axum::http::header::LOCATION;
    use axum::response::IntoResponse;
    use tokio::sync::mpsc;
    use crate::utils::oauth2::services::get_google_oauth2_secret;
    use super::*;

    fn state_with_receiver() -> (AppState, mpsc::Receiver<Result<GoogleDriveToken, String>>) {
        let client = get_google_oauth2_secret("id", "secret")
            .oauth_client(Some("http://localhost:8080/auth/callback"))
            .unwrap();
        let (sender, receiver) = mpsc::channel(1);
        (AppState::new(client, &["scope".to_string()], sender), receiver)
    }

    fn location(redirect: Redirect) -> String {
        let response = redirect.into_response();
        response.headers()[LOCATION].to_str().unwrap().to_string()
    }

    fn callback(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> Query<AuthCallback> {
        Query(AuthCallback {
            code: code.map(String::from),
            state: state.map(String::from),
            error: error.map(String::from),
            error_description: None,
        })
    }

    #[tokio::test]
    async fn test_init_stores_csrf_and_pkce() {
        let (state, _receiver) = state_with_receiver();

        let uri = location(init_auth(State(state.clone())).await);
        assert!(uri.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(uri.contains("code_challenge_method=S256"));
        assert!(uri.contains("access_type=offline"));

        let csrf = state.csrf_token.lock().await.clone().unwrap();
        assert!(uri.contains(&format!("state={}", csrf.secret())));
        assert!(state.pkce_verifier.lock().await.is_some());
    }

    #[tokio::test]
    async fn test_csrf_mismatch_is_reported() {
        let (state, mut receiver) = state_with_receiver();
        *state.csrf_token.lock().await = Some(CsrfToken::new("expected".to_string()));

        let redirect = callback_auth(callback(Some("code"), Some("forged"), None), State(state.clone())).await;

        assert_eq!(location(redirect), "/auth/infringe");
        assert!(receiver.recv().await.unwrap().unwrap_err().contains("CSRF"));
        assert!(state.shutdown_flag.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_denied_consent_is_reported() {
        let (state, mut receiver) = state_with_receiver();
        *state.csrf_token.lock().await = Some(CsrfToken::new("expected".to_string()));

        let redirect = callback_auth(callback(None, Some("expected"), Some("access_denied")), State(state.clone())).await;

        assert!(location(redirect).starts_with("/auth/failed?message=Failed+reason"));
        assert!(receiver.recv().await.unwrap().unwrap_err().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_bind_any_port() {
        let listener = bind_listener(0).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
