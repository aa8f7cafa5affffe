use std::{io, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::{Mutex, oneshot},
    time::{Instant, timeout_at},
};

use crate::{
    config::AuthSettings,
    error::AuthError,
    info,
    server::{self, ListenerOutcome},
    types::{AuthStrategy, AuthorizationSession, Token, TokenResponse},
    utils::{self, RedirectParams},
    warning,
};

/// Token endpoint of the authorization server.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges an authorization code for a token bundle.
    async fn exchange_code(&self, code: &str) -> Result<Token, AuthError>;

    /// Exchanges a refresh token for a new token bundle. The returned bundle
    /// may carry an empty refresh token when the server did not rotate it.
    async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError>;
}

#[async_trait]
impl<T: TokenEndpoint + ?Sized> TokenEndpoint for Arc<T> {
    async fn exchange_code(&self, code: &str) -> Result<Token, AuthError> {
        (**self).exchange_code(code).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        (**self).refresh(refresh_token).await
    }
}

/// Token endpoint that authenticates as a confidential client with the
/// client id and secret.
pub struct SpotifyTokenEndpoint {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyTokenEndpoint {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            http: Client::new(),
            token_url: settings.token_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
        }
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<Token, String> {
        let res = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = res.status();
        let body = res.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("{}: {}", status, body));
        }

        let json: TokenResponse = serde_json::from_str(&body).map_err(|e| e.to_string())?;
        Ok(json.into_token(Utc::now().timestamp()))
    }
}

#[async_trait]
impl TokenEndpoint for SpotifyTokenEndpoint {
    async fn exchange_code(&self, code: &str) -> Result<Token, AuthError> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
        .map_err(AuthError::TokenExchange)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
        .map_err(AuthError::TokenRefresh)
    }
}

/// Opens the authorization URL for the user.
pub type Launcher = Box<dyn Fn(&str) -> io::Result<()> + Send + Sync>;

/// Source of the redirected URL pasted by the user with
/// [`AuthStrategy::Manual`].
pub type RedirectInput = Box<dyn AsyncBufRead + Send + Unpin>;

/// Runs the authorization-code flow and exchanges the code for a token.
///
/// The flow:
/// 1. Generates a fresh state nonce and builds the authorization URL
/// 2. With [`AuthStrategy::Automatic`], binds the loopback callback listener
///    before anything is opened so the redirect cannot arrive early
/// 3. Opens the URL (browser, falling back to printing it)
/// 4. Waits for the redirect, or for the pasted URL with
///    [`AuthStrategy::Manual`], until the configured timeout
/// 5. Verifies the echoed state; a mismatch discards the code unexchanged
/// 6. Exchanges the code at the token endpoint
///
/// The listener is stopped before `authenticate` returns on every path.
pub struct AuthCoordinator<E> {
    settings: AuthSettings,
    endpoint: E,
    launcher: Launcher,
    input: Mutex<Option<RedirectInput>>,
}

impl<E: TokenEndpoint> AuthCoordinator<E> {
    /// Creates a coordinator that opens the browser and, for the manual
    /// strategy, reads the pasted URL from stdin.
    ///
    /// # Arguments
    ///
    /// * `settings` - Client credentials, URLs, callback port and path,
    ///   timeout and strategy
    /// * `endpoint` - Token endpoint the captured code is exchanged at
    ///
    /// # Example
    ///
    /// ```rust
    /// let endpoint = SpotifyTokenEndpoint::new(&settings.auth);
    /// let coordinator = AuthCoordinator::new(settings.auth.clone(), endpoint);
    /// let token = coordinator.authenticate().await?;
    /// ```
    pub fn new(settings: AuthSettings, endpoint: E) -> Self {
        Self {
            settings,
            endpoint,
            launcher: Box::new(|url: &str| webbrowser::open(url)),
            input: Mutex::new(None),
        }
    }

    /// Replaces the browser launcher, e.g. to drive the redirect in tests.
    pub fn with_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&str) -> io::Result<()> + Send + Sync + 'static,
    {
        self.launcher = Box::new(launcher);
        self
    }

    /// Reads the pasted redirect URL from `input` instead of stdin.
    ///
    /// Only the manual strategy reads it, one line per attempt.
    pub fn with_input<R>(mut self, input: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        self.input = Mutex::new(Some(Box::new(input)));
        self
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Builds the authorization URL for one attempt.
    ///
    /// # Arguments
    ///
    /// * `state` - The nonce the redirect has to echo back
    ///
    /// # Returns
    ///
    /// The URL with `client_id`, `response_type=code`, `redirect_uri`,
    /// `scope` and `state`, or [`AuthError::InvalidRedirect`] if the
    /// configured authorization URL does not parse.
    pub fn authorize_url(&self, state: &str) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            &self.settings.auth_url,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", self.settings.scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::InvalidRedirect(format!("bad authorization URL: {}", e)))?;
        Ok(url.into())
    }

    /// Runs one authorization attempt.
    ///
    /// # Returns
    ///
    /// The exchanged token, or:
    /// - [`AuthError::ListenerBind`] if the callback port is taken
    /// - [`AuthError::Timeout`] if nothing arrived in time
    /// - [`AuthError::StateMismatch`] if the state was not the one issued;
    ///   the code is not exchanged
    /// - [`AuthError::Denied`] if the user declined
    /// - [`AuthError::TokenExchange`] if the token endpoint failed
    pub async fn authenticate(&self) -> Result<Token, AuthError> {
        let deadline = Instant::now() + self.settings.timeout;
        let mut session = AuthorizationSession::new(
            self.settings.client_id.as_str(),
            self.settings.redirect_uri.as_str(),
            self.settings.scope.as_str(),
            utils::generate_state(),
            deadline,
        );
        let auth_url = self.authorize_url(&session.state)?;

        let redirect = match self.settings.strategy {
            AuthStrategy::Automatic => self.capture_automatic(&auth_url, deadline).await,
            AuthStrategy::Manual => self.capture_manual(&auth_url, deadline).await,
        };

        let code = match redirect {
            Ok(RedirectParams::Code { code, state }) => {
                if state != session.state {
                    // The code is dropped here, it never reaches the token endpoint.
                    session.fail();
                    tracing::warn!("authorization redirect carried an unexpected state");
                    return Err(AuthError::StateMismatch);
                }
                session.capture(code.clone());
                code
            }
            Ok(RedirectParams::Denied { error, .. }) => {
                session.fail();
                return Err(AuthError::Denied(error));
            }
            Err(AuthError::Timeout(after)) => {
                session.time_out();
                return Err(AuthError::Timeout(after));
            }
            Err(e) => {
                session.fail();
                return Err(e);
            }
        };

        tracing::debug!(status = ?session.status(), "authorization code captured");
        self.endpoint.exchange_code(&code).await
    }

    async fn capture_automatic(
        &self,
        auth_url: &str,
        deadline: Instant,
    ) -> Result<RedirectParams, AuthError> {
        let port = self.settings.callback_port;
        let addr = std::net::SocketAddr::from((std::net::Ipv4Addr::LOCALHOST, port));
        let listener = server::CallbackListener::bind(addr, &self.settings.callback_path)
            .await
            .map_err(|source| AuthError::ListenerBind { port, source })?;

        self.launch(auth_url);
        info!("Waiting for the authorization redirect...");

        match listener.wait(deadline).await {
            ListenerOutcome::Captured { code, state } => Ok(RedirectParams::Code { code, state }),
            ListenerOutcome::Denied { error, state } => Ok(RedirectParams::Denied { error, state }),
            ListenerOutcome::TimedOut => Err(AuthError::Timeout(self.settings.timeout)),
            ListenerOutcome::BindFailed(source) => Err(AuthError::ListenerBind { port, source }),
            ListenerOutcome::ServerExited => Err(AuthError::Io(io::Error::other(
                "callback server exited before a redirect arrived",
            ))),
        }
    }

    async fn capture_manual(
        &self,
        auth_url: &str,
        deadline: Instant,
    ) -> Result<RedirectParams, AuthError> {
        if let Err(e) = (self.launcher)(auth_url) {
            tracing::debug!(error = %e, "could not open browser");
        }
        info!(
            "Open the following URL, authorize the application and paste the URL you were redirected to:\n{}",
            auth_url
        );

        let line = {
            let mut input = self.input.lock().await;
            match input.as_mut() {
                Some(reader) => {
                    let mut line = String::new();
                    match timeout_at(deadline, reader.read_line(&mut line)).await {
                        Ok(read) => (read? > 0).then_some(line),
                        Err(_) => return Err(AuthError::Timeout(self.settings.timeout)),
                    }
                }
                None => match timeout_at(deadline, read_stdin_line()).await {
                    Ok(Ok(read)) => read?,
                    Ok(Err(_)) => None,
                    Err(_) => return Err(AuthError::Timeout(self.settings.timeout)),
                },
            }
        };

        match line {
            Some(line) => utils::parse_redirect(&line),
            None => Err(AuthError::InvalidRedirect(
                "no input received".to_string(),
            )),
        }
    }

    fn launch(&self, auth_url: &str) {
        if let Err(e) = (self.launcher)(auth_url) {
            warning!(
                "Failed to open browser ({}). Please navigate to the following URL manually:\n{}",
                e,
                auth_url
            );
        }
    }
}

/// Reads one line from stdin on a detached thread.
///
/// A blocking stdin read cannot be cancelled; on a plain thread an abandoned
/// read does not hold up runtime shutdown.
fn read_stdin_line() -> oneshot::Receiver<io::Result<Option<String>>> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let read = std::io::stdin()
            .read_line(&mut line)
            .map(|n| (n > 0).then_some(line));
        let _ = tx.send(read);
    });
    rx
}
