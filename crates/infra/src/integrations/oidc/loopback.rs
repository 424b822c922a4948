//! Single-use loopback HTTP listener that captures the authorization redirect
//! from the system browser.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use flowery_domain::constants::{DEFAULT_BROWSER_TIMEOUT_SECS, LOOPBACK_DRAIN_WINDOW_MS};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use url::Url;

const CALLBACK_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Sign-in complete</title></head>\n\
<body><h1>Sign-in complete</h1><p>You can close this window and return to the application.</p></body>\n\
</html>";

/// The redirect itself plus one trailing request (favicon and the like).
const MAX_ANSWERED_REQUESTS: usize = 2;

/// Result of a loopback wait. Never raised as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopbackOutcome {
    /// The browser hit the listener; carries the full redirect URL.
    Success { response_url: String },
    BindFailed(String),
    Timeout,
    UnknownError(String),
}

impl LoopbackOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Stable error code reported in failed login outcomes.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::BindFailed(_) => "bind_failed",
            Self::Timeout => "timeout",
            Self::UnknownError(_) => "unknown_error",
        }
    }
}

/// Opens a URL in the user's browser.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), String>;
}

impl<F> BrowserLauncher for F
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    fn open(&self, url: &str) -> Result<(), String> {
        self(url)
    }
}

/// Launches the platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        open::that_detached(url).map_err(|err| err.to_string())
    }
}

#[derive(Clone)]
struct CallbackState {
    origin: Arc<str>,
    captured: mpsc::Sender<String>,
    answered: Arc<AtomicUsize>,
}

impl CallbackState {
    fn new(origin: String, captured: mpsc::Sender<String>) -> Self {
        Self { origin: Arc::from(origin), captured, answered: Arc::new(AtomicUsize::new(0)) }
    }
}

/// Loopback listener bound to `http://127.0.0.1:<port>/` for one login.
pub struct LoopbackCallbackServer {
    listen_url: String,
    timeout: Duration,
    drain_window: Duration,
    launcher: Arc<dyn BrowserLauncher>,
}

impl LoopbackCallbackServer {
    pub fn new(listen_url: impl Into<String>) -> Self {
        Self {
            listen_url: listen_url.into(),
            timeout: Duration::from_secs(DEFAULT_BROWSER_TIMEOUT_SECS),
            drain_window: Duration::from_millis(LOOPBACK_DRAIN_WINDOW_MS),
            launcher: Arc::new(SystemBrowser),
        }
    }

    /// Wait limit for the redirect; `None` or zero keeps the five minute default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = match timeout {
            Some(t) if !t.is_zero() => t,
            _ => Duration::from_secs(DEFAULT_BROWSER_TIMEOUT_SECS),
        };
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_drain_window(mut self, window: Duration) -> Self {
        self.drain_window = window;
        self
    }

    pub fn listen_url(&self) -> &str {
        &self.listen_url
    }

    /// Bind, open the browser at `start_url` and wait for the redirect.
    ///
    /// The listener is released on every exit path.
    pub async fn run(&self, start_url: &str) -> LoopbackOutcome {
        let addr = match listen_addr(&self.listen_url) {
            Ok(addr) => addr,
            Err(message) => return LoopbackOutcome::BindFailed(message),
        };

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(%addr, error = %err, "failed to bind loopback callback listener");
                return LoopbackOutcome::BindFailed(err.to_string());
            }
        };

        let bound = match listener.local_addr() {
            Ok(bound) => bound,
            Err(err) => return LoopbackOutcome::UnknownError(err.to_string()),
        };

        let (captured_tx, mut captured_rx) = mpsc::channel(4);
        let state = CallbackState::new(format!("http://{bound}"), captured_tx);
        let mut server = ServerGuard::spawn(listener, state);
        debug!(%bound, "loopback callback listener started");

        if let Err(err) = self.launcher.open(start_url) {
            warn!(error = %err, "failed to launch system browser; waiting for manual navigation");
        }

        let outcome = match tokio::time::timeout(self.timeout, captured_rx.recv()).await {
            Ok(Some(response_url)) => {
                if let Ok(Some(_)) =
                    tokio::time::timeout(self.drain_window, captured_rx.recv()).await
                {
                    debug!("answered trailing loopback request");
                }
                LoopbackOutcome::Success { response_url }
            }
            Ok(None) => LoopbackOutcome::UnknownError("callback listener stopped unexpectedly".into()),
            Err(_) => LoopbackOutcome::Timeout,
        };

        server.shutdown().await;
        outcome
    }
}

/// Owns the spawned axum task; stopping is idempotent and also runs on drop.
struct ServerGuard {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ServerGuard {
    fn spawn(listener: TcpListener, state: CallbackState) -> Self {
        let app = Router::new().fallback(handle_callback).with_state(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("loopback callback server error: {}", err);
            }
        });

        Self { shutdown_tx: Some(shutdown_tx), handle: Some(handle) }
    }

    async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut handle) = self.handle.take() {
            match tokio::time::timeout(Duration::from_secs(2), &mut handle).await {
                Ok(Err(err)) if err.is_panic() => {
                    error!("loopback callback server panicked: {err}");
                }
                Ok(_) => {}
                Err(_) => handle.abort(),
            }
        }
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(State(state): State<CallbackState>, uri: Uri) -> impl IntoResponse {
    let headers = [
        (header::CONTENT_TYPE, "text/html; charset=utf-8"),
        (header::CACHE_CONTROL, "no-store"),
        (header::PRAGMA, "no-cache"),
        (header::CONNECTION, "close"),
    ];
    if state.answered.fetch_add(1, Ordering::SeqCst) >= MAX_ANSWERED_REQUESTS {
        debug!("loopback listener already answered its requests");
        return (StatusCode::GONE, headers, "");
    }

    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let _ = state.captured.try_send(format!("{}{}", state.origin, path));
    (StatusCode::OK, headers, CALLBACK_PAGE)
}

fn listen_addr(listen_url: &str) -> Result<SocketAddr, String> {
    let url = Url::parse(listen_url).map_err(|err| format!("invalid listen URL: {err}"))?;
    let port = url.port_or_known_default().ok_or_else(|| "listen URL has no port".to_string())?;
    match url.host_str() {
        Some("127.0.0.1") | Some("localhost") => {
            Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)))
        }
        other => Err(format!("listen URL must target 127.0.0.1, got {:?}", other)),
    }
}

/// Ask the OS for a free loopback port by binding port 0 and releasing it.
pub fn random_unused_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Loopback redirect URI for `port`.
pub fn redirect_uri_for_port(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}

/// Whether `uri` points at the local loopback host.
pub fn is_loopback_uri(uri: &str) -> bool {
    Url::parse(uri)
        .map(|url| matches!(url.host_str(), Some("127.0.0.1") | Some("localhost")))
        .unwrap_or(false)
}
