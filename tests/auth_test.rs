use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use reqwest::Url;
use spotsnap::{
    config::AuthSettings,
    error::AuthError,
    spotify::auth::{AuthCoordinator, TokenEndpoint},
    types::{AuthStrategy, Token},
};
use tokio::{
    io::{AsyncWriteExt, BufReader, DuplexStream},
    sync::mpsc,
};

#[derive(Default)]
struct FakeEndpoint {
    exchanges: AtomicUsize,
    last_code: Mutex<Option<String>>,
}

#[async_trait]
impl TokenEndpoint for FakeEndpoint {
    async fn exchange_code(&self, code: &str) -> Result<Token, AuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        *self.last_code.lock().unwrap() = Some(code.to_string());
        Ok(Token {
            access_token: format!("access-for-{code}"),
            refresh_token: "refresh".to_string(),
            scope: "playlist-read-private".to_string(),
            expires_at: i64::MAX,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<Token, AuthError> {
        Err(AuthError::TokenRefresh("not used".to_string()))
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).unwrap();
    listener.local_addr().unwrap().port()
}

fn settings(port: u16, timeout: Duration) -> AuthSettings {
    AuthSettings {
        client_id: "client-123".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: format!("http://127.0.0.1:{port}/callback"),
        scope: "playlist-read-private".to_string(),
        auth_url: "https://accounts.example.com/authorize".to_string(),
        token_url: "https://accounts.example.com/api/token".to_string(),
        callback_port: port,
        callback_path: "/callback".to_string(),
        timeout,
        strategy: AuthStrategy::Automatic,
    }
}

fn state_of(url: &str) -> String {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

/// Simulates the browser following the redirect with the given query.
fn redirect(port: u16, query: String) {
    tokio::spawn(async move {
        let _ = reqwest::get(format!("http://127.0.0.1:{port}/callback?{query}")).await;
    });
}

#[test]
fn test_authorize_url_carries_client_and_state() {
    let coordinator = AuthCoordinator::new(
        settings(8000, Duration::from_secs(1)),
        FakeEndpoint::default(),
    );
    let url = coordinator.authorize_url("nonce-1").unwrap();
    let parsed = Url::parse(&url).unwrap();

    let params: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    assert!(url.starts_with("https://accounts.example.com/authorize?"));
    assert!(params.contains(&("client_id".to_string(), "client-123".to_string())));
    assert!(params.contains(&("response_type".to_string(), "code".to_string())));
    assert!(params.contains(&("state".to_string(), "nonce-1".to_string())));
    assert!(params.contains(&(
        "redirect_uri".to_string(),
        "http://127.0.0.1:8000/callback".to_string()
    )));
}

#[tokio::test]
async fn test_exchanges_code_when_state_matches() {
    let port = free_port();
    let coordinator = AuthCoordinator::new(
        settings(port, Duration::from_secs(5)),
        FakeEndpoint::default(),
    )
    .with_launcher(move |url| {
        let state = state_of(url);
        redirect(port, format!("code=AQDgood&state={state}"));
        Ok(())
    });

    let token = coordinator.authenticate().await.unwrap();

    assert_eq!(token.access_token, "access-for-AQDgood");
    assert_eq!(coordinator.endpoint().exchanges.load(Ordering::SeqCst), 1);
    assert_eq!(
        coordinator.endpoint().last_code.lock().unwrap().as_deref(),
        Some("AQDgood")
    );
}

#[tokio::test]
async fn test_state_mismatch_never_exchanges() {
    let port = free_port();
    let coordinator = AuthCoordinator::new(
        settings(port, Duration::from_secs(5)),
        FakeEndpoint::default(),
    )
    .with_launcher(move |_| {
        redirect(port, "code=AQDstolen&state=xyz".to_string());
        Ok(())
    });

    let err = coordinator.authenticate().await.unwrap_err();

    assert!(matches!(err, AuthError::StateMismatch), "got {err:?}");
    assert_eq!(coordinator.endpoint().exchanges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_denied_redirect_is_reported() {
    let port = free_port();
    let coordinator = AuthCoordinator::new(
        settings(port, Duration::from_secs(5)),
        FakeEndpoint::default(),
    )
    .with_launcher(move |url| {
        let state = state_of(url);
        redirect(port, format!("error=access_denied&state={state}"));
        Ok(())
    });

    let err = coordinator.authenticate().await.unwrap_err();

    match err {
        AuthError::Denied(reason) => assert_eq!(reason, "access_denied"),
        other => panic!("expected Denied, got {other:?}"),
    }
    assert_eq!(coordinator.endpoint().exchanges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_times_out_without_redirect() {
    let port = free_port();
    let coordinator = AuthCoordinator::new(
        settings(port, Duration::from_millis(200)),
        FakeEndpoint::default(),
    )
    .with_launcher(|_| Ok(()));

    let err = coordinator.authenticate().await.unwrap_err();

    assert!(matches!(err, AuthError::Timeout(_)), "got {err:?}");
    assert_eq!(coordinator.endpoint().exchanges.load(Ordering::SeqCst), 0);

    // The listener was shut down, so the port can be bound again.
    assert!(TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).is_ok());
}

#[tokio::test]
async fn test_occupied_port_fails_to_bind() {
    let occupied = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).unwrap();
    let port = occupied.local_addr().unwrap().port();

    let launched = std::sync::Arc::new(AtomicUsize::new(0));
    let counter = std::sync::Arc::clone(&launched);
    let coordinator = AuthCoordinator::new(
        settings(port, Duration::from_secs(5)),
        FakeEndpoint::default(),
    )
    .with_launcher(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let err = coordinator.authenticate().await.unwrap_err();

    match err {
        AuthError::ListenerBind { port: p, .. } => assert_eq!(p, port),
        other => panic!("expected ListenerBind, got {other:?}"),
    }
    assert_eq!(launched.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_launcher_failure_still_waits_for_redirect() {
    let port = free_port();
    let coordinator = AuthCoordinator::new(
        settings(port, Duration::from_secs(5)),
        FakeEndpoint::default(),
    )
    .with_launcher(move |url| {
        let state = state_of(url);
        redirect(port, format!("code=AQDpasted&state={state}"));
        Err(std::io::Error::other("no browser"))
    });

    let token = coordinator.authenticate().await.unwrap();

    assert_eq!(token.access_token, "access-for-AQDpasted");
}

fn manual(timeout: Duration) -> AuthSettings {
    AuthSettings {
        strategy: AuthStrategy::Manual,
        ..settings(free_port(), timeout)
    }
}

/// Wires the launcher to a task that "pastes" `reply(url)` into the input.
fn paste_reply<F>(reply: F) -> (impl Fn(&str) -> std::io::Result<()>, DuplexStream)
where
    F: Fn(&str) -> String + Send + 'static,
{
    let (mut writer, reader) = tokio::io::duplex(4096);
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        if let Some(url) = rx.recv().await {
            writer.write_all(reply(&url).as_bytes()).await.unwrap();
            writer.write_all(b"\n").await.unwrap();
        }
        // Keep the input open until the coordinator is done with it.
        std::future::pending::<()>().await;
    });

    let launcher = move |url: &str| {
        let _ = tx.send(url.to_string());
        Ok(())
    };
    (launcher, reader)
}

#[tokio::test]
async fn test_manual_exchanges_pasted_code() {
    let (launcher, input) = paste_reply(|url| {
        format!(
            "http://127.0.0.1:8000/callback?code=AQDmanual&state={}",
            state_of(url)
        )
    });
    let coordinator = AuthCoordinator::new(manual(Duration::from_secs(5)), FakeEndpoint::default())
        .with_launcher(launcher)
        .with_input(BufReader::new(input));

    let token = coordinator.authenticate().await.unwrap();

    assert_eq!(token.access_token, "access-for-AQDmanual");
    assert_eq!(coordinator.endpoint().exchanges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_manual_state_mismatch_never_exchanges() {
    let (launcher, input) =
        paste_reply(|_| "http://127.0.0.1:8000/callback?code=AQDforged&state=xyz".to_string());
    let coordinator = AuthCoordinator::new(manual(Duration::from_secs(5)), FakeEndpoint::default())
        .with_launcher(launcher)
        .with_input(BufReader::new(input));

    let err = coordinator.authenticate().await.unwrap_err();

    assert!(matches!(err, AuthError::StateMismatch), "got {err:?}");
    assert_eq!(coordinator.endpoint().exchanges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_manual_times_out_without_input() {
    let (_writer, input) = tokio::io::duplex(64);
    let coordinator =
        AuthCoordinator::new(manual(Duration::from_millis(200)), FakeEndpoint::default())
            .with_launcher(|_| Ok(()))
            .with_input(BufReader::new(input));

    let err = coordinator.authenticate().await.unwrap_err();

    assert!(matches!(err, AuthError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn test_manual_closed_input_is_invalid_redirect() {
    let coordinator = AuthCoordinator::new(manual(Duration::from_secs(5)), FakeEndpoint::default())
        .with_launcher(|_| Ok(()))
        .with_input(BufReader::new(tokio::io::empty()));

    let err = coordinator.authenticate().await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidRedirect(_)), "got {err:?}");
    assert_eq!(coordinator.endpoint().exchanges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shared_endpoint_serves_the_exchange() {
    let port = free_port();
    let endpoint = std::sync::Arc::new(FakeEndpoint::default());
    let coordinator = AuthCoordinator::new(
        settings(port, Duration::from_secs(5)),
        std::sync::Arc::clone(&endpoint),
    )
    .with_launcher(move |url| {
        let state = state_of(url);
        redirect(port, format!("code=AQDshared&state={state}"));
        Ok(())
    });

    coordinator.authenticate().await.unwrap();

    // The caller's handle sees the exchange made through the coordinator.
    assert_eq!(endpoint.exchanges.load(Ordering::SeqCst), 1);
    assert_eq!(std::sync::Arc::strong_count(&endpoint), 2);
}
