use pretty_assertions::assert_eq;
use spotsnap::types::{
    AuthStrategy, AuthorizationSession, SessionStatus, TOKEN_EXPIRY_MARGIN_SECS, Token,
    TokenResponse,
};
use tokio::time::{Duration, Instant};

fn session() -> AuthorizationSession {
    AuthorizationSession::new(
        "client",
        "http://127.0.0.1:8000/callback",
        "playlist-read-private",
        "abc123",
        Instant::now() + Duration::from_secs(120),
    )
}

#[test]
fn test_session_captures_code_once() {
    let mut session = session();
    assert_eq!(session.status(), SessionStatus::Pending);

    assert!(session.capture("first"));
    assert!(!session.capture("second"));

    assert_eq!(session.status(), SessionStatus::Captured);
    assert_eq!(session.code(), Some("first"));
}

#[test]
fn test_session_terminal_states_are_final() {
    let mut timed_out = session();
    assert!(timed_out.time_out());
    assert!(!timed_out.capture("late"));
    assert!(!timed_out.fail());
    assert_eq!(timed_out.status(), SessionStatus::TimedOut);
    assert_eq!(timed_out.code(), None);

    let mut failed = session();
    assert!(failed.fail());
    assert!(!failed.time_out());
    assert_eq!(failed.status(), SessionStatus::Failed);

    let mut captured = session();
    captured.capture("code");
    assert!(!captured.time_out());
    assert_eq!(captured.status(), SessionStatus::Captured);
}

#[test]
fn test_token_expires_early_by_margin() {
    let token = Token {
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
        scope: String::new(),
        expires_at: 1_000,
    };

    assert!(!token.is_expired_at(1_000 - TOKEN_EXPIRY_MARGIN_SECS - 1));
    assert!(token.is_expired_at(1_000 - TOKEN_EXPIRY_MARGIN_SECS));
    assert!(token.is_expired_at(2_000));
}

#[test]
fn test_token_response_stamps_expiry() {
    let response: TokenResponse = serde_json::from_str(
        r#"{"access_token":"at","token_type":"Bearer","expires_in":3600}"#,
    )
    .unwrap();

    let token = response.into_token(100);

    assert_eq!(token.access_token, "at");
    assert_eq!(token.refresh_token, "");
    assert_eq!(token.expires_at, 3_700);
}

#[test]
fn test_auth_strategy_round_trips_through_display() {
    for strategy in [AuthStrategy::Automatic, AuthStrategy::Manual] {
        assert_eq!(strategy.to_string().parse::<AuthStrategy>(), Ok(strategy));
    }
    assert_eq!("auto".parse::<AuthStrategy>(), Ok(AuthStrategy::Automatic));
}
