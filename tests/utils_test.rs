use spotsnap::error::AuthError;
use spotsnap::types::AuthStrategy;
use spotsnap::utils::*;

#[test]
fn test_generate_state() {
    let state = generate_state();

    // 32 random bytes, base64 without padding
    assert_eq!(state.len(), 43);

    // Should be URL safe so it survives the round trip through the redirect
    assert!(
        state
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    );

    // Two generated nonces should be different
    assert_ne!(state, generate_state());
}

#[test]
fn test_parse_redirect_with_code_and_state() {
    let params =
        parse_redirect("http://127.0.0.1:8000/callback?code=AQB%2Fxyz&state=abc123").unwrap();

    assert_eq!(
        params,
        RedirectParams::Code {
            code: "AQB/xyz".to_string(),
            state: "abc123".to_string(),
        }
    );
}

#[test]
fn test_parse_redirect_trims_pasted_input() {
    let params = parse_redirect("  http://localhost:8000/callback?state=s&code=c\n").unwrap();

    assert_eq!(
        params,
        RedirectParams::Code {
            code: "c".to_string(),
            state: "s".to_string(),
        }
    );
}

#[test]
fn test_parse_redirect_with_error() {
    let params =
        parse_redirect("http://127.0.0.1:8000/callback?error=access_denied&state=abc").unwrap();

    assert_eq!(
        params,
        RedirectParams::Denied {
            error: "access_denied".to_string(),
            state: Some("abc".to_string()),
        }
    );
}

#[test]
fn test_parse_redirect_missing_parameters() {
    let missing_state = parse_redirect("http://127.0.0.1:8000/callback?code=c");
    assert!(matches!(missing_state, Err(AuthError::InvalidRedirect(_))));

    let missing_code = parse_redirect("http://127.0.0.1:8000/callback?state=s");
    assert!(matches!(missing_code, Err(AuthError::InvalidRedirect(_))));

    let not_a_url = parse_redirect("code=c&state=s");
    assert!(matches!(not_a_url, Err(AuthError::InvalidRedirect(_))));
}

#[test]
fn test_parse_auth_strategy() {
    assert_eq!(
        parse_auth_strategy("automatic").unwrap(),
        AuthStrategy::Automatic
    );
    assert_eq!(parse_auth_strategy("Manual").unwrap(), AuthStrategy::Manual);
    assert!(parse_auth_strategy("psychic").is_err());
}

#[test]
fn test_join_artists() {
    let artists = vec![
        "Massive Attack".to_string(),
        "Tricky".to_string(),
        "Portishead".to_string(),
    ];

    assert_eq!(join_artists(&artists, 3), "Massive Attack, Tricky, Portishead");
    assert_eq!(join_artists(&artists, 2), "Massive Attack, Tricky, …");
    assert_eq!(join_artists(&[], 3), "");
}
