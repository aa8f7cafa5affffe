use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use reqwest::Url;

use crate::{error::AuthError, types::AuthStrategy};

/// Number of random bytes behind a state nonce.
const STATE_BYTES: usize = 32;

/// Parameters carried by an authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectParams {
    Code { code: String, state: String },
    Denied { error: String, state: Option<String> },
}

/// Generates a URL-safe random state nonce.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Extracts `code`/`state` (or `error`) from a redirected URL pasted by the
/// user.
pub fn parse_redirect(input: &str) -> Result<RedirectParams, AuthError> {
    let url = Url::parse(input.trim()).map_err(|e| AuthError::InvalidRedirect(e.to_string()))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Ok(RedirectParams::Denied { error, state });
    }

    match (code, state) {
        (Some(code), Some(state)) => Ok(RedirectParams::Code { code, state }),
        (None, _) => Err(AuthError::InvalidRedirect(
            "missing 'code' parameter".to_string(),
        )),
        (_, None) => Err(AuthError::InvalidRedirect(
            "missing 'state' parameter".to_string(),
        )),
    }
}

pub fn parse_auth_strategy(s: &str) -> Result<AuthStrategy, String> {
    s.parse()
}

/// Joins artist names for table output, keeping at most `max` of them.
pub fn join_artists(artists: &[String], max: usize) -> String {
    let mut joined = artists
        .iter()
        .take(max)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if artists.len() > max {
        joined.push_str(", …");
    }
    joined
}
