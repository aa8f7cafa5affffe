use std::{collections::HashMap, sync::Arc};

use axum::{Extension, extract::Query, http::StatusCode, response::Html};
use tokio::sync::{Mutex, oneshot};

use crate::utils::RedirectParams;

/// Hand-off between the callback handler and the waiting listener. The
/// sender is taken by the first valid redirect, so at most one is delivered.
pub type CaptureSlot = Arc<Mutex<Option<oneshot::Sender<RedirectParams>>>>;

pub const SUCCESS_PAGE: &str =
    "<h2>Authentication successful.</h2><p>You can close this browser window.</p>";
pub const DENIED_PAGE: &str =
    "<h2>Authorization was not granted.</h2><p>You can close this browser window.</p>";
pub const MISSING_PARAMS_PAGE: &str = "<h4>Missing code or state parameter.</h4>";

pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(slot): Extension<CaptureSlot>,
) -> (StatusCode, Html<&'static str>) {
    let param = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();

    let redirect = match (param("error"), param("code"), param("state")) {
        (Some(error), _, state) => RedirectParams::Denied { error, state },
        (None, Some(code), Some(state)) => RedirectParams::Code { code, state },
        _ => return (StatusCode::BAD_REQUEST, Html(MISSING_PARAMS_PAGE)),
    };

    let page = match redirect {
        RedirectParams::Code { .. } => SUCCESS_PAGE,
        RedirectParams::Denied { .. } => DENIED_PAGE,
    };

    match slot.lock().await.take() {
        Some(tx) => {
            if tx.send(redirect).is_err() {
                tracing::debug!("callback arrived after the listener stopped waiting");
            }
        }
        None => tracing::debug!("ignoring callback, a redirect was already captured"),
    }

    (StatusCode::OK, Html(page))
}
