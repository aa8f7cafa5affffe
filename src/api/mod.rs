//! # API Module
//!
//! HTTP endpoints served by the short-lived loopback listener during the
//! authorization flow.
//!
//! ## Endpoints
//!
//! - [`callback`] - Receives the service's authorization redirect
//!   (`GET /callback?code=..&state=..`), hands the first valid one to the
//!   waiting [`crate::server::CallbackListener`] and answers with a fixed
//!   confirmation page. A redirect carrying `error=..` is handed over as a
//!   denial. Requests without the expected parameters get `400 Bad Request`
//!   and do not end the wait.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use axum::{Extension, Router, routing::get};
//! use spotsnap::api::{CaptureSlot, callback};
//!
//! let app = Router::new().route("/callback", get(callback).layer(Extension(slot)));
//! ```

mod callback;

pub use callback::CaptureSlot;
pub use callback::DENIED_PAGE;
pub use callback::MISSING_PARAMS_PAGE;
pub use callback::SUCCESS_PAGE;
pub use callback::callback;
