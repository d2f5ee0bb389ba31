pub mod admin;
pub mod auth;
pub mod student;

use axum::response::Redirect;
use serde::Deserialize;
use tracing::error;

use crate::error::PortalError;

#[derive(Debug, Default, Deserialize)]
pub struct ErrorQuery {
    pub error: Option<String>,
}

/// Redirect back to a form carrying the error indicator in the query string.
pub(crate) fn redirect_with_error(path: &str, err: &PortalError) -> Redirect {
    if err.indicator() == "server_error" {
        error!(error = %err, path, "form submission failed");
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", err.indicator())
        .finish();
    Redirect::to(&format!("{path}?{query}"))
}
