//! API error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use intervention_core::{ClientCommand, Error};
use serde::Serialize;
use tracing::{error, info};

/// Error returned by a route handler.
///
/// Errors from the event-submission and polling routes also carry an
/// empty `interventions` list so clients can read the body the same way
/// as a successful response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    with_interventions: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    interventions: Option<Vec<ClientCommand>>,
}

impl ApiError {
    /// Error for routes whose success body is `{interventions: [...]}`
    pub fn interventions(err: Error) -> Self {
        let mut api_error = Self::from(err);
        api_error.with_interventions = true;
        if api_error.status == StatusCode::INTERNAL_SERVER_ERROR {
            api_error.message = "Server error processing events";
        }
        api_error
    }

    /// Request body was not JSON at all
    pub fn malformed_body() -> Self {
        Self::interventions(Error::invalid_input("body is not valid JSON"))
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, message) = match &err {
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid event data format"),
            Error::InvalidKind(_) => (StatusCode::BAD_REQUEST, "Invalid intervention type"),
            Error::LockPoisoned => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        if err.is_client_error() {
            info!("Rejected request: {}", err);
        } else {
            error!("Request failed: {}", err);
        }

        Self {
            status,
            message,
            with_interventions: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            interventions: self.with_interventions.then(Vec::new),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(Error::invalid_input("x")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::InvalidKind("x".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::LockPoisoned).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_interventions_error_body() {
        let err = ApiError::interventions(Error::LockPoisoned);
        assert_eq!(err.message, "Server error processing events");
        assert!(err.with_interventions);

        let body = serde_json::to_value(ErrorResponse {
            error: err.message,
            interventions: err.with_interventions.then(Vec::new),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": "Server error processing events", "interventions": []})
        );
    }

    #[test]
    fn test_plain_error_body_has_no_interventions() {
        let err = ApiError::from(Error::InvalidKind("warp".to_string()));
        let body = serde_json::to_value(ErrorResponse {
            error: err.message,
            interventions: err.with_interventions.then(Vec::new),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"error": "Invalid intervention type"}));
    }
}
