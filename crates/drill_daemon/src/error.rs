use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use drill_core::{Rejection, SessionView};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Unchanged session state, present when an action was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<Box<SessionView>>,
}

#[derive(Debug)]
pub struct HttpApiError {
    pub status: StatusCode,
    pub error: ApiError,
}

impl HttpApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiError {
                code: code.to_string(),
                message: message.into(),
                view: None,
            },
        }
    }

    pub fn user_not_found(id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "user_not_found", format!("no user {id}"))
    }

    pub fn session_not_found(id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "session_not_found",
            format!("no active session {id}"),
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn rejected(rejection: Rejection, view: SessionView) -> Self {
        let mut err = Self::new(StatusCode::CONFLICT, rejection.code(), rejection.to_string());
        err.error.view = Some(Box::new(view));
        err
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.error.code, "{}", self.error.message);
        }
        (self.status, Json(self.error)).into_response()
    }
}
