use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use sealtalk_shared::ProtocolError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Connection limit reached ({max})")]
    TooManyConnections { max: usize },

    #[error("Malformed message: {0}")]
    Malformed(#[from] ProtocolError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::TooManyConnections { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            ServerError::Malformed(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let full = ServerError::TooManyConnections { max: 4 }.into_response();
        assert_eq!(full.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bad = ServerError::Malformed(ProtocolError::InvalidEncoding).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let internal = ServerError::Internal("boom".into()).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
