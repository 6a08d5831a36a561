use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Everything a handler can fail with. Raw store and hashing errors are
/// classified here before they reach the wire; the `Server` cause is logged
/// and never returned to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("account already exists")]
    Conflict,
    #[error("{0}")]
    Auth(&'static str),
    #[error("not found")]
    NotFound,
    #[error("internal server error")]
    Server(anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn server(err: impl Into<anyhow::Error>) -> Self {
        ApiError::Server(err.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return ApiError::Conflict;
            }
        }
        ApiError::Server(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Server(cause) = &self {
            error!(error = %cause, "request failed");
        }

        let status = match &self {
            ApiError::Validation(_) | ApiError::Conflict => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        let cases = vec![
            (
                ApiError::Validation("password too short".into()),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::Conflict, StatusCode::BAD_REQUEST),
            (
                ApiError::Auth("invalid credentials"),
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (
                ApiError::Server(anyhow::anyhow!("pool exhausted")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn server_error_body_hides_cause() {
        let err = ApiError::Server(anyhow::anyhow!("connection refused to 10.0.0.3:5432"));
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn conflict_does_not_name_the_column() {
        assert_eq!(ApiError::Conflict.to_string(), "account already exists");
    }
}
