use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// ErrorKind
///
/// The closed set of error names the API can emit. Every component error maps onto
/// exactly one kind, and the kind alone decides the wire `name` and the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthorizationHeader,
    Unauthorized,
    UnauthorizedUser,
    PostCreation,
    PostNotFound,
    Database,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::AuthorizationHeader => "AuthorizationHeaderError",
            ErrorKind::Unauthorized => "UnauthorizedError",
            ErrorKind::UnauthorizedUser => "UnauthorizedUserError",
            ErrorKind::PostCreation => "PostCreationError",
            ErrorKind::PostNotFound => "PostNotFoundError",
            ErrorKind::Database => "DatabaseError",
        }
    }

    /// The transport mapping table. This is the only place statuses are chosen.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::AuthorizationHeader | ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::UnauthorizedUser => StatusCode::FORBIDDEN,
            ErrorKind::PostCreation => StatusCode::BAD_REQUEST,
            ErrorKind::PostNotFound => StatusCode::NOT_FOUND,
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ErrorBody
///
/// JSON shape of every error response: `{ "name": ..., "message": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ErrorBody {
    pub name: String,
    pub message: String,
}

fn error_response(kind: ErrorKind, message: String) -> Response {
    let body = ErrorBody {
        name: kind.name().to_string(),
        message,
    };
    (kind.status(), Json(body)).into_response()
}

/// RepositoryError
///
/// Failures raised by the persistence layer. They are never swallowed; handlers
/// propagate them and the boundary answers 500.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// AuthError
///
/// Outcomes of the Token Verifier that reject a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Hard gate only: no Authorization header at all.
    #[error("Unauthorized: No valid token provided")]
    MissingToken,

    #[error("Authorization token must start with Bearer ")]
    AuthorizationHeader,

    #[error("Invalid or expired token")]
    InvalidToken,

    /// Hard gate only: the token verified but its subject no longer exists.
    #[error("Unauthorized: User not found")]
    UserNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::AuthorizationHeader => ErrorKind::AuthorizationHeader,
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::UserNotFound => {
                ErrorKind::Unauthorized
            }
            AuthError::Repository(_) => ErrorKind::Database,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Repository(e) => e.into_response(),
            other => error_response(other.kind(), other.to_string()),
        }
    }
}

impl IntoResponse for RepositoryError {
    fn into_response(self) -> Response {
        tracing::error!("repository error: {:?}", self);
        error_response(ErrorKind::Database, "Internal server error".to_string())
    }
}

/// ApiError
///
/// Everything a post/user/tag handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("There was an error creating your post. Please try again.")]
    PostCreation,

    #[error("Post not found.")]
    PostNotFound,

    #[error("You cannot update a post that is not yours")]
    UnauthorizedUser,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Auth(e) => e.kind(),
            ApiError::PostCreation => ErrorKind::PostCreation,
            ApiError::PostNotFound => ErrorKind::PostNotFound,
            ApiError::UnauthorizedUser => ErrorKind::UnauthorizedUser,
            ApiError::Repository(_) => ErrorKind::Database,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(e) => e.into_response(),
            ApiError::Repository(e) => e.into_response(),
            other => error_response(other.kind(), other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
