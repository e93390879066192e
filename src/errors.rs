use axum::http::StatusCode;

/// Failure to read or write one of the data files.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("habit '{0}' already exists")]
    AlreadyExists(String),

    #[error("cannot rename: habit '{0}' already exists")]
    NameConflict(String),

    #[error("invalid habit name: {0}")]
    InvalidName(String),

    #[error("invalid reminder: {0}")]
    InvalidReminder(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn too_many_requests() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "rate limit exceeded, please try again later".to_string(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        let status = match &err {
            TrackerError::AlreadyExists(_) | TrackerError::NameConflict(_) => StatusCode::CONFLICT,
            TrackerError::InvalidName(_) | TrackerError::InvalidReminder(_) => {
                StatusCode::BAD_REQUEST
            }
            TrackerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
