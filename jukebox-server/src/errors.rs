use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jukebox_collab::{CatalogError, DatabaseError, PlaylistError, RoomError};
use log::error;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{resource} {identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("Catalog lookup failed: {0}")]
    Resolution(String),
    #[error("Storage failed: {0}")]
    Storage(String),
    #[error("{0}")]
    CodeSpaceExhausted(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Resolution(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::CodeSpaceExhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier: identifier.to_string(),
            },
            DatabaseError::Conflict { .. } => Self::Conflict(value.to_string()),
            e => Self::Storage(e.to_string()),
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::NotFound(code) => Self::NotFound {
                resource: "room",
                identifier: code,
            },
            RoomError::CodeSpaceExhausted { .. } => Self::CodeSpaceExhausted(value.to_string()),
            RoomError::Database(e) => e.into(),
        }
    }
}

impl From<PlaylistError> for ServerError {
    fn from(value: PlaylistError) -> Self {
        match value {
            PlaylistError::InvalidTrackReference(e) => Self::InvalidInput(e.to_string()),
            PlaylistError::DuplicateTrack { .. } => Self::Conflict(value.to_string()),
            PlaylistError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            PlaylistError::Storage(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(value: CatalogError) -> Self {
        Self::Resolution(value.to_string())
    }
}
