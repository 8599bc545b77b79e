use axum::http::StatusCode;
use thiserror::Error;

use crate::{course::CourseGenerationError, routing::RoutingErrorKind};

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error(transparent)]
    Generation(#[from] CourseGenerationError),
}

impl CourseError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Gpx(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Generation(err) => match err {
                CourseGenerationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                CourseGenerationError::NoConvergence => StatusCode::UNPROCESSABLE_ENTITY,
                CourseGenerationError::RoutingUnavailable(cause)
                    if cause.kind() == RoutingErrorKind::Timeout =>
                {
                    StatusCode::GATEWAY_TIMEOUT
                }
                CourseGenerationError::RoutingUnavailable(_) | CourseGenerationError::Location(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
        }
    }
}
