use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use od_core::{ErrorKind, SchemaViolation, UrlMetricError};
use serde_json::json;

/// Rejections from the URL metric endpoints, rendered as
/// `{"code", "message", "data": {"status", "param"?}}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidParam(#[from] SchemaViolation),

    #[error(transparent)]
    Metric(#[from] UrlMetricError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson(_) | Self::InvalidParam(_) => StatusCode::BAD_REQUEST,
            Self::Metric(err) => match err.kind() {
                ErrorKind::Structural => StatusCode::BAD_REQUEST,
                ErrorKind::DomainInvariant => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "rest_invalid_json",
            Self::InvalidParam(_) => "rest_invalid_param",
            Self::Metric(err) => match err.kind() {
                ErrorKind::Structural => "rest_invalid_param",
                ErrorKind::DomainInvariant => "url_metric_exception",
            },
        }
    }

    fn param(&self) -> Option<&str> {
        match self {
            Self::InvalidParam(violation) | Self::Metric(UrlMetricError::Structural(violation)) => {
                Some(violation.param.as_str()).filter(|p| !p.is_empty())
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut data = json!({ "status": status.as_u16() });
        if let Some(param) = self.param() {
            data["param"] = json!(param);
        }
        let body = json!({
            "code": self.code(),
            "message": self.to_string(),
            "data": data,
        });
        (status, Json(body)).into_response()
    }
}
