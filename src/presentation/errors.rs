// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::repositories::job_batch_repository::RepositoryError;
use crate::domain::services::llm_service::LlmError;

/// API层类型化错误
///
/// 提交接口把校验与上游探针失败映射为这些变体
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("OpenAI authentication failed")]
    AuthFailed,

    #[error("OpenAI quota exceeded")]
    QuotaExceeded,

    #[error("model access forbidden")]
    ModelForbidden,

    #[error("model not found")]
    ModelNotFound,

    #[error("no scrape provider available")]
    AllProvidersDown,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::AuthFailed
            | ApiError::QuotaExceeded
            | ApiError::ModelForbidden
            | ApiError::ModelNotFound => StatusCode::BAD_REQUEST,
            ApiError::AllProvidersDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::AuthFailed => ApiError::AuthFailed,
            LlmError::QuotaExceeded => ApiError::QuotaExceeded,
            LlmError::ModelForbidden => ApiError::ModelForbidden,
            LlmError::ModelNotFound => ApiError::ModelNotFound,
            LlmError::UpstreamUnavailable(msg) | LlmError::Other(msg) => {
                ApiError::InvalidRequest(format!("OpenAI validation failed: {}", msg))
            }
        }
    }
}

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_message = self.0.to_string();

        let status = if let Some(api_error) = self.0.downcast_ref::<ApiError>() {
            api_error.status()
        } else {
            match self.0.downcast_ref::<RepositoryError>() {
                Some(RepositoryError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
                Some(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                None => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };

        let body = Json(json!({ "success": false, "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(
            ApiError::InvalidRequest("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::AuthFailed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::QuotaExceeded.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::AllProvidersDown.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_llm_error_mapping() {
        assert!(matches!(
            ApiError::from(LlmError::AuthFailed),
            ApiError::AuthFailed
        ));
        assert!(matches!(
            ApiError::from(LlmError::QuotaExceeded),
            ApiError::QuotaExceeded
        ));
        assert!(matches!(
            ApiError::from(LlmError::ModelNotFound),
            ApiError::ModelNotFound
        ));
    }
}
