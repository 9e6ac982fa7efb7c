use rmcp::ErrorData;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited with {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("Operation cancelled by caller")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the underlying cause is a Kubernetes 404.
    pub fn is_kube_not_found(&self) -> bool {
        matches!(self, AppError::Kube(kube::Error::Api(resp)) if resp.code == 404)
    }
}

impl From<AppError> for ErrorData {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::InvalidRequest(msg) => ErrorData::invalid_params(msg.clone(), None),
            AppError::NotFound(msg) => ErrorData::resource_not_found(msg.clone(), None),
            _ if err.is_kube_not_found() => {
                ErrorData::resource_not_found(err.to_string(), None)
            }
            _ => ErrorData::internal_error(err.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    fn kube_api_error(code: u16) -> AppError {
        AppError::Kube(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "pod \"web\" not found".to_string(),
            reason: "NotFound".to_string(),
            code,
        }))
    }

    #[test]
    fn kube_404_classifies_as_not_found() {
        assert!(kube_api_error(404).is_kube_not_found());
        assert!(!kube_api_error(500).is_kube_not_found());
    }

    #[test]
    fn invalid_request_maps_to_invalid_params() {
        let data = ErrorData::from(AppError::InvalidRequest("missing name".into()));
        assert_eq!(data.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn unclassified_errors_keep_their_message() {
        let data = ErrorData::from(AppError::Internal("boom".into()));
        assert_eq!(data.code, ErrorCode::INTERNAL_ERROR);
        assert!(data.message.contains("boom"));
    }

    #[test]
    fn kube_500_maps_to_internal_error() {
        let data = ErrorData::from(kube_api_error(500));
        assert_eq!(data.code, ErrorCode::INTERNAL_ERROR);
    }
}
