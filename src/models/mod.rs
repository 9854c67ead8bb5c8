pub mod transaction;
pub mod wallet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_code: None,
        }
    }

    pub fn with_code(error: impl Into<String>, error_code: Option<String>) -> Self {
        Self {
            error: error.into(),
            error_code,
        }
    }
}
