use reqwest::StatusCode;
use thiserror::Error;

const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("you must be signed in")]
    Unauthenticated,

    #[error("only the author can do that")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("request failed: {0}")]
    External(String),
}

impl ClientError {
    /// Map a non-success response onto the error taxonomy.
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthenticated,
            StatusCode::FORBIDDEN => ClientError::Forbidden,
            StatusCode::NOT_FOUND => ClientError::NotFound,
            StatusCode::BAD_REQUEST => {
                ClientError::Validation(message.unwrap_or_else(|| "invalid request".to_string()))
            }
            other => ClientError::External(format!("API error: {other}")),
        }
    }

    /// Text safe to show to the user; external causes stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::External(_) => GENERIC_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::External(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
