use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser error: {0}")]
    Browser(#[from] bramble_browser::BrowserError),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("credential store error: {0}")]
    Credentials(String),

    #[error("session snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::Credentials("missing cookie file".to_string());
        assert_eq!(
            err.to_string(),
            "credential store error: missing cookie file"
        );
    }
}
