use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrawlError>;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("session error: {0}")]
    Session(#[from] bramble_session::SessionError),

    #[error("storage error: {0}")]
    Store(#[from] bramble_store::StoreError),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
