use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Markup stream error: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("Cannot find links on provided page")]
    StartDeadEnd,
}

pub type Result<T> = std::result::Result<T, CrawlError>;
