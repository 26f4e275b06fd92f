use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignPlaceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Malformed PDF document: {0}")]
    MalformedDocument(String),

    #[error("Invalid signature image: {0}")]
    InvalidImageData(String),

    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Stable discriminant for mapping errors to user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    MalformedDocument,
    InvalidImageData,
    PageOutOfRange,
    Serialization,
}

impl SignPlaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignPlaceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SignPlaceError::MalformedDocument(_) => ErrorKind::MalformedDocument,
            SignPlaceError::InvalidImageData(_) => ErrorKind::InvalidImageData,
            SignPlaceError::PageOutOfRange { .. } => ErrorKind::PageOutOfRange,
            SignPlaceError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

pub type Result<T> = std::result::Result<T, SignPlaceError>;
