/// Request-shape failures reported by the conversion service.
///
/// The display text is the `reason` sent back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Request name is missing.")]
    MissingRequestName,

    #[error("Unsupported service : {0}")]
    UnsupportedService(String),

    #[error("Request does not contain 'markdown'.")]
    MissingMarkdown,

    /// The request body is not JSON. Carries the decoder message.
    #[error("{0}")]
    InvalidRequest(String),
}

/// Errors raised while building a [`MetadataRepo`](crate::metadata::MetadataRepo).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata for '{0}' is already registered")]
    DuplicateFile(String),
}
