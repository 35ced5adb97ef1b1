/// Error type for client operations.
///
/// A read that returns siblings is not an error; see [`crate::Resolve`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Connection or framing failure reported by the transport. Never retried here.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("protocol error: expected response code {expected}, got {actual}")]
    Protocol { expected: u8, actual: u8 },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("server error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("sibling count mismatch: {expected} stored, buffer holds {actual}")]
    SiblingCountMismatch { expected: usize, actual: usize },

    #[error("cannot map field `{field}`: {reason}")]
    Encoding { field: String, reason: String },

    #[error("read of {type_name} returned siblings but the type does not implement Resolve")]
    MissingResolutionCapability { type_name: &'static str },

    #[error("link is not set")]
    UnsetLink,
}

impl Error {
    pub(crate) fn encoding(field: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Encoding {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
