use thiserror::Error;

/// Errors returned by the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was set up without a table handle or secret key.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stored payload could not be decrypted or parsed.
    #[error("failed to decode session data: {0}")]
    Decode(String),

    /// The session table failed.
    #[error(transparent)]
    Storage(#[from] TableError),
}

impl From<CodecError> for StoreError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MissingSecret => Self::Configuration(err.to_string()),
            _ => Self::Decode(err.to_string()),
        }
    }
}

/// Errors raised by session table backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("session already exists: {sid}")]
    AlreadyExists { sid: String },
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Errors raised while encoding or decoding session payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("secret key is missing or empty")]
    MissingSecret,
    #[error("failed to serialize payload: {0}")]
    Serialize(String),
    #[error("failed to deserialize payload: {0}")]
    Deserialize(String),
    #[error("failed to encrypt payload")]
    Encrypt,
    #[error("failed to decrypt payload: {0}")]
    Decrypt(String),
}
