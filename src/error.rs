#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("key not found")]
    KeyNotFound,

    #[error("unexpected type of operation")]
    UnexpectedOperation,

    #[error(transparent)]
    Deserialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KvError {
    /// Message carried in the `Err` field of a response line.
    pub fn to_wire(&self) -> String {
        format!("{self}")
    }

    /// Map an `Err` string from a response line back to a known error.
    pub fn from_wire(msg: &str) -> Option<KvError> {
        match msg {
            "" => None,
            "key not found" => Some(KvError::KeyNotFound),
            "unexpected type of operation" => Some(KvError::UnexpectedOperation),
            other => Some(KvError::Io(std::io::Error::other(other.to_string()))),
        }
    }
}

pub type KvResult<T> = Result<T, KvError>;
