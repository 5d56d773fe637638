#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Not enough bytes: got {actual}, need {minimum}")]
    NotEnoughData { actual: usize, minimum: usize },

    /// A validated frame for which no decoder is registered.
    #[error("No decoder registered for {0}")]
    UnknownId(String),

    /// A decoder rejected the payload of an otherwise valid frame.
    #[error("Decode error for {id}: {reason}")]
    Decode { id: String, reason: String },

    /// Invalid composite or registry configuration, surfaced at setup.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
