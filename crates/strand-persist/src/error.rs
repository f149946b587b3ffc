use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("BSON serialization error: {0}")]
    BsonSerialization(#[from] bson::ser::Error),

    #[error("BSON deserialization error: {0}")]
    BsonDeserialization(#[from] bson::de::Error),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    /// Thread exists but belongs to another user. Callers must present this
    /// the same way as a missing thread so existence is never leaked.
    #[error("Thread not owned by caller: {0}")]
    Ownership(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid object ID: {0}")]
    InvalidObjectId(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;
