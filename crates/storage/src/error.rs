/// All errors that can be returned by a DocumentStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The document carries no `_id` attribute, so it cannot be saved.
    #[error("document of model {model} has no _id")]
    MissingId { model: String },

    /// A value that should be an identifier is not 24 hexadecimal digits.
    #[error("invalid object id: {value}")]
    InvalidId { value: String },

    /// A store-side validator rejected the document. Only raised when
    /// `save` is called with `validate = true`.
    #[error("validation failed for {model}/{id}: {message}")]
    Validation {
        model: String,
        id: String,
        message: String,
    },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
