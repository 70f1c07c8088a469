use thiserror::Error;

/// Errors surfaced by the control-plane core.
///
/// The taxonomy matters operationally: `Validation` is rejected before any
/// state change and maps to a 400-class admin response, `Store` to a
/// 5xx-class response, and the remaining variants never reach admin callers
/// directly. A mutation that fails at the snapshot step is not rolled back;
/// the store stays authoritative and the next successful update reconciles.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any state change.
    #[error("validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A store or persistence operation failed. The snapshot update is
    /// skipped when this happens.
    #[error("store operation failed: {0}")]
    Store(String),

    /// A translator rejected an entity. The entity is omitted from the
    /// produced set; the batch proceeds.
    #[error("translation failed for entity '{entity}': {reason}")]
    Translation { entity: String, reason: String },

    /// The linear cache rejected a replacement set. Fatal for that update.
    #[error("cache rejected update for {type_url}: {reason}")]
    Cache { type_url: String, reason: String },

    /// The underlying gRPC stream failed. All watches for the stream are
    /// cancelled; the client reconnects with backoff.
    #[error("stream {stream_id} failed: {reason}")]
    Stream { stream_id: i64, reason: String },

    /// A bounded send on a response channel timed out. Counted, not
    /// surfaced further.
    #[error("send timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// A request echoed a nonce that is not the most recent one for its
    /// type on its stream. Silently ignored and counted.
    #[error("stale nonce '{got}', expected '{want}'")]
    NonceMismatch { got: String, want: String },
}

impl Error {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), reason: reason.into() }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store(reason.into())
    }

    pub fn translation(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Translation { entity: entity.into(), reason: reason.into() }
    }

    pub fn cache(type_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cache { type_url: type_url.into(), reason: reason.into() }
    }

    pub fn stream(stream_id: i64, reason: impl Into<String>) -> Self {
        Self::Stream { stream_id, reason: reason.into() }
    }

    /// Stable label used for the `error_type` dimension on error counters.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::Store(_) => "store",
            Error::Translation { .. } => "translation",
            Error::Cache { .. } => "cache",
            Error::Stream { .. } => "stream",
            Error::Timeout { .. } => "timeout",
            Error::NonceMismatch { .. } => "nonce_mismatch",
        }
    }

    /// Whether the admin caller is at fault (400-class) rather than the
    /// control plane (5xx-class).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
