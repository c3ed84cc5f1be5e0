use thiserror::Error;

/// Errors surfaced by [`SecretCache`](crate::SecretCache).
///
/// A fetch failure only reaches the caller when there is no previously cached
/// value to fall back to.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The backing store failed and nothing was cached for this name.
    #[error("secret {name} unavailable: {source}")]
    Unavailable {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SecretError {
    pub fn name(&self) -> &str {
        match self {
            SecretError::Unavailable { name, .. } => name,
        }
    }
}

pub type Result<T> = std::result::Result<T, SecretError>;
