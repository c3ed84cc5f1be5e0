use async_trait::async_trait;

/// Backing store the cache refreshes from (a managed secrets service in
/// production).
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the raw value stored under `name`.
    async fn fetch(&self, name: &str) -> anyhow::Result<String>;
}
