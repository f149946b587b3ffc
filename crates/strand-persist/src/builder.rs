use crate::client::{DedupConfig, PersistClient};
use crate::error::{PersistError, Result};

/// Builder for [`PersistClient`].
#[derive(Debug, Clone, Default)]
pub struct PersistClientBuilder {
    mongodb_uri: Option<String>,
    database: Option<String>,
    dedup: DedupConfig,
}

impl PersistClientBuilder {
    pub fn new() -> Self {
        Self {
            mongodb_uri: None,
            database: None,
            dedup: DedupConfig::default(),
        }
    }

    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = Some(name.into());
        self
    }

    pub fn manual_dedup_window_ms(mut self, ms: i64) -> Self {
        self.dedup.manual_window_ms = ms;
        self
    }

    pub fn upsert_dedup_window_ms(mut self, ms: i64) -> Self {
        self.dedup.upsert_window_ms = ms;
        self
    }

    pub async fn build(self) -> Result<PersistClient> {
        let uri = self
            .mongodb_uri
            .ok_or_else(|| PersistError::Connection("mongodb_uri is required".to_string()))?;
        let database = self
            .database
            .ok_or_else(|| PersistError::Connection("database is required".to_string()))?;

        PersistClient::connect(&uri, &database, self.dedup).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_requires_uri() {
        let result = PersistClientBuilder::new().database("strand").build().await;
        match result {
            Err(PersistError::Connection(msg)) => assert!(msg.contains("mongodb_uri")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("build without a uri must fail"),
        }
    }

    #[test]
    fn test_builder_overrides_windows() {
        let builder = PersistClientBuilder::new()
            .manual_dedup_window_ms(5000)
            .upsert_dedup_window_ms(250);
        assert_eq!(builder.dedup.manual_window_ms, 5000);
        assert_eq!(builder.dedup.upsert_window_ms, 250);
    }
}
