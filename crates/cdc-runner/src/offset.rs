use serde::{Deserialize, Serialize};

/// Position in an upstream change stream.
///
/// Wraps the upstream's own offset document verbatim. A batch handed to the
/// consumer carries the offset of the last record folded into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOffset {
    pub source_offset: serde_json::Value,
}

impl StreamOffset {
    pub fn new(source_offset: serde_json::Value) -> Self {
        Self { source_offset }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.source_offset.get(key)
    }
}

impl checkpoint::Checkpoint for StreamOffset {
    const SOURCE_TYPE: &'static str = "cdc-stream";

    fn to_cli_string(&self) -> String {
        self.source_offset.to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let source_offset = serde_json::from_str(s)
            .map_err(|e| anyhow::anyhow!("Invalid stream offset '{s}': {e}"))?;
        Ok(Self { source_offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkpoint::{Checkpoint, CheckpointManager, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_cli_string_roundtrip() {
        let offset = StreamOffset::new(json!({"lsn": "0/16B3748", "txid": 9}));
        let parsed = StreamOffset::from_cli_string(&offset.to_cli_string()).unwrap();
        assert_eq!(parsed, offset);
        assert!(StreamOffset::from_cli_string("{not json").is_err());
    }

    #[tokio::test]
    async fn test_persists_through_manager() {
        let manager = CheckpointManager::new(Arc::new(MemoryStore::new()), "slot");
        let offset = StreamOffset::new(json!({"line": 12}));
        manager.save(&offset).await.unwrap();

        let loaded: StreamOffset = manager.load().await.unwrap().unwrap();
        assert_eq!(loaded.get("line"), Some(&json!(12)));
    }
}
