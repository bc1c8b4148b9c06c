//! Conflict policies declared by a destination.

use serde::{Deserialize, Serialize};
use sync_core::RecordOp;

/// What an Insert does when the key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPolicy {
    #[default]
    UpdateOnExists,
    IgnoreOnExists,
    JustInsert,
}

/// What an Update does when the key does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    #[default]
    InsertOnNonExists,
    IgnoreOnNonExists,
}

/// How the destination physically represents an Update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// The destination has row-level update semantics
    #[default]
    Native,
    /// Delete the old row, then insert the new image
    DeleteInsert,
    /// Append the new image and let the destination collapse versions
    Append,
}

/// Physical action the engine asks a statement builder to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteAction {
    Insert,
    Upsert,
    InsertIgnore,
    Update,
    Delete,
}

impl std::fmt::Display for WriteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriteAction::Insert => "insert",
            WriteAction::Upsert => "upsert",
            WriteAction::InsertIgnore => "insert-ignore",
            WriteAction::Update => "update",
            WriteAction::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Write policy negotiated once with the destination at connector start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WritePolicy {
    #[serde(default)]
    pub insert: InsertPolicy,
    #[serde(default)]
    pub update: UpdatePolicy,
    #[serde(default)]
    pub update_strategy: UpdateStrategy,
    /// Updates without a before-image fail instead of being applied by key
    #[serde(default)]
    pub requires_before_image: bool,
}

impl WritePolicy {
    /// Physical actions for one logical operation, in execution order.
    pub fn actions_for(&self, op: RecordOp) -> Vec<WriteAction> {
        match op {
            RecordOp::Insert => vec![match self.insert {
                InsertPolicy::UpdateOnExists => WriteAction::Upsert,
                InsertPolicy::IgnoreOnExists => WriteAction::InsertIgnore,
                InsertPolicy::JustInsert => WriteAction::Insert,
            }],
            RecordOp::Update => match self.update_strategy {
                UpdateStrategy::Native => vec![match self.update {
                    UpdatePolicy::InsertOnNonExists => WriteAction::Upsert,
                    UpdatePolicy::IgnoreOnNonExists => WriteAction::Update,
                }],
                UpdateStrategy::DeleteInsert => vec![WriteAction::Delete, WriteAction::Insert],
                UpdateStrategy::Append => vec![WriteAction::Insert],
            },
            RecordOp::Delete => vec![WriteAction::Delete],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_upsert() {
        let policy = WritePolicy::default();
        assert_eq!(policy.actions_for(RecordOp::Insert), vec![WriteAction::Upsert]);
        assert_eq!(policy.actions_for(RecordOp::Update), vec![WriteAction::Upsert]);
        assert_eq!(policy.actions_for(RecordOp::Delete), vec![WriteAction::Delete]);
    }

    #[test]
    fn test_update_strategies() {
        let mut policy = WritePolicy {
            update: UpdatePolicy::IgnoreOnNonExists,
            ..Default::default()
        };
        assert_eq!(policy.actions_for(RecordOp::Update), vec![WriteAction::Update]);

        policy.update_strategy = UpdateStrategy::DeleteInsert;
        assert_eq!(
            policy.actions_for(RecordOp::Update),
            vec![WriteAction::Delete, WriteAction::Insert]
        );

        policy.update_strategy = UpdateStrategy::Append;
        assert_eq!(policy.actions_for(RecordOp::Update), vec![WriteAction::Insert]);
    }

    #[test]
    fn test_insert_policies() {
        let ignore = WritePolicy {
            insert: InsertPolicy::IgnoreOnExists,
            ..Default::default()
        };
        assert_eq!(ignore.actions_for(RecordOp::Insert), vec![WriteAction::InsertIgnore]);

        let plain = WritePolicy {
            insert: InsertPolicy::JustInsert,
            ..Default::default()
        };
        assert_eq!(plain.actions_for(RecordOp::Insert), vec![WriteAction::Insert]);
    }

    #[test]
    fn test_policy_from_yaml_like_json() {
        let policy: WritePolicy = serde_json::from_value(serde_json::json!({
            "insert": "ignore_on_exists",
            "update_strategy": "append",
            "requires_before_image": true
        }))
        .unwrap();
        assert_eq!(policy.insert, InsertPolicy::IgnoreOnExists);
        assert_eq!(policy.update, UpdatePolicy::InsertOnNonExists);
        assert_eq!(policy.update_strategy, UpdateStrategy::Append);
        assert!(policy.requires_before_image);
    }
}
