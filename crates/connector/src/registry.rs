//! Capability registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use batch_sink::WriteListResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use sync_core::{RecordEvent, SchemaChangeEvent, Table};
use tracing::debug;

use crate::{Capability, CapabilityError, Result};

/// Arguments of a capability call.
#[derive(Debug, Clone)]
pub enum Invocation {
    None,
    /// Operations scoped to one table, such as create, drop or clear
    Table(Table),
    /// Operations that only know a table by name, such as info lookup
    TableName(String),
    Records { table: Table, events: Vec<RecordEvent> },
    SchemaChange(SchemaChangeEvent),
    Command(String),
}

/// Result of a capability call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    Count(u64),
    Written(WriteListResult),
    Table(Option<Table>),
    Statements(Vec<String>),
}

pub type CapabilityFn =
    Arc<dyn Fn(Invocation) -> BoxFuture<'static, anyhow::Result<Outcome>> + Send + Sync>;

/// Operations a connector implements, keyed by [`Capability`].
///
/// Populated once while the connector starts and read-only afterwards.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    operations: HashMap<Capability, CapabilityFn>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the implementation of `capability`, replacing any earlier one.
    pub fn register<F, Fut>(&mut self, capability: Capability, operation: F) -> &mut Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Outcome>> + Send + 'static,
    {
        let operation: CapabilityFn = Arc::new(move |invocation| operation(invocation).boxed());
        if self.operations.insert(capability, operation).is_some() {
            debug!("Replaced implementation of {capability}");
        }
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.operations.contains_key(&capability)
    }

    pub fn supports_name(&self, name: &str) -> bool {
        Capability::from_name(name).is_some_and(|c| self.supports(c))
    }

    /// Registered capabilities in declaration order.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities: Vec<Capability> = self.operations.keys().copied().collect();
        capabilities.sort();
        capabilities
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub async fn invoke(&self, capability: Capability, invocation: Invocation) -> Result<Outcome> {
        let operation = self
            .operations
            .get(&capability)
            .ok_or_else(|| CapabilityError::Unsupported(capability.to_string()))?;
        operation(invocation)
            .await
            .map_err(|source| CapabilityError::Failed { capability, source })
    }

    /// Invoke an operation by name, as an orchestrator configured with
    /// strings would.
    pub async fn invoke_named(&self, name: &str, invocation: Invocation) -> Result<Outcome> {
        let capability = Capability::from_name(name)
            .ok_or_else(|| CapabilityError::Unsupported(name.to_string()))?;
        self.invoke(capability, invocation).await
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_invoke_registered_operation() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = CapabilityRegistry::new();
        registry.register(Capability::BatchCount, move |_| {
            let counter = Arc::clone(&counter);
            async move { Ok(Outcome::Count(counter.fetch_add(1, Ordering::SeqCst) + 1)) }
        });

        assert!(registry.supports(Capability::BatchCount));
        assert!(registry.supports_name("batch_count"));
        let outcome = registry
            .invoke(Capability::BatchCount, Invocation::None)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Count(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregistered_operation_is_unsupported() {
        let registry = CapabilityRegistry::new();
        assert!(!registry.supports(Capability::StreamRead));

        let err = registry
            .invoke(Capability::StreamRead, Invocation::None)
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Unsupported(ref name) if name == "stream_read"));

        let err = registry
            .invoke_named("time_travel", Invocation::None)
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_operation_failure_names_capability() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Capability::ExecuteCommand, |invocation| async move {
            match invocation {
                Invocation::Command(cmd) if cmd.is_empty() => anyhow::bail!("empty command"),
                _ => Ok(Outcome::Done),
            }
        });

        let err = registry
            .invoke(Capability::ExecuteCommand, Invocation::Command(String::new()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("execute_command"));
        assert!(matches!(
            err,
            CapabilityError::Failed {
                capability: Capability::ExecuteCommand,
                ..
            }
        ));
    }

    #[test]
    fn test_last_registration_wins_and_listing_is_ordered() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(Capability::GetTableInfo, |_| async { Ok(Outcome::Done) })
            .register(Capability::CreateTable, |_| async { Ok(Outcome::Done) })
            .register(Capability::GetTableInfo, |_| async { Ok(Outcome::Table(None)) });

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.capabilities(),
            vec![Capability::CreateTable, Capability::GetTableInfo]
        );
    }
}
