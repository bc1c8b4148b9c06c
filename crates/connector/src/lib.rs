//! Connector capabilities for relay-sync.
//!
//! A connector declares the optional operations it implements by
//! registering them in a [`CapabilityRegistry`] at startup. The
//! orchestrator checks [`CapabilityRegistry::supports`] before calling
//! [`CapabilityRegistry::invoke`]; there is no other discovery mechanism.
//!
//! ```rust,ignore
//! let registry = connector::start(Arc::new(my_connector));
//! if registry.supports(Capability::CreateTable) {
//!     registry.invoke(Capability::CreateTable, Invocation::Table(table)).await?;
//! }
//! ```

mod capability;
mod registry;

use std::sync::Arc;

pub use capability::Capability;
pub use registry::{CapabilityFn, CapabilityRegistry, Invocation, Outcome};

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Operation '{0}' is not supported by this connector")]
    Unsupported(String),

    #[error("Operation '{capability}' failed: {source:#}")]
    Failed {
        capability: Capability,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, CapabilityError>;

/// A destination or source that plugs into the runtime.
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// Register every operation this connector implements.
    fn register_capabilities(self: Arc<Self>, registry: &mut CapabilityRegistry);
}

/// Start `connector`: collect its capabilities once into a registry.
pub fn start<C: Connector + 'static>(connector: Arc<C>) -> CapabilityRegistry {
    let name = connector.name().to_string();
    let mut registry = CapabilityRegistry::new();
    connector.register_capabilities(&mut registry);
    tracing::info!(
        "Connector '{name}' started with capabilities: {}",
        registry
            .capabilities()
            .iter()
            .map(Capability::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    registry
}
