//! Shared application state.

use std::sync::Arc;

use crate::config::{ConfigError, ServerConfig};
use crate::core::{HttpQueryResolver, QueryResolver};

/// State shared by every connection handler.
///
/// The query resolver is injected here once, at startup, and handed to each
/// session's dispatch bridge; there is no global registry.
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// External query resolver for tool dispatch
    pub resolver: Arc<dyn QueryResolver>,
}

impl AppState {
    /// Build state with the production HTTP resolver.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        let resolver = Arc::new(HttpQueryResolver::new(config.resolver_url()?));
        Ok(Self { config, resolver })
    }

    /// Build state around a specific resolver implementation.
    pub fn with_resolver(config: ServerConfig, resolver: Arc<dyn QueryResolver>) -> Self {
        Self { config, resolver }
    }
}
