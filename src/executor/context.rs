use crate::config::TableConfig;
use crate::storage::StorageBackend;
use std::sync::Arc;

/// Everything an executor needs for one call: the backend and the settings
/// of the table it targets.
#[derive(Clone)]
pub struct ExecutionContext {
    pub backend: Arc<dyn StorageBackend>,
    pub config: Arc<TableConfig>,
}

impl ExecutionContext {
    pub fn new(backend: Arc<dyn StorageBackend>, config: TableConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("backend", &self.backend.name())
            .field("table", &self.config.table_name)
            .finish()
    }
}
