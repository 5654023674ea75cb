pub mod notion;

use async_trait::async_trait;

use crate::{error::AppResult, model::StructuredRecord};

pub use notion::NotionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

/// Keeps the tracking store in line with parsed records, keyed on (company, position)
#[async_trait]
pub trait StoreReconciler: Send + Sync {
    async fn upsert(&self, record: &StructuredRecord) -> AppResult<UpsertAction>;
}
