pub mod memory_entity_store;

use crate::errors::BotError;
use crate::services::extraction::EntityKind;
use async_trait::async_trait;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn save_all(&self, kind: EntityKind, values: &[String]) -> Result<(), BotError>;

    async fn load_all(&self, kind: EntityKind) -> Result<Vec<String>, BotError>;

    async fn ensure_schema(&self) -> Result<(), BotError> {
        Ok(())
    }
}
