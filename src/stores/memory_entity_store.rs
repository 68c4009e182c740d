use crate::errors::BotError;
use crate::services::extraction::EntityKind;
use crate::stores::EntityStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Table {
    rows: Vec<String>,
    keys: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MemoryEntityStore {
    tables: Arc<RwLock<HashMap<EntityKind, Table>>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .get(&kind)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.len(kind) == 0
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn save_all(&self, kind: EntityKind, values: &[String]) -> Result<(), BotError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| BotError::internal("Entity store lock poisoned"))?;
        let table = guard.entry(kind).or_default();
        for value in values {
            if table.keys.insert(value.clone()) {
                table.rows.push(value.clone());
            }
        }
        Ok(())
    }

    async fn load_all(&self, kind: EntityKind) -> Result<Vec<String>, BotError> {
        let guard = self
            .tables
            .read()
            .map_err(|_| BotError::internal("Entity store lock poisoned"))?;
        Ok(guard.get(&kind).map(|t| t.rows.clone()).unwrap_or_default())
    }
}
