use crate::services::guild_player::{ContentStore, ContentStoreError};
use crate::types::SongId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub(crate) struct InMemoryContentStore {
    storage: Mutex<HashMap<SongId, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub(crate) fn new() -> Self {
        Self {
            storage: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, id: &SongId) -> Option<Vec<u8>> {
        self.storage.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn insert(&self, id: &SongId, bytes: &[u8]) {
        self.storage.lock().unwrap().insert(id.clone(), bytes.to_vec());
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn exists(&self, id: &SongId) -> bool {
        let guard = self.storage.lock().unwrap();

        guard.get(id).map_or(false, |bytes| !bytes.is_empty())
    }

    async fn write(&self, id: &SongId, bytes: Vec<u8>) -> Result<PathBuf, ContentStoreError> {
        self.storage.lock().unwrap().insert(id.clone(), bytes);

        Ok(self.path_for(id))
    }

    fn path_for(&self, id: &SongId) -> PathBuf {
        PathBuf::from(format!("memory/{}.audio", id))
    }
}
