use crate::services::guild_player::{ContentStore, ContentStoreError};
use crate::types::SongId;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::create_dir_all;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

const FILE_EXTENSION: &str = "audio";

/// Stores fetched audio as `<directory>/<id>.audio`. A file only counts once it is non-empty,
/// and writes go through a temporary file so readers never see a partial file.
pub(crate) struct OnDiskContentStore {
    directory: PathBuf,
}

impl OnDiskContentStore {
    pub(crate) fn create(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

/// Escapes every byte outside `[A-Za-z0-9-]` as `_xx`, so distinct ids never share a file.
fn sanitize(id: &SongId) -> String {
    let mut name = String::with_capacity(id.0.len());

    for byte in id.0.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("_{:02x}", byte));
        }
    }

    name
}

#[async_trait]
impl ContentStore for OnDiskContentStore {
    async fn exists(&self, id: &SongId) -> bool {
        match tokio::fs::metadata(self.path_for(id)).await {
            Ok(metadata) => metadata.is_file() && metadata.len() > 0,
            Err(_) => false,
        }
    }

    async fn write(&self, id: &SongId, bytes: Vec<u8>) -> Result<PathBuf, ContentStoreError> {
        let path = self.path_for(id);
        let temp_path = self
            .directory
            .join(format!(".{}.{}.part", sanitize(id), Uuid::new_v4()));

        create_dir_all(&self.directory).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .await?;

        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(error) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(error.into());
        }

        debug!(%id, ?path, size = bytes.len(), "Audio file stored");

        Ok(path)
    }

    fn path_for(&self, id: &SongId) -> PathBuf {
        self.directory
            .join(format!("{}.{}", sanitize(id), FILE_EXTENSION))
    }
}
