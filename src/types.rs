use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Eq, PartialEq, Clone, Copy, Hash, Debug, Serialize, Deserialize)]
pub(crate) struct GuildId(pub(crate) u64);

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Eq, PartialEq, Clone, Hash, Debug, Serialize, Deserialize)]
pub(crate) struct SongId(pub(crate) String);

impl From<&str> for SongId {
    fn from(value: &str) -> Self {
        SongId(value.to_string())
    }
}

impl std::fmt::Display for SongId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one entry of a guild queue. The same song enqueued twice gets two entries.
#[derive(Eq, PartialEq, Clone, Copy, Hash, Debug, Serialize)]
pub(crate) struct EntryId(pub(crate) Uuid);

impl EntryId {
    pub(crate) fn new() -> Self {
        EntryId(Uuid::new_v4())
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
