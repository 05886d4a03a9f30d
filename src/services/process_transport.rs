use crate::services::guild_player::{CompletionCallback, Transport, TransportError};
use crate::types::GuildId;
use async_lock::Mutex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct ActiveStream {
    id: u64,
    pid: Option<u32>,
    kill: oneshot::Sender<()>,
}

type Connections = Arc<Mutex<HashMap<GuildId, Option<ActiveStream>>>>;

/// Plays files through a local player process, one process per connected guild.
///
/// The process exit is the completion event. Pause and resume suspend the process with
/// SIGSTOP and SIGCONT.
pub(crate) struct ProcessTransport {
    program: String,
    args: Vec<String>,
    connections: Connections,
    next_stream_id: AtomicU64,
}

impl ProcessTransport {
    /// `command` is split on whitespace; the file path is appended as the last argument.
    pub(crate) fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "ffplay".to_string());

        Self {
            program,
            args: parts.collect(),
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_stream_id: AtomicU64::new(1),
        }
    }

    async fn signal(&self, guild_id: &GuildId, signal: libc::c_int) -> Result<(), TransportError> {
        let connections = self.connections.lock().await;

        let pid = connections
            .get(guild_id)
            .ok_or(TransportError::NotConnected)?
            .as_ref()
            .and_then(|stream| stream.pid)
            .ok_or(TransportError::NoActiveStream)?;

        // SAFETY: `kill` has no memory-safety preconditions; the pid belongs to a child we own.
        let result = unsafe { libc::kill(pid as libc::pid_t, signal) };

        if result != 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        Ok(())
    }
}

async fn watch_stream(
    connections: Connections,
    guild_id: GuildId,
    stream_id: u64,
    mut child: Child,
    killed: oneshot::Receiver<()>,
    on_finished: CompletionCallback,
) {
    let error = tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => None,
            Ok(status) => Some(TransportError::StreamFailed(format!("player exited with {}", status))),
            Err(error) => Some(error.into()),
        },
        _ = killed => {
            if let Err(error) = child.kill().await {
                warn!(%guild_id, ?error, "Unable to kill player process");
            }

            None
        }
    };

    if let Some(slot) = connections.lock().await.get_mut(&guild_id) {
        if slot.as_ref().map(|stream| stream.id) == Some(stream_id) {
            *slot = None;
        }
    }

    debug!(%guild_id, stream_id, ?error, "Player process finished");

    on_finished(error);
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn connect(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        self.connections
            .lock()
            .await
            .entry(*guild_id)
            .or_insert(None);

        Ok(())
    }

    async fn disconnect(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        let removed = self.connections.lock().await.remove(guild_id);

        if let Some(Some(stream)) = removed {
            let _ = stream.kill.send(());
        }

        Ok(())
    }

    async fn is_connected(&self, guild_id: &GuildId) -> bool {
        self.connections.lock().await.contains_key(guild_id)
    }

    async fn start_stream(
        &self,
        guild_id: &GuildId,
        path: &Path,
        on_finished: CompletionCallback,
    ) -> Result<(), TransportError> {
        let mut connections = self.connections.lock().await;

        let slot = connections
            .get_mut(guild_id)
            .ok_or(TransportError::NotConnected)?;

        if slot.is_some() {
            return Err(TransportError::StreamFailed(
                "another stream is active".to_string(),
            ));
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stream_id = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        let (kill, killed) = oneshot::channel();

        *slot = Some(ActiveStream {
            id: stream_id,
            pid: child.id(),
            kill,
        });

        debug!(%guild_id, stream_id, ?path, "Player process started");

        actix_rt::spawn(watch_stream(
            Arc::clone(&self.connections),
            *guild_id,
            stream_id,
            child,
            killed,
            on_finished,
        ));

        Ok(())
    }

    async fn pause(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        self.signal(guild_id, libc::SIGSTOP).await
    }

    async fn resume(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        self.signal(guild_id, libc::SIGCONT).await
    }

    async fn stop(&self, guild_id: &GuildId) -> Result<(), TransportError> {
        let mut connections = self.connections.lock().await;

        let stream = connections
            .get_mut(guild_id)
            .ok_or(TransportError::NotConnected)?
            .take()
            .ok_or(TransportError::NoActiveStream)?;

        let _ = stream.kill.send(());

        Ok(())
    }
}
