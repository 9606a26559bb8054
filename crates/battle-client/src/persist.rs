use std::io;
use std::path::PathBuf;

use battle_core::model::MatchState;
use tracing::warn;

const NAMESPACE: &str = "codebattle";
const SNAPSHOT_FILE: &str = "match.json";

/// Durable snapshot of the in-progress match, so a restart can offer to
/// resume. Cleared on conclusion or abandonment; a restored snapshot is
/// only trusted after the match service confirms the match is still live.
#[derive(Debug, Clone)]
pub struct MatchArchive {
    dir: PathBuf,
}

impl MatchArchive {
    pub fn new() -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(NAMESPACE);
        Self { dir }
    }

    /// Use an explicit directory instead of the user config dir.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn save(&self, state: &MatchState) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string(state).map_err(io::Error::other)?;
        std::fs::write(self.snapshot_path(), json)
    }

    /// Load the persisted match, if any. A corrupt snapshot is discarded.
    pub fn load(&self) -> Option<MatchState> {
        let data = std::fs::read_to_string(self.snapshot_path()).ok()?;
        match serde_json::from_str(&data) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(error = %e, "discarding corrupt match snapshot");
                let _ = self.clear();
                None
            }
        }
    }

    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(self.snapshot_path()) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Default for MatchArchive {
    fn default() -> Self {
        Self::new()
    }
}
