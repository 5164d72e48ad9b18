// mod.rs — Shared setup for all subcommands.

pub mod progress;
pub mod score;
pub mod view;

use std::path::{Path, PathBuf};

use dte_progress::{
    DirStore, Journal, JournalSink, KeyValueStore, MemoryStore, ProgressConfig, ProgressStore,
    TracingSink,
};

/// Everything a subcommand needs: config, the shared progress store and the
/// session-scoped backend.
pub struct Context {
    pub config: ProgressConfig,
    pub store: ProgressStore<DirStore>,
    pub session: Box<dyn KeyValueStore>,
}

impl Context {
    pub fn open(
        config_path: &Path,
        store_dir: Option<PathBuf>,
        session: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut config = ProgressConfig::load_or_default(config_path)?;
        if let Some(dir) = store_dir {
            config.store_dir = dir;
        }

        let mut journal = Journal::new().with_sink(TracingSink);
        if let Some(ref log) = config.events_log {
            journal.add_sink(Box::new(JournalSink::open(log)?));
        }

        let backend = DirStore::open(&config.store_dir)?;
        let store = ProgressStore::with_keys(backend, config.keys.clone()).with_journal(journal);

        Ok(Self {
            session: open_session(session)?,
            config,
            store,
        })
    }
}

/// Session-scoped backend: a per-id directory under the temp dir, or an
/// in-memory store that dies with the process.
fn open_session(id: Option<&str>) -> anyhow::Result<Box<dyn KeyValueStore>> {
    let Some(id) = id else {
        return Ok(Box::new(MemoryStore::new()));
    };

    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        anyhow::bail!(
            "invalid session id '{}': use letters, digits, '-' or '_'",
            id
        );
    }

    let dir = std::env::temp_dir().join(format!("dte-session-{}", id));
    tracing::debug!("session store at {}", dir.display());
    Ok(Box::new(DirStore::open(dir)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_uses_store_dir_override() {
        let dir = tempdir().unwrap();
        let store_dir = dir.path().join("progress");
        let ctx = Context::open(&dir.path().join("missing.toml"), Some(store_dir.clone()), None)
            .unwrap();
        assert_eq!(ctx.config.store_dir, store_dir);
        assert_eq!(ctx.store.backend().dir(), store_dir.as_path());
    }

    #[test]
    fn open_reads_config_keys() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("dte.toml");
        std::fs::write(
            &config_path,
            format!(
                "store_dir = '{}'\n[keys]\nprogress = \"customProgress\"\n",
                dir.path().join("store").display()
            ),
        )
        .unwrap();

        let ctx = Context::open(&config_path, None, None).unwrap();
        ctx.store.complete_discover();
        assert!(dir.path().join("store").join("customProgress").exists());
    }

    #[test]
    fn session_ids_are_validated() {
        assert!(open_session(Some("../escape")).is_err());
        assert!(open_session(Some("")).is_err());
        assert!(open_session(None).is_ok());
    }
}
