//! Directory of `<aggregate>.json` files, each replaced atomically.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use cardcast_core::StateStore;
use tracing::{debug, info};

use crate::StoreError;

/// File-backed [`StateStore`].
///
/// Every write goes to a temporary file in the same directory which is then
/// renamed over the target, so a crash mid-write leaves the previous body in
/// place rather than a truncated one.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open or create the state directory.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        if !dir.is_dir() {
            return Err(StoreError::NotADirectory(dir.to_path_buf()));
        }
        info!(dir = %dir.display(), "opened state directory");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

impl StateStore for JsonDirStore {
    type Error = StoreError;

    fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(name)?;
        match fs::read_to_string(&path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, body: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp.write_all(body.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path)?;
        debug!(path = %path.display(), bytes = body.len(), "wrote aggregate");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cardcast_core::persist::load;
    use cardcast_core::{
        Aggregate, BotState, ChannelBinding, ChannelBindingAction, ChannelRole, Dirty,
        EngineConfig, InboundMessage, Predictor,
    };
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_aggregate_reads_none() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDirStore::open(tmp.path()).unwrap();
        assert!(store.read("samples").unwrap().is_none());
    }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDirStore::open(tmp.path()).unwrap();
        store.write("channels", "{}").unwrap();
        store.write("channels", r#"{"a":1}"#).unwrap();
        assert_eq!(store.read("channels").unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert!(tmp.path().join("channels.json").exists());
    }

    #[test]
    fn creates_nested_directory() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        let store = JsonDirStore::open(&nested).unwrap();
        assert_eq!(store.dir(), nested.as_path());
        assert!(nested.is_dir());
    }

    #[test]
    fn rejects_path_like_names() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDirStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.write("../escape", "{}"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(store.read("").is_err());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDirStore::open(tmp.path()).unwrap();
        store.write("rules", "[]").unwrap();
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn corrupt_file_loads_default() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("channels.json"), "not json").unwrap();
        let store = JsonDirStore::open(tmp.path()).unwrap();
        let channels: ChannelBinding = load(&store, Aggregate::Channels);
        assert_eq!(channels, ChannelBinding::default());
    }

    #[test]
    fn state_survives_restart() {
        let tmp = TempDir::new().unwrap();
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        {
            let store = JsonDirStore::open(tmp.path()).unwrap();
            let mut predictor = Predictor::new(store, EngineConfig::default());
            predictor.bind_channel(ChannelBindingAction {
                role: ChannelRole::Source,
                chat_id: 1,
            });
            predictor.bind_channel(ChannelBindingAction {
                role: ChannelRole::Output,
                chat_id: 2,
            });
            let msg = InboundMessage {
                chat_id: 1,
                message_id: 10,
                text: "#N50. (10♥️ 3♦️) ✅".to_string(),
                edited: false,
            };
            assert_eq!(predictor.handle_message(&msg, now).len(), 1);
        }

        let store = JsonDirStore::open(tmp.path()).unwrap();
        let state = BotState::load(&store);
        assert!(state.predictions.contains(52));
        assert_eq!(state.channels.output_channel_id, Some(2));
        assert!(state.cooldown.last_prediction.is_some());
        assert!(state.flush(&store, &Dirty::all()).is_clean());
    }
}
