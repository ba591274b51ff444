//! Model persistence.
//!
//! The model is stored as a JSON document under a single key. Saving is
//! driven by the bus going idle, so a burst of commands produces one write
//! once everything has settled.

use crate::dispatch::IdleSubscription;
use crate::error::{Result, WhiteboardError};
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::rc::Rc;

use super::command::WhiteboardBus;
use super::model::{Model, SharedModel};

/// Key the model is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "get_to_the_end";

/// Key-value home for a serialized [`Model`].
pub trait ModelStorage {
    /// Load the stored model. Fails with `ModelNotFound` if none exists.
    fn load(&self) -> Result<Model>;

    fn save(&self, model: &Model) -> Result<()>;

    fn has_model(&self) -> bool;

    /// Delete the stored model. Removing a missing model is not an error.
    fn remove(&self) -> Result<()>;
}

/// In-memory storage holding the JSON text.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: RefCell<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored document.
    pub fn raw(&self) -> Option<String> {
        self.slot.borrow().clone()
    }
}

impl ModelStorage for MemoryStorage {
    fn load(&self) -> Result<Model> {
        let slot = self.slot.borrow();
        let text = slot
            .as_deref()
            .ok_or_else(|| WhiteboardError::ModelNotFound(DEFAULT_STORAGE_KEY.to_string()))?;
        Ok(serde_json::from_str(text)?)
    }

    fn save(&self, model: &Model) -> Result<()> {
        let text = serde_json::to_string(model)?;
        *self.slot.borrow_mut() = Some(text);
        Ok(())
    }

    fn has_model(&self) -> bool {
        self.slot.borrow().is_some()
    }

    fn remove(&self) -> Result<()> {
        self.slot.borrow_mut().take();
        Ok(())
    }
}

/// File storage configuration.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Directory holding the model file.
    pub dir: PathBuf,

    /// Storage key; the file is `<key>.json`.
    /// Default: "get_to_the_end"
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./whiteboard"),
            key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// Stores the model as a JSON file.
#[derive(Clone, Debug)]
pub struct FileStorage {
    config: StorageConfig,
}

impl FileStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn path(&self) -> PathBuf {
        self.config.dir.join(format!("{}.json", self.config.key))
    }
}

impl ModelStorage for FileStorage {
    fn load(&self) -> Result<Model> {
        let bytes = match fs::read(self.path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WhiteboardError::ModelNotFound(self.config.key.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save(&self, model: &Model) -> Result<()> {
        fs::create_dir_all(&self.config.dir)?;

        // Write then rename so a crash never leaves a torn file.
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(model)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn has_model(&self) -> bool {
        self.path().exists()
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Saves the model whenever the bus drains.
#[derive(Default)]
pub struct ModelPersistence {
    idle: Option<IdleSubscription>,
}

impl ModelPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the idle hook. Does nothing if already storing.
    pub fn start_storing(
        &mut self,
        bus: &WhiteboardBus,
        model: SharedModel,
        storage: Rc<dyn ModelStorage>,
    ) {
        if self.is_storing() {
            return;
        }

        let idle = bus.add_idle(move || {
            let Ok(model) = model.try_borrow() else {
                tracing::warn!("model busy, skipping save");
                return;
            };
            match storage.save(&model) {
                Ok(()) => tracing::debug!("model saved"),
                Err(e) => tracing::warn!(error = %e, "failed to save model"),
            }
        });
        self.idle = Some(idle);
    }

    pub fn stop_storing(&mut self) {
        if let Some(idle) = self.idle.take() {
            idle.unsubscribe();
        }
    }

    pub fn is_storing(&self) -> bool {
        self.idle.as_ref().is_some_and(|i| !i.is_unsubscribed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_round_trip() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.load(),
            Err(WhiteboardError::ModelNotFound(_))
        ));

        let mut model = Model::empty();
        model.foreground_color = "#ff0000".to_string();
        storage.save(&model).unwrap();

        assert!(storage.has_model());
        assert!(storage.raw().unwrap().contains("foregroundColor"));
        assert_eq!(storage.load().unwrap(), model);

        storage.remove().unwrap();
        assert!(!storage.has_model());
    }

    #[test]
    fn test_file_storage() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(StorageConfig {
            dir: dir.path().join("nested"),
            ..Default::default()
        });

        assert!(!storage.has_model());
        assert!(matches!(
            storage.load(),
            Err(WhiteboardError::ModelNotFound(key)) if key == DEFAULT_STORAGE_KEY
        ));

        storage.save(&Model::empty()).unwrap();
        assert!(storage.path().ends_with("get_to_the_end.json"));
        assert_eq!(storage.load().unwrap(), Model::empty());

        storage.remove().unwrap();
        storage.remove().unwrap();
        assert!(!storage.has_model());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(StorageConfig {
            dir: dir.path().to_path_buf(),
            key: "board".to_string(),
        });
        fs::write(storage.path(), b"{not json").unwrap();

        assert!(matches!(
            storage.load(),
            Err(WhiteboardError::Deserialization(_))
        ));
    }
}
