//! Durable key-value record of transfer task status and counters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use lectern_protocol::types::{TaskStatus, TransferTask};

use crate::{StoreError, write_atomic};

/// Persistent store of [`TransferTask`] records, keyed by course id.
///
/// Records are cached in memory and persisted to a single JSON file.
/// The file stays small: item lists live in [`crate::ItemQueue`].
pub struct TaskStore {
    path: PathBuf,
    tasks: RwLock<HashMap<String, TransferTask>>,
}

impl TaskStore {
    /// Opens the store, loading existing records from disk.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let tasks = load_tasks(&path)?;
        Ok(Self {
            path,
            tasks: RwLock::new(tasks),
        })
    }

    /// Returns the task for a course, if any.
    pub fn get(&self, course_id: &str) -> Option<TransferTask> {
        self.tasks.read().unwrap().get(course_id).cloned()
    }

    /// Inserts or replaces a task record and persists.
    pub fn put(&self, task: TransferTask) -> Result<(), StoreError> {
        {
            let mut map = self.tasks.write().unwrap();
            map.insert(task.course_id.clone(), task);
        }
        self.persist()
    }

    /// Removes a task record and persists.
    pub fn remove(&self, course_id: &str) -> Result<(), StoreError> {
        {
            let mut map = self.tasks.write().unwrap();
            map.remove(course_id);
        }
        self.persist()
    }

    /// Returns all tasks with status [`TaskStatus::Active`], for resume.
    pub fn active_tasks(&self) -> Vec<TransferTask> {
        self.tasks
            .read()
            .unwrap()
            .values()
            .filter(|t| t.status == TaskStatus::Active)
            .cloned()
            .collect()
    }

    /// Writes the current records to disk.
    fn persist(&self) -> Result<(), StoreError> {
        let map = self.tasks.read().unwrap();
        let json = serde_json::to_string_pretty(&*map)?;
        write_atomic(&self.path, &json)?;
        debug!("persisted {} task record(s) to {:?}", map.len(), self.path);
        Ok(())
    }
}

/// Loads task records from a JSON file on disk.
fn load_tasks(path: &Path) -> Result<HashMap<String, TransferTask>, StoreError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let data = std::fs::read_to_string(path)?;
    let tasks: HashMap<String, TransferTask> = serde_json::from_str(&data)?;
    debug!("loaded {} task record(s) from {:?}", tasks.len(), path);
    Ok(tasks)
}
