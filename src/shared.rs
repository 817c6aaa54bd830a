use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

use crate::error::Result;
use crate::manager::TaskManager;
use crate::snapshot::ScheduleSnapshot;

/// A `TaskManager` behind one coarse lock, shareable across threads.
///
/// Every mutation goes through [`SharedProject::update`], so edits are
/// serialized. Readers that need the schedule for longer than a lookup take a
/// [`ScheduleSnapshot`] and release the lock right away.
#[derive(Debug, Clone)]
pub struct SharedProject {
    manager: Arc<RwLock<TaskManager>>,
}

impl SharedProject {
    pub fn new(manager: TaskManager) -> Self {
        Self {
            manager: Arc::new(RwLock::new(manager)),
        }
    }

    pub fn with_shared(manager: Arc<RwLock<TaskManager>>) -> Self {
        Self { manager }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, TaskManager> {
        self.manager.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, TaskManager> {
        self.manager.write()
    }

    /// Runs `edit` with exclusive access.
    pub fn update<T>(&self, edit: impl FnOnce(&mut TaskManager) -> Result<T>) -> Result<T> {
        let mut manager = self.manager.write();
        edit(&mut manager)
    }

    /// Runs several edits with the scheduler off, then recalculates once.
    pub fn batch<T>(&self, edit: impl FnOnce(&mut TaskManager) -> Result<T>) -> Result<T> {
        let mut manager = self.manager.write();
        let enabled = manager.is_scheduler_enabled();
        manager.set_scheduler_enabled(false);
        let result = edit(&mut manager);
        manager.set_scheduler_enabled(enabled);
        let value = result?;
        if enabled {
            manager.recalculate_schedule()?;
        }
        Ok(value)
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        self.manager.read().snapshot()
    }
}
