//! One-run-per-group mutual exclusion.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use iapfeed_common::DeviceGroup;

use crate::error::PipelineError;

/// Set of groups with a run in progress.
///
/// Cheap to clone; clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct RunLocks {
    active: Arc<Mutex<HashSet<DeviceGroup>>>,
}

/// Holds a group's lock until dropped.
#[derive(Debug)]
pub struct RunGuard {
    locks: RunLocks,
    group: DeviceGroup,
}

impl RunLocks {
    /// Creates an empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `group`, or fails if a run already holds it.
    pub fn acquire(&self, group: DeviceGroup) -> Result<RunGuard, PipelineError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(group) {
            return Err(PipelineError::AlreadyRunning { group });
        }
        Ok(RunGuard {
            locks: self.clone(),
            group,
        })
    }

    /// Returns `true` while a run for `group` holds the lock.
    pub fn is_running(&self, group: DeviceGroup) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&group)
    }
}

impl RunGuard {
    /// The locked group.
    pub fn group(&self) -> DeviceGroup {
        self.group
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.locks
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused() {
        let locks = RunLocks::new();
        let guard = locks.acquire(DeviceGroup::Cmts).unwrap();
        assert!(locks.is_running(DeviceGroup::Cmts));
        let err = locks.acquire(DeviceGroup::Cmts).unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyRunning { group: DeviceGroup::Cmts }));
        assert_eq!(guard.group(), DeviceGroup::Cmts);
    }

    #[test]
    fn groups_are_independent() {
        let locks = RunLocks::new();
        let _cmts = locks.acquire(DeviceGroup::Cmts).unwrap();
        assert!(locks.acquire(DeviceGroup::Pe).is_ok());
    }

    #[test]
    fn drop_releases() {
        let locks = RunLocks::new();
        drop(locks.acquire(DeviceGroup::Pe).unwrap());
        assert!(!locks.is_running(DeviceGroup::Pe));
        assert!(locks.acquire(DeviceGroup::Pe).is_ok());
    }
}
