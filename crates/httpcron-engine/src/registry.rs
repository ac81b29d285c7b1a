//! The Active-Execution Registry: a process-local set of schedule IDs
//! currently in flight, admission-gating overlapping Run Executors.
//!
//! This is strictly an anti-duplication guard within this process. It is
//! not a distributed lock: running two engine instances against the same
//! database will duplicate dispatches.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

/// Process-local, mutex-guarded set of schedule IDs with a live Run Executor.
#[derive(Default)]
pub struct ActiveExecutionRegistry {
    inflight: Mutex<HashSet<Uuid>>,
}

impl ActiveExecutionRegistry {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashSet::new()),
        }
    }

    /// Atomically inserts `id` if absent. Returns `true` on admission,
    /// `false` if a Run Executor for this schedule is already in flight.
    pub fn try_admit(&self, id: Uuid) -> bool {
        self.inflight.lock().insert(id)
    }

    /// Removes `id`; a no-op if it was not present.
    pub fn release(&self, id: Uuid) {
        self.inflight.lock().remove(&id);
    }

    /// Current admitted count, for diagnostics/tests.
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inflight.lock().contains(&id)
    }
}

/// RAII guard releasing a schedule from the registry on drop -- used by the
/// Run Executor so release happens on every exit path, including panics.
pub struct AdmissionGuard<'a> {
    registry: &'a ActiveExecutionRegistry,
    id: Uuid,
}

impl<'a> AdmissionGuard<'a> {
    /// Attempts admission; returns `None` if the schedule is already in flight.
    pub fn acquire(registry: &'a ActiveExecutionRegistry, id: Uuid) -> Option<Self> {
        if registry.try_admit(id) {
            Some(Self { registry, id })
        } else {
            None
        }
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// Owned counterpart to `AdmissionGuard`, holding an `Arc` instead of a
/// borrow so it can be moved into a spawned `'static` task.
pub struct OwnedAdmissionGuard {
    registry: Arc<ActiveExecutionRegistry>,
    id: Uuid,
}

impl OwnedAdmissionGuard {
    /// Attempts admission; returns `None` if the schedule is already in flight.
    pub fn acquire(registry: Arc<ActiveExecutionRegistry>, id: Uuid) -> Option<Self> {
        if registry.try_admit(id) {
            Some(Self { registry, id })
        } else {
            None
        }
    }
}

impl Drop for OwnedAdmissionGuard {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_admit_is_exclusive() {
        let registry = ActiveExecutionRegistry::new();
        let id = Uuid::new_v4();
        assert!(registry.try_admit(id));
        assert!(!registry.try_admit(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_allows_readmission() {
        let registry = ActiveExecutionRegistry::new();
        let id = Uuid::new_v4();
        assert!(registry.try_admit(id));
        registry.release(id);
        assert!(registry.try_admit(id));
    }

    #[test]
    fn release_of_absent_id_is_noop() {
        let registry = ActiveExecutionRegistry::new();
        registry.release(Uuid::new_v4());
        assert!(registry.is_empty());
    }

    #[test]
    fn admission_guard_releases_on_drop() {
        let registry = ActiveExecutionRegistry::new();
        let id = Uuid::new_v4();
        {
            let _guard = AdmissionGuard::acquire(&registry, id).expect("should admit");
            assert!(registry.contains(id));
        }
        assert!(!registry.contains(id));
    }

    #[test]
    fn admission_guard_refuses_when_already_admitted() {
        let registry = ActiveExecutionRegistry::new();
        let id = Uuid::new_v4();
        let _first = AdmissionGuard::acquire(&registry, id).expect("should admit");
        assert!(AdmissionGuard::acquire(&registry, id).is_none());
    }

    #[test]
    fn owned_admission_guard_releases_on_drop() {
        let registry = Arc::new(ActiveExecutionRegistry::new());
        let id = Uuid::new_v4();
        {
            let _guard = OwnedAdmissionGuard::acquire(registry.clone(), id).expect("should admit");
            assert!(registry.contains(id));
        }
        assert!(!registry.contains(id));
    }

    #[test]
    fn owned_admission_guard_refuses_when_already_admitted() {
        let registry = Arc::new(ActiveExecutionRegistry::new());
        let id = Uuid::new_v4();
        let _first = OwnedAdmissionGuard::acquire(registry.clone(), id).expect("should admit");
        assert!(OwnedAdmissionGuard::acquire(registry.clone(), id).is_none());
    }
}
