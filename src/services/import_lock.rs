//! In-flight import registry
//!
//! At most one visit import runs per company. `try_acquire` hands out an RAII
//! `ImportGuard`; dropping the guard frees the company for the next import.

use std::collections::HashSet;
use std::sync::Arc;
use parking_lot::Mutex;
use uuid::Uuid;

/// Held for the duration of one import run
pub struct ImportGuard {
    company_id: Uuid,
    registry: ImportLocks,
}

impl Drop for ImportGuard {
    fn drop(&mut self) {
        self.registry.release(&self.company_id);
    }
}

/// Companies with an import in flight
#[derive(Clone, Default)]
pub struct ImportLocks {
    running: Arc<Mutex<HashSet<Uuid>>>,
}

impl ImportLocks {
    /// Mark the company busy. `None` if an import is already running for it.
    pub fn try_acquire(&self, company_id: Uuid) -> Option<ImportGuard> {
        if !self.running.lock().insert(company_id) {
            return None;
        }
        Some(ImportGuard {
            company_id,
            registry: self.clone(),
        })
    }

    pub fn is_running(&self, company_id: &Uuid) -> bool {
        self.running.lock().contains(company_id)
    }

    fn release(&self, company_id: &Uuid) {
        self.running.lock().remove(company_id);
    }
}
