//! Bulk cleanup and deferred teardown

use super::registry::{teardown, HandleRegistry};
use super::{HandleEntry, HandleValue};
use crate::error::{EngineError, EngineResult};
use crate::flags::ObjectFlags;

/// Parameters of a bulk cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupRequest {
    /// Abort at the first teardown failure
    pub stop_on_error: bool,
    /// Tear down values now instead of queueing them
    pub synchronous: bool,
    /// Only remove unlocked handles without references
    pub references_only: bool,
    /// Override each handle's `NoDispose` flag
    pub force_dispose: Option<bool>,
}

impl Default for CleanupRequest {
    fn default() -> Self {
        Self {
            stop_on_error: false,
            synchronous: true,
            references_only: false,
            force_dispose: None,
        }
    }
}

/// Outcome of a bulk cleanup or a pending-queue flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Values whose teardown ran
    pub disposed: usize,
    /// Handles removed from the registry
    pub removed: usize,
    /// Teardowns queued instead of run
    pub deferred: usize,
    /// Teardowns that failed
    pub failed: usize,
    /// Failure messages, in order
    pub errors: Vec<String>,
}

impl CleanupReport {
    fn merge(&mut self, other: CleanupReport) {
        self.disposed += other.disposed;
        self.removed += other.removed;
        self.deferred += other.deferred;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}

/// Teardown postponed by a non-synchronous cleanup or an auto-dispose
pub(crate) struct PendingTeardown {
    name: String,
    value: HandleValue,
    flags: ObjectFlags,
    force_dispose: Option<bool>,
}

impl PendingTeardown {
    pub(super) fn from_entry(entry: HandleEntry, force_dispose: Option<bool>) -> Self {
        Self {
            name: entry.name,
            value: entry.value,
            flags: entry.flags,
            force_dispose,
        }
    }
}

impl HandleRegistry {
    /// Run every queued teardown.
    ///
    /// The handles are already gone, so failures are only reported.
    pub fn flush_pending(&self) -> CleanupReport {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut report = CleanupReport::default();
        for item in pending {
            match teardown(&item.name, &item.value, item.flags, item.force_dispose) {
                Ok(true) => report.disposed += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!(
                        target: "ferry::handles",
                        "deferred dispose of {} failed: {}",
                        item.name,
                        e
                    );
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", item.name, e));
                }
            }
        }
        report
    }

    /// Number of queued teardowns
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Remove handles in bulk.
    ///
    /// Handles are visited in creation order. Without `references_only`
    /// every handle is removed regardless of references or locking; with it
    /// only unlocked handles without references are. A handle whose teardown
    /// fails stays registered and is counted in `failed`.
    pub fn cleanup(&self, request: &CleanupRequest) -> EngineResult<CleanupReport> {
        let mut report = CleanupReport::default();
        if request.synchronous {
            report.merge(self.flush_pending());
        }

        let mut names: Vec<(u64, String)> = {
            let table = self.table.read();
            table
                .entries
                .values()
                .filter(|e| !request.references_only || (e.ref_count == 0 && !e.is_locked()))
                .map(|e| (e.id, e.name.clone()))
                .collect()
        };
        names.sort_unstable();

        for (_, name) in names {
            let Some(entry) = self.table.write().take(&name) else {
                continue;
            };

            if !request.synchronous {
                self.pending
                    .lock()
                    .push(PendingTeardown::from_entry(entry, request.force_dispose));
                report.deferred += 1;
                report.removed += 1;
                continue;
            }

            match teardown(&entry.name, &entry.value, entry.flags, request.force_dispose) {
                Ok(disposed) => {
                    if disposed {
                        report.disposed += 1;
                    }
                    report.removed += 1;
                }
                Err(source) => {
                    log::warn!(target: "ferry::handles", "cleanup of {} failed: {}", name, source);
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", name, source));
                    self.table.write().restore(entry);
                    if request.stop_on_error {
                        return Err(EngineError::DisposeFailed { name, source });
                    }
                }
            }
        }

        log::debug!(
            target: "ferry::handles",
            "cleanup: disposed={} removed={} deferred={} failed={}",
            report.disposed,
            report.removed,
            report.deferred,
            report.failed
        );
        Ok(report)
    }
}
