//! Maintenance (C5): keeps L1/L2 consistent with the concept store and
//! schedules codec refits as the concept population grows.

mod refit;
mod sync_worker;

pub use refit::{RefitDecision, RefitScheduler};
pub use sync_worker::{MaintenanceError, SyncReport, SyncWorker};
