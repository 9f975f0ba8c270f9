//! Coordination core: lock/reservation protocol, retry queue, drain
//! scheduling and the webhook entry point.

pub mod audit;
pub mod coordinator;
pub mod drain;
pub mod error;
pub mod reconcile;
pub mod spawn;
pub mod store;
pub mod webhook;

pub use audit::{
    build_audit_event, Actor, AuditAction, AuditEvent, AuditSink, AuditTrail, InMemoryAuditSink,
    SharedAuditSink,
};
pub use coordinator::{Acquisition, KeySpace, LockCoordinator, LockGuard};
pub use drain::{
    run_drain, DrainGate, DrainPermit, DrainReport, DrainScheduler, DrainSettings, DrainStart,
    ProcessDrainGate,
};
pub use error::{AppResult, SyncError};
pub use reconcile::{DrainStep, ReconcileOutcome, Reconciler};
pub use spawn::{spawn_outliving, Spawn};
pub use store::{CalendarProvider, EventStore, EventUpdate, LockStore, PolicyEvaluator, UserCalendar};
pub use webhook::{verify_channel, WebhookHandler, WebhookOutcome};
