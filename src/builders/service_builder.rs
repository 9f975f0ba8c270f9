//! Builder for the webhook handler and its drain scheduler.

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::core::{
    AuditTrail, CalendarProvider, DrainGate, DrainScheduler, EventStore, LockCoordinator,
    LockStore, PolicyEvaluator, ProcessDrainGate, Reconciler, Spawn, SyncError, WebhookHandler,
};

/// Collects collaborators and builds a [`WebhookHandler`].
pub struct SyncServiceBuilder {
    config: SyncConfig,
    lock_store: Option<Arc<dyn LockStore>>,
    events: Option<Arc<dyn EventStore>>,
    calendar: Option<Arc<dyn CalendarProvider>>,
    evaluator: Option<Arc<dyn PolicyEvaluator>>,
    audit: AuditTrail,
    gate: Option<Arc<dyn DrainGate>>,
}

impl SyncServiceBuilder {
    /// Start from a configuration.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            lock_store: None,
            events: None,
            calendar: None,
            evaluator: None,
            audit: AuditTrail::disabled(),
            gate: None,
        }
    }

    /// Configuration in use.
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Shared lock store.
    #[must_use]
    pub fn lock_store(mut self, store: Arc<dyn LockStore>) -> Self {
        self.lock_store = Some(store);
        self
    }

    /// Persistent event store.
    #[must_use]
    pub fn event_store(mut self, events: Arc<dyn EventStore>) -> Self {
        self.events = Some(events);
        self
    }

    /// Calendar provider client.
    #[must_use]
    pub fn calendar(mut self, calendar: Arc<dyn CalendarProvider>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Policy evaluator callback.
    #[must_use]
    pub fn evaluator(mut self, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Audit trail for coordination decisions.
    #[must_use]
    pub fn audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    /// Drain gate; defaults to a fresh [`ProcessDrainGate`].
    #[must_use]
    pub fn gate(mut self, gate: Arc<dyn DrainGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Validate the configuration and build the handler.
    ///
    /// # Errors
    ///
    /// [`SyncError::Config`] when the configuration is invalid or a
    /// collaborator is missing.
    pub fn build<S>(self, spawner: S) -> Result<WebhookHandler<S>, SyncError>
    where
        S: Spawn + Clone + Send + Sync + 'static,
    {
        self.config.validate().map_err(SyncError::Config)?;
        let lock_store = required(self.lock_store, "lock store")?;
        let events = required(self.events, "event store")?;
        let calendar = required(self.calendar, "calendar provider")?;
        let evaluator = required(self.evaluator, "policy evaluator")?;

        let coordinator =
            LockCoordinator::new(lock_store, self.config.key_space(), self.config.lock_ttl())?;
        let reconciler =
            Reconciler::new(coordinator, events, calendar, evaluator).with_audit(self.audit);
        let gate = self
            .gate
            .unwrap_or_else(|| Arc::new(ProcessDrainGate::new()) as Arc<dyn DrainGate>);
        let scheduler = DrainScheduler::new(
            Arc::new(reconciler),
            gate,
            spawner.clone(),
            self.config.drain_settings(),
        );
        Ok(WebhookHandler::new(scheduler, spawner))
    }
}

fn required<T>(value: Option<T>, what: &str) -> Result<T, SyncError> {
    value.ok_or_else(|| SyncError::Config(format!("{what} not configured")))
}
