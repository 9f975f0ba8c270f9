//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calendar_sync::builders::SyncServiceBuilder;
use calendar_sync::config::SyncConfig;
use calendar_sync::core::{
    AppResult, AuditTrail, DrainGate, EventStore, InMemoryAuditSink, LockStore, PolicyEvaluator,
    ProcessDrainGate, Spawn, SyncError, WebhookHandler,
};
use calendar_sync::infra::{InMemoryCalendar, InMemoryEventStore, InMemoryLockStore};
use calendar_sync::runtime::TokioSpawner;
use calendar_sync::util::serde::{CalendarEvent, EventDetails, SyncKey, WebhookStatus};
use tokio::sync::Notify;
use chrono::Utc;
use parking_lot::Mutex;

pub const CHANNEL: &str = "channel-secret";

pub fn details(uuid: &str, host_id: u32) -> EventDetails {
    let start = Utc::now() + chrono::Duration::days(1);
    EventDetails {
        team_id: Some(1),
        host_id,
        email: format!("user{host_id}@example.com"),
        event: CalendarEvent {
            id: host_id,
            uuid: uuid.to_string(),
            email: format!("user{host_id}@example.com"),
            start_time: start,
            end_time: start + chrono::Duration::minutes(30),
            timezone: Some("America/New_York".into()),
            data: serde_json::json!({}),
            channel_id: Some(CHANNEL.into()),
        },
        webhook_status: WebhookStatus::Pending,
    }
}

/// Evaluator that counts invocations and always asks for the same body.
#[derive(Default)]
pub struct CountingEvaluator {
    calls: AtomicUsize,
    no_event: bool,
}

impl CountingEvaluator {
    pub fn no_event() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            no_event: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyEvaluator for CountingEvaluator {
    async fn evaluate(&self, details: &EventDetails) -> AppResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.no_event {
            return Ok(None);
        }
        Ok(Some(format!("Host {} is failing policies", details.host_id)))
    }
}

/// Spawner that keeps every future without running it until asked.
#[derive(Clone, Default)]
pub struct HeldSpawner {
    held: Arc<Mutex<Vec<Pin<Box<dyn Future<Output = ()> + Send>>>>>,
    spawned: Arc<AtomicUsize>,
}

impl HeldSpawner {
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Run every held future to completion, in spawn order.
    pub async fn run_all(&self) {
        let futures: Vec<_> = std::mem::take(&mut *self.held.lock());
        for fut in futures {
            fut.await;
        }
    }
}

impl Spawn for HeldSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.held.lock().push(Box::pin(fut));
    }
}

/// Lock store whose reservation and lock outcomes are scripted, recording
/// every set mutation.
#[derive(Default)]
pub struct ScriptedLockStore {
    pub reserved: Option<String>,
    acquire_results: Mutex<VecDeque<bool>>,
    pub set: Mutex<BTreeSet<String>>,
    pub set_mutations: AtomicUsize,
    pub acquire_calls: AtomicUsize,
}

impl ScriptedLockStore {
    pub fn new(reserved: bool, acquire_results: &[bool]) -> Self {
        Self {
            reserved: reserved.then(|| "cron".to_string()),
            acquire_results: Mutex::new(acquire_results.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn members(&self) -> Vec<String> {
        self.set.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl LockStore for ScriptedLockStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        if key.contains("reserved:") {
            return Ok(self.reserved.clone());
        }
        Ok(None)
    }

    async fn acquire_lock(&self, _key: &str, _value: &str, ttl: Duration) -> Result<bool, SyncError> {
        assert!(!ttl.is_zero(), "locks must always carry a TTL");
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.acquire_results.lock().pop_front().unwrap_or(false))
    }

    async fn release_lock(&self, _key: &str, _value: &str) -> Result<bool, SyncError> {
        Ok(true)
    }

    async fn add_to_set(&self, _key: &str, member: &str) -> Result<(), SyncError> {
        self.set_mutations.fetch_add(1, Ordering::SeqCst);
        self.set.lock().insert(member.to_string());
        Ok(())
    }

    async fn remove_from_set(&self, _key: &str, member: &str) -> Result<(), SyncError> {
        self.set_mutations.fetch_add(1, Ordering::SeqCst);
        self.set.lock().remove(member);
        Ok(())
    }

    async fn get_set(&self, _key: &str) -> Result<Vec<String>, SyncError> {
        Ok(self.members())
    }
}

/// In-memory lock store with injectable failures, and a `get_set` that can be
/// held open after taking its snapshot.
#[derive(Default)]
pub struct FlakyLockStore {
    inner: InMemoryLockStore,
    pub fail_get: AtomicBool,
    pub fail_get_set: AtomicBool,
    hold_next_get_set: AtomicBool,
    held: Notify,
    resume: Notify,
}

impl FlakyLockStore {
    /// Make the next `get_set` call pause after its snapshot until
    /// [`Self::resume_get_set`].
    pub fn hold_next_get_set(&self) {
        self.hold_next_get_set.store(true, Ordering::SeqCst);
    }

    /// Wait until a `get_set` call is paused.
    pub async fn get_set_held(&self) {
        self.held.notified().await;
    }

    pub fn resume_get_set(&self) {
        self.resume.notify_one();
    }
}

impl Deref for FlakyLockStore {
    type Target = InMemoryLockStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[async_trait]
impl LockStore for FlakyLockStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(SyncError::LockStore("connection reset".into()));
        }
        self.inner.get(key).await
    }

    async fn acquire_lock(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, SyncError> {
        self.inner.acquire_lock(key, value, ttl).await
    }

    async fn release_lock(&self, key: &str, value: &str) -> Result<bool, SyncError> {
        self.inner.release_lock(key, value).await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), SyncError> {
        self.inner.add_to_set(key, member).await
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), SyncError> {
        self.inner.remove_from_set(key, member).await
    }

    async fn get_set(&self, key: &str) -> Result<Vec<String>, SyncError> {
        if self.fail_get_set.load(Ordering::SeqCst) {
            return Err(SyncError::LockStore("connection reset".into()));
        }
        let snapshot = self.inner.get_set(key).await?;
        if self.hold_next_get_set.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.resume.notified().await;
        }
        Ok(snapshot)
    }
}

/// In-memory event store whose reads can be made to fail.
#[derive(Default)]
pub struct FlakyEventStore {
    inner: InMemoryEventStore,
    pub fail_reads: AtomicBool,
    attempts: AtomicUsize,
}

impl FlakyEventStore {
    /// Detail lookups attempted, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Deref for FlakyEventStore {
    type Target = InMemoryEventStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[async_trait]
impl EventStore for FlakyEventStore {
    async fn calendar_integration_enabled(&self) -> Result<bool, SyncError> {
        self.inner.calendar_integration_enabled().await
    }

    async fn get_event_details_by_sync_key(
        &self,
        key: &SyncKey,
    ) -> Result<EventDetails, SyncError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Datastore("deadlock found".into()));
        }
        self.inner.get_event_details_by_sync_key(key).await
    }

    async fn save_event_snapshot(
        &self,
        host_id: u32,
        event: &CalendarEvent,
    ) -> Result<(), SyncError> {
        self.inner.save_event_snapshot(host_id, event).await
    }
}

/// Fully wired service over in-memory backends.
pub struct Harness<S> {
    pub config: SyncConfig,
    pub locks: Arc<FlakyLockStore>,
    pub events: Arc<FlakyEventStore>,
    pub calendar: InMemoryCalendar,
    pub evaluator: Arc<CountingEvaluator>,
    pub gate: Arc<ProcessDrainGate>,
    pub audit: Arc<Mutex<InMemoryAuditSink>>,
    pub handler: WebhookHandler<S>,
}

impl<S> Harness<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    pub fn with_spawner(spawner: S, evaluator: CountingEvaluator) -> Self {
        calendar_sync::util::init_tracing();
        let config = SyncConfig {
            drain_idle_backoff_ms: 10,
            drain_max_idle_passes: 3,
            ..SyncConfig::default()
        };
        let locks = Arc::new(FlakyLockStore::default());
        let events = Arc::new(FlakyEventStore::default());
        let calendar = InMemoryCalendar::new();
        let evaluator = Arc::new(evaluator);
        let gate = Arc::new(ProcessDrainGate::new());
        let audit = Arc::new(Mutex::new(InMemoryAuditSink::new(256)));

        let handler = SyncServiceBuilder::new(config.clone())
            .lock_store(locks.clone())
            .event_store(events.clone())
            .calendar(Arc::new(calendar.clone()))
            .evaluator(evaluator.clone())
            .gate(gate.clone())
            .audit(AuditTrail::new(audit.clone()))
            .build(spawner)
            .expect("valid service");

        Self {
            config,
            locks,
            events,
            calendar,
            evaluator,
            gate,
            audit,
            handler,
        }
    }

    pub fn lock_key(&self, uuid: &str) -> String {
        self.config.key_space().lock_key(&SyncKey::new(uuid))
    }

    pub fn reserved_key(&self, uuid: &str) -> String {
        self.config.key_space().reserved_key(&SyncKey::new(uuid))
    }

    /// Pending set as stored, bypassing injected failures.
    pub async fn pending(&self) -> Vec<String> {
        let store: &InMemoryLockStore = &self.locks;
        store
            .get_set(&self.config.key_space().queue_key())
            .await
            .expect("pending set")
    }

    pub async fn enqueue(&self, uuid: &str) {
        self.locks
            .add_to_set(&self.config.key_space().queue_key(), uuid)
            .await
            .expect("enqueue");
    }

    pub fn is_draining(&self) -> bool {
        self.gate.is_draining()
    }
}

impl Harness<TokioSpawner> {
    pub fn tokio(evaluator: CountingEvaluator) -> Self {
        Self::with_spawner(TokioSpawner::current().expect("tokio runtime"), evaluator)
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
