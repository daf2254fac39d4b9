//! State Transition Engine
//!
//! Mediates every local read and write of a (participant, component) pair
//! and applies the contract-driven downgrades a write causes on the other
//! sharers of the component. All state, version and staleness-bound
//! mutations in the system go through this type.
//!
//! Each record is updated under its own lock. A write first finishes the
//! writer's record, releases it, then visits the sharers one at a time; the
//! propagation is not atomic across records and a store failure part way
//! through leaves the remaining sharers untouched until the next write or
//! background sweep.

use crate::locks::RecordLocks;
use crate::metrics::{MetricsRecorder, MetricsReport};
use async_trait::async_trait;
use chrono::Duration;
use coherence_core::effects::{ClockEffects, StateChangeSink, StateStore};
use coherence_core::transitions::{
    pick_authoritative, read_fill_state, remote_write_downgrade, tracks_staleness,
};
use coherence_core::{
    CoherenceConfig, CoherenceError, CoherenceResult, CoherenceState, ComponentId,
    ComponentStateRecord, ConsistencyType, ParticipantId, RecordKey, StateChangeEvent,
    TransitionCause,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Protocol entry points consumed by the operation model runner
#[async_trait]
pub trait CoherenceEffects: Send + Sync {
    /// Local read of `component` by `participant`
    async fn handle_read(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord>;

    /// Local write of `component` by `participant`
    async fn handle_write(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord>;

    /// Current record for a pair without creating it
    async fn component_state(
        &self,
        key: &RecordKey,
    ) -> CoherenceResult<Option<ComponentStateRecord>>;
}

/// Coherence protocol over a [`StateStore`]
pub struct StateTransitionEngine {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn ClockEffects>,
    events: Arc<dyn StateChangeSink>,
    metrics: Arc<MetricsRecorder>,
    locks: RecordLocks,
    staleness_window: Duration,
}

impl StateTransitionEngine {
    /// Create an engine over explicit handles
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn ClockEffects>,
        events: Arc<dyn StateChangeSink>,
        metrics: Arc<MetricsRecorder>,
        config: &CoherenceConfig,
    ) -> CoherenceResult<Self> {
        let staleness_window = Duration::from_std(config.staleness_window()).map_err(|e| {
            CoherenceError::invalid(format!("staleness_window_secs out of range: {e}"))
        })?;
        Ok(Self {
            store,
            clock,
            events,
            metrics,
            locks: RecordLocks::new(),
            staleness_window,
        })
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Clock used for timestamps and staleness deadlines
    pub fn clock(&self) -> &Arc<dyn ClockEffects> {
        &self.clock
    }

    /// Record `participant`'s write of `component` and downgrade its sharers.
    ///
    /// Returns the writer's record as persisted. Store failures while
    /// visiting sharers are returned after the writer's record is already
    /// committed.
    pub async fn handle_write(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord> {
        let key = RecordKey::new(participant.clone(), component.clone());
        self.metrics
            .log_operation(&key, "write", None, self.clock.now());

        let written = {
            let _guard = self.locks.acquire(&key).await;
            let mut record = self.fetch_or_create(&key).await?;
            let old_state = record.state;
            record.state = CoherenceState::Modified;
            record.version = record.version.saturating_add(1);
            record.timestamp = self.clock.now();
            self.store.upsert(record.clone()).await?;
            self.publish_if_changed(&record, old_state, TransitionCause::Write);
            record
        };

        let sharers = self
            .store
            .find_by_component_excluding_participant(component, participant)
            .await?;
        for sharer in sharers {
            self.apply_remote_write(&sharer.key()).await?;
        }

        Ok(written)
    }

    /// Resolve `participant`'s read of `component`.
    ///
    /// An INVALID record pulls from the authoritative source if one exists.
    /// An expired bounded-staleness SHARED_MINUS record is invalidated and
    /// resynchronized in the same call.
    pub async fn handle_read(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord> {
        let key = RecordKey::new(participant.clone(), component.clone());
        self.metrics
            .log_operation(&key, "read", None, self.clock.now());

        let _guard = self.locks.acquire(&key).await;
        let mut record = self.fetch_or_create(&key).await?;
        match record.state {
            CoherenceState::Invalid => self.resync_from_source(&mut record).await?,
            CoherenceState::SharedMinus => {
                let expired = tracks_staleness(record.consistency)
                    && record.staleness_expired(self.clock.now());
                if expired {
                    self.set_state(
                        &mut record,
                        CoherenceState::Invalid,
                        TransitionCause::StalenessExpired,
                    )
                    .await?;
                    self.resync_from_source(&mut record).await?;
                }
            }
            CoherenceState::Modified | CoherenceState::SharedPlus => {}
        }
        Ok(record)
    }

    /// Best copy of `component` to read from.
    ///
    /// The highest-ranked MODIFIED record, else the highest-ranked
    /// SHARED_PLUS record. Ranking is by version, then timestamp, then
    /// smallest participant id.
    pub async fn find_authoritative_source(
        &self,
        component: &ComponentId,
    ) -> CoherenceResult<Option<ComponentStateRecord>> {
        for state in [CoherenceState::Modified, CoherenceState::SharedPlus] {
            let candidates = self
                .store
                .find_by_component_and_state(component, state)
                .await?;
            if let Some(source) = pick_authoritative(candidates) {
                return Ok(Some(source));
            }
        }
        Ok(None)
    }

    /// Current record for a pair; `NotFound` if it was never created
    pub async fn get_component_state(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord> {
        let key = RecordKey::new(participant.clone(), component.clone());
        self.store
            .get(&key)
            .await?
            .ok_or_else(|| CoherenceError::not_found(format!("No state record for {key}")))
    }

    /// Administrative contract change.
    ///
    /// Creates the record if needed and leaves its state and version alone.
    /// Switching away from bounded staleness drops the deadline.
    pub async fn declare_contract(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
        consistency: ConsistencyType,
    ) -> CoherenceResult<ComponentStateRecord> {
        let key = RecordKey::new(participant.clone(), component.clone());
        let _guard = self.locks.acquire(&key).await;
        let mut record = self.fetch_or_create(&key).await?;
        let previous = record.consistency;
        record.consistency = consistency;
        if !tracks_staleness(consistency) {
            record.staleness_bound = None;
        }
        self.store.upsert(record.clone()).await?;
        info!(record = %key, from = %previous, to = %consistency, "Declared consistency contract");
        Ok(record)
    }

    /// Every stored record
    pub async fn list_component_states(&self) -> CoherenceResult<Vec<ComponentStateRecord>> {
        Ok(self.store.find_all().await?)
    }

    /// Every record currently in `state`
    pub async fn records_in_state(
        &self,
        state: CoherenceState,
    ) -> CoherenceResult<Vec<ComponentStateRecord>> {
        Ok(self.store.find_by_state(state).await?)
    }

    /// Every participant's record for one component
    pub async fn component_states(
        &self,
        component: &ComponentId,
    ) -> CoherenceResult<Vec<ComponentStateRecord>> {
        Ok(self.store.find_by_component(component).await?)
    }

    /// Live record count per state; every state is present
    pub async fn current_state_distribution(
        &self,
    ) -> CoherenceResult<BTreeMap<CoherenceState, u64>> {
        let mut distribution: BTreeMap<_, _> =
            CoherenceState::ALL.into_iter().map(|s| (s, 0u64)).collect();
        for record in self.store.find_all().await? {
            *distribution.entry(record.state).or_default() += 1;
        }
        Ok(distribution)
    }

    /// Counters plus the live state distribution
    pub async fn metrics_report(&self) -> CoherenceResult<MetricsReport> {
        let distribution = self.current_state_distribution().await?;
        Ok(self.metrics.report(distribution))
    }

    /// Pull a newer version into a SHARED_MINUS record.
    ///
    /// Returns the updated record, or `None` when the record is gone, no
    /// longer SHARED_MINUS, or no source is strictly newer.
    pub async fn resync_stale(
        &self,
        key: &RecordKey,
    ) -> CoherenceResult<Option<ComponentStateRecord>> {
        let _guard = self.locks.acquire(key).await;
        let Some(mut record) = self.store.get(key).await? else {
            return Ok(None);
        };
        if record.state != CoherenceState::SharedMinus {
            return Ok(None);
        }
        let Some(source) = self.find_authoritative_source(&key.component_id).await? else {
            return Ok(None);
        };
        if source.version <= record.version {
            return Ok(None);
        }

        let old_state = record.state;
        record.state = CoherenceState::SharedPlus;
        record.version = source.version;
        record.timestamp = self.clock.now();
        self.store.upsert(record.clone()).await?;
        self.publish_if_changed(&record, old_state, TransitionCause::Resync);
        Ok(Some(record))
    }

    /// Invalidate a record whose staleness deadline has passed.
    ///
    /// Returns true only when the state actually changed. The deadline is
    /// left in place; the next local read replaces it.
    pub async fn expire_if_stale(&self, key: &RecordKey) -> CoherenceResult<bool> {
        let _guard = self.locks.acquire(key).await;
        let Some(mut record) = self.store.get(key).await? else {
            return Ok(false);
        };
        if !record.staleness_expired(self.clock.now()) || record.state == CoherenceState::Invalid
        {
            return Ok(false);
        }
        self.set_state(&mut record, CoherenceState::Invalid, TransitionCause::StalenessExpired)
            .await?;
        Ok(true)
    }

    async fn fetch_or_create(&self, key: &RecordKey) -> CoherenceResult<ComponentStateRecord> {
        if let Some(record) = self.store.get(key).await? {
            return Ok(record);
        }
        let record = ComponentStateRecord::unresolved(key, self.clock.now());
        self.store.upsert(record.clone()).await?;
        debug!(record = %key, "Created state record");
        Ok(record)
    }

    async fn apply_remote_write(&self, key: &RecordKey) -> CoherenceResult<()> {
        let _guard = self.locks.acquire(key).await;
        // Re-read under the lock; the listing may be stale.
        let Some(mut record) = self.store.get(key).await? else {
            return Ok(());
        };
        let old_state = record.state;
        let next = remote_write_downgrade(record.consistency, old_state);
        if next == old_state {
            return Ok(());
        }

        let now = self.clock.now();
        record.state = next;
        record.timestamp = now;
        if tracks_staleness(record.consistency) {
            record.staleness_bound = Some(now + self.staleness_window);
        }
        self.store.upsert(record.clone()).await?;
        self.publish_if_changed(&record, old_state, TransitionCause::RemoteWrite);
        Ok(())
    }

    async fn resync_from_source(&self, record: &mut ComponentStateRecord) -> CoherenceResult<()> {
        let Some(source) = self.find_authoritative_source(&record.component_id).await? else {
            debug!(record = %record.key(), "No authoritative source; record stays INVALID");
            return Ok(());
        };

        let old_state = record.state;
        let now = self.clock.now();
        record.state = read_fill_state(record.consistency);
        // A pair's version never goes backwards, even if the best source lags.
        record.version = record.version.max(source.version);
        record.timestamp = now;
        if tracks_staleness(record.consistency) {
            record.staleness_bound = Some(now + self.staleness_window);
        }
        self.store.upsert(record.clone()).await?;
        self.publish_if_changed(record, old_state, TransitionCause::Read);
        Ok(())
    }

    async fn set_state(
        &self,
        record: &mut ComponentStateRecord,
        state: CoherenceState,
        cause: TransitionCause,
    ) -> CoherenceResult<()> {
        let old_state = record.state;
        record.state = state;
        record.timestamp = self.clock.now();
        self.store.upsert(record.clone()).await?;
        self.publish_if_changed(record, old_state, cause);
        Ok(())
    }

    fn publish_if_changed(
        &self,
        record: &ComponentStateRecord,
        old_state: CoherenceState,
        cause: TransitionCause,
    ) {
        if old_state == record.state {
            return;
        }
        let event = StateChangeEvent {
            participant_id: record.participant_id.clone(),
            component_id: record.component_id.clone(),
            old_state,
            new_state: record.state,
            version: record.version,
            cause,
            at: record.timestamp,
        };
        debug!(
            participant = %event.participant_id,
            component = %event.component_id,
            from = %old_state,
            to = %event.new_state,
            version = event.version,
            cause = %cause,
            "Publishing state change"
        );
        self.metrics.record_transition(&event);
        self.events.publish(&event);
    }
}

#[async_trait]
impl CoherenceEffects for StateTransitionEngine {
    async fn handle_read(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord> {
        StateTransitionEngine::handle_read(self, participant, component).await
    }

    async fn handle_write(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord> {
        StateTransitionEngine::handle_write(self, participant, component).await
    }

    async fn component_state(
        &self,
        key: &RecordKey,
    ) -> CoherenceResult<Option<ComponentStateRecord>> {
        Ok(self.store.get(key).await?)
    }
}
