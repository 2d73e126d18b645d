//! Activity aggregator
//!
//! Maintains one sliding-window `RepositoryActivityState` per repository.
//! A pure state transformer: it never emits messages itself; the pipeline
//! reads its states after every tick.

use std::collections::{BTreeMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::domain::entities::{Event, EventId, Momentum, RepoKey, RepositoryActivityState, TrendStatus};
use crate::domain::ports::{ActivityScorer, ScoringWindow};
use crate::error::IngestError;

/// Aggregator tuning
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Trailing span over which events contribute to the score
    pub window: Duration,
    /// How far an event may lag behind the newest event of its repository
    /// (or lead the wall clock) before it is rejected
    pub timestamp_tolerance: Duration,
    /// Number of recent event ids remembered for de-duplication
    pub dedup_capacity: usize,
    /// Floor for the elapsed span used in velocity, normally the tick interval
    pub min_velocity_span: Duration,
    /// Number of tick samples velocity looks back over
    pub velocity_lookback_ticks: usize,
    /// `|velocity|` at or below this is labelled steady
    pub momentum_threshold: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window: Duration::hours(1),
            timestamp_tolerance: Duration::minutes(5),
            dedup_capacity: 10_000,
            min_velocity_span: Duration::seconds(5),
            velocity_lookback_ticks: 12,
            momentum_threshold: 0.1,
        }
    }
}

/// Bounded FIFO set of recently seen event ids
#[derive(Debug)]
struct SeenEvents {
    order: VecDeque<EventId>,
    ids: HashSet<EventId>,
    capacity: usize,
}

impl SeenEvents {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity.min(1024)),
            ids: HashSet::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: EventId) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

pub struct ActivityAggregator<S>
where
    S: ActivityScorer,
{
    config: AggregatorConfig,
    scorer: S,
    states: BTreeMap<RepoKey, RepositoryActivityState>,
    seen: SeenEvents,
    events_processed: u64,
}

impl<S> ActivityAggregator<S>
where
    S: ActivityScorer,
{
    pub fn new(scorer: S, config: AggregatorConfig) -> Self {
        let seen = SeenEvents::new(config.dedup_capacity);
        Self {
            config,
            scorer,
            states: BTreeMap::new(),
            seen,
            events_processed: 0,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Validate and append an event to its repository's window, evict stale
    /// entries, and recompute score and velocity.
    ///
    /// A rejected event leaves every state untouched. An event from slightly
    /// ahead of `now` (within the timestamp tolerance) is windowed at `now`.
    pub fn ingest(
        &mut self,
        mut event: Event,
        now: DateTime<Utc>,
    ) -> Result<&RepositoryActivityState, IngestError> {
        self.validate(&event, now)?;
        if event.occurred_at > now {
            event.occurred_at = now;
        }

        self.seen.insert(event.event_id.clone());
        self.events_processed += 1;

        let key = event.repo_key.clone();
        let state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| RepositoryActivityState::new(key));
        state.insert_event(event);
        state.evict_before(now, self.config.window);
        recompute(&self.config, &self.scorer, state, now);

        Ok(state)
    }

    fn validate(&self, event: &Event, now: DateTime<Utc>) -> Result<(), IngestError> {
        if self.seen.contains(&event.event_id) {
            return Err(IngestError::Duplicate(event.event_id.clone()));
        }

        let tolerance = self.config.timestamp_tolerance;
        if event.occurred_at > now + tolerance {
            return Err(IngestError::FromFuture {
                event_id: event.event_id.clone(),
                repo: event.repo_key.to_string(),
                occurred_at: event.occurred_at,
            });
        }

        if event.occurred_at < now - self.config.window {
            return Err(IngestError::Stale {
                event_id: event.event_id.clone(),
                repo: event.repo_key.to_string(),
            });
        }

        if let Some(last) = self
            .states
            .get(&event.repo_key)
            .and_then(|s| s.last_event_time)
        {
            if event.occurred_at < last - tolerance {
                return Err(IngestError::OutOfOrder {
                    event_id: event.event_id.clone(),
                    repo: event.repo_key.to_string(),
                    occurred_at: event.occurred_at,
                    last_event_time: last,
                });
            }
        }

        Ok(())
    }

    /// Age every window to `now`, recompute scores, and record a velocity
    /// sample. Runs even when no events arrived so idle repositories cool.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let lookback = self.config.velocity_lookback_ticks.max(1);
        for state in self.states.values_mut() {
            state.evict_before(now, self.config.window);
            recompute(&self.config, &self.scorer, state, now);

            state.score_history.push_back((now, state.activity_score));
            while state.score_history.len() > lookback + 1 {
                state.score_history.pop_front();
            }
        }
    }

    /// Write back the classifier's confirmed status
    pub fn set_trend_status(&mut self, repo_key: &RepoKey, status: TrendStatus) {
        if let Some(state) = self.states.get_mut(repo_key) {
            state.trend_status = status;
        }
    }

    /// Forget repositories that have fully cooled down. Returns their keys.
    pub fn prune_idle(&mut self) -> Vec<RepoKey> {
        let idle: Vec<RepoKey> = self
            .states
            .values()
            .filter(|s| s.is_idle())
            .map(|s| s.repo_key.clone())
            .collect();
        for key in &idle {
            self.states.remove(key);
        }
        idle
    }

    /// All tracked states in repository-key order
    pub fn states(&self) -> impl Iterator<Item = &RepositoryActivityState> {
        self.states.values()
    }

    pub fn state(&self, repo_key: &RepoKey) -> Option<&RepositoryActivityState> {
        self.states.get(repo_key)
    }

    pub fn tracked_repositories(&self) -> usize {
        self.states.len()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }
}

fn recompute<S: ActivityScorer>(
    config: &AggregatorConfig,
    scorer: &S,
    state: &mut RepositoryActivityState,
    now: DateTime<Utc>,
) {
    let window = ScoringWindow {
        events: &state.window_events,
        now,
        span: config.window,
    };
    let raw = scorer.score(&window);
    let score = if raw.is_finite() && raw > 0.0 { raw } else { 0.0 };

    let (base_at, base_score) = state
        .score_history
        .front()
        .copied()
        .unwrap_or((now - config.min_velocity_span, 0.0));
    let elapsed = (now - base_at).max(config.min_velocity_span);
    let minutes = elapsed.num_milliseconds() as f64 / 60_000.0;

    state.activity_score = score;
    state.velocity = if minutes > 0.0 {
        (score - base_score) / minutes
    } else {
        0.0
    };
    state.momentum = Momentum::from_velocity(state.velocity, config.momentum_threshold);
}
