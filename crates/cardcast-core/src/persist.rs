//! Persistence contract and per-aggregate load/flush.
//!
//! A [`StateStore`] stores opaque text bodies under aggregate names. Typing,
//! validation and fallback to defaults happen here, so a missing or corrupt
//! aggregate never reaches decision logic: it loads as its default with a
//! warning. Write failures are logged and reported in a [`FlushReport`] but
//! never abort the caller; in-memory state stays authoritative.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::CoreError;
use crate::correlate::{Frontier, GameWindow, TriggerSample};
use crate::learned::{LearnedRules, SmartRule};
use crate::rules::Cooldown;
use crate::state::{Aggregate, BotState, ChannelBinding, Dirty};
use crate::verify::PredictionBook;

/// Durable key/value storage for serialised aggregates.
pub trait StateStore {
    type Error: std::error::Error;

    /// Read the stored body for `name`; `Ok(None)` if nothing was ever saved.
    fn read(&self, name: &str) -> Result<Option<String>, Self::Error>;

    /// Replace the stored body for `name`.
    fn write(&self, name: &str, body: &str) -> Result<(), Self::Error>;
}

/// Shape checks applied after deserialisation.
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Validate for Vec<TriggerSample> {
    fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for s in self {
            if !seen.insert(s.outcome_game) {
                return Err(format!("duplicate outcome game {}", s.outcome_game));
            }
            if s.trigger_game >= s.outcome_game {
                return Err(format!(
                    "trigger game {} not before outcome game {}",
                    s.trigger_game, s.outcome_game
                ));
            }
        }
        Ok(())
    }
}

impl Validate for Vec<SmartRule> {
    fn validate(&self) -> Result<(), String> {
        if self.iter().any(|r| r.frequency == 0) {
            return Err("rule with zero frequency".into());
        }
        let distinct: HashSet<_> = self.iter().map(|r| r.trigger_cards).collect();
        if distinct.len() != self.len() {
            return Err("duplicate trigger pair".into());
        }
        Ok(())
    }
}

impl Validate for PredictionBook {
    fn validate(&self) -> Result<(), String> {
        if self.keys_consistent() {
            Ok(())
        } else {
            Err("record stored under the wrong game".into())
        }
    }
}

impl Validate for GameWindow {
    fn validate(&self) -> Result<(), String> {
        match self.iter().find(|(k, r)| **k != r.game_number) {
            Some((k, _)) => Err(format!("record stored under the wrong game {k}")),
            None => Ok(()),
        }
    }
}

impl Validate for ChannelBinding {}
impl Validate for Cooldown {}
impl Validate for bool {}
impl Validate for Option<Frontier> {}

/// Load one aggregate, falling back to its default on any failure.
pub fn load<S, T>(store: &S, aggregate: Aggregate) -> T
where
    S: StateStore,
    T: DeserializeOwned + Default + Validate,
{
    let body = match store.read(aggregate.name()) {
        Ok(Some(body)) => body,
        Ok(None) => {
            warn!(aggregate = %aggregate, "no stored state, using default");
            return T::default();
        }
        Err(e) => {
            warn!(aggregate = %aggregate, error = %e, "state unreadable, using default");
            return T::default();
        }
    };

    let value: T = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(aggregate = %aggregate, error = %e, "state corrupt, using default");
            return T::default();
        }
    };

    if let Err(reason) = value.validate() {
        warn!(aggregate = %aggregate, %reason, "state failed validation, using default");
        return T::default();
    }
    value
}

/// Serialise and write one aggregate.
pub fn save<S, T>(store: &S, aggregate: Aggregate, value: &T) -> Result<(), CoreError>
where
    S: StateStore,
    T: Serialize + ?Sized,
{
    let failed = |reason: String| CoreError::Persist {
        aggregate: aggregate.name(),
        reason,
    };
    let body = serde_json::to_string_pretty(value).map_err(|e| failed(e.to_string()))?;
    store
        .write(aggregate.name(), &body)
        .map_err(|e| failed(e.to_string()))
}

/// Outcome of a flush: which aggregates were written and which failed.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub written: Vec<Aggregate>,
    pub failed: Vec<(Aggregate, CoreError)>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Some aggregates reached storage and some did not; storage is now
    /// inconsistent with itself until the next successful flush.
    pub fn is_partial(&self) -> bool {
        !self.written.is_empty() && !self.failed.is_empty()
    }
}

impl BotState {
    pub fn load<S: StateStore>(store: &S) -> Self {
        Self {
            samples: load(store, Aggregate::Samples),
            learned: LearnedRules {
                rules: load(store, Aggregate::Rules),
                active: load(store, Aggregate::LearnedMode),
            },
            predictions: load(store, Aggregate::Predictions),
            window: load(store, Aggregate::GameWindow),
            channels: load(store, Aggregate::Channels),
            cooldown: load(store, Aggregate::Cooldown),
            frontier: load(store, Aggregate::Frontier),
        }
    }

    /// Write every aggregate in `dirty`, continuing past failures.
    pub fn flush<S: StateStore>(&self, store: &S, dirty: &Dirty) -> FlushReport {
        let mut report = FlushReport::default();
        for aggregate in dirty.iter() {
            let result = match aggregate {
                Aggregate::Samples => save(store, aggregate, &self.samples),
                Aggregate::Rules => save(store, aggregate, &self.learned.rules),
                Aggregate::Predictions => save(store, aggregate, &self.predictions),
                Aggregate::GameWindow => save(store, aggregate, &self.window),
                Aggregate::Channels => save(store, aggregate, &self.channels),
                Aggregate::Cooldown => save(store, aggregate, &self.cooldown),
                Aggregate::LearnedMode => save(store, aggregate, &self.learned.active),
                Aggregate::Frontier => save(store, aggregate, &self.frontier),
            };
            match result {
                Ok(()) => report.written.push(aggregate),
                Err(e) => {
                    error!(aggregate = %aggregate, error = %e, "state flush failed; storage is stale");
                    report.failed.push((aggregate, e));
                }
            }
        }
        if report.is_partial() {
            error!(
                written = report.written.len(),
                failed = report.failed.len(),
                "partial flush"
            );
        } else if report.is_clean() {
            debug!(written = report.written.len(), "state flushed");
        }
        report
    }
}

/// In-process store with per-aggregate write failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bodies: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write to `aggregate` fail.
    pub fn fail_writes(&self, aggregate: Aggregate) {
        lock(&self.failing).insert(aggregate.name().to_string());
    }

    pub fn heal(&self) {
        lock(&self.failing).clear();
    }

    /// Overwrite a stored body directly, bypassing serialisation.
    pub fn put_raw(&self, aggregate: Aggregate, body: &str) {
        lock(&self.bodies).insert(aggregate.name().to_string(), body.to_string());
    }

    pub fn get_raw(&self, aggregate: Aggregate) -> Option<String> {
        lock(&self.bodies).get(aggregate.name()).cloned()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StateStore for MemoryStore {
    type Error = CoreError;

    fn read(&self, name: &str) -> Result<Option<String>, Self::Error> {
        Ok(lock(&self.bodies).get(name).cloned())
    }

    fn write(&self, name: &str, body: &str) -> Result<(), Self::Error> {
        if lock(&self.failing).contains(name) {
            return Err(CoreError::Other(format!("write to {name} refused")));
        }
        lock(&self.bodies).insert(name.to_string(), body.to_string());
        Ok(())
    }
}
