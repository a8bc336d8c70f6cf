//! Index Store
//!
//! Process-wide registry of release indexes keyed by (release, variant).
//!
//! ## Lifecycle
//!
//! ```text
//! register ──► pending ──► building ──► ready
//!                              │
//!                              └──────► failed ──(retried by get_or_build)
//! invalidate: entry removed; an in-flight build finishes but is not published
//! ```
//!
//! At most one build runs per key. Concurrent `get_or_build` calls for a key
//! that is already building block on that build and share its result. A build
//! orphaned by `invalidate` keeps running until done; the next leader for that
//! key waits for it before compiling again.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{FlattenError, IndexError, Result};
use crate::flatten::flatten;
use crate::index::ReleaseIndex;
use crate::node::Variant;
use crate::source::{LastLoaded, SchemaSource};

/// Externally visible build state of one (release, variant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Ready {
        nodes: usize,
        warnings: usize,
        fingerprint: String,
    },
    Failed {
        reason: String,
    },
}

impl BuildStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, BuildStatus::Ready { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    #[serde(flatten)]
    pub status: BuildStatus,
    pub updated_at: DateTime<Utc>,
}

/// release -> variant -> status
pub type StatusMap = BTreeMap<String, BTreeMap<Variant, StatusEntry>>;

/// Why a build produced no published index. Cloned to every waiter.
#[derive(Debug, Clone)]
enum Failure {
    Flatten(FlattenError),
    Other(String),
    /// Key was invalidated while the build ran
    Discarded,
}

impl Failure {
    fn from_error(err: IndexError) -> Self {
        match err {
            IndexError::Flatten(e) => Failure::Flatten(e),
            IndexError::Compile { reason, .. } => Failure::Other(reason),
            other => Failure::Other(other.to_string()),
        }
    }

    fn reason(&self) -> String {
        match self {
            Failure::Flatten(e) => e.to_string(),
            Failure::Other(reason) => reason.clone(),
            Failure::Discarded => "invalidated during build".to_string(),
        }
    }

    fn into_error(self, release: &str, variant: Variant) -> IndexError {
        match self {
            Failure::Flatten(e) => IndexError::Flatten(e),
            Failure::Other(reason) => IndexError::Compile {
                release: release.to_string(),
                variant,
                reason,
            },
            Failure::Discarded => IndexError::NotReady {
                release: release.to_string(),
                variant,
                status: "invalidated".to_string(),
            },
        }
    }
}

type BuildResult = std::result::Result<Arc<ReleaseIndex>, Failure>;

/// A build in progress; waiters park on the condvar until `result` is set
#[derive(Debug)]
struct InFlight {
    id: u64,
    result: Mutex<Option<BuildResult>>,
    done: Condvar,
}

impl InFlight {
    fn new(id: u64) -> Self {
        Self {
            id,
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, result: BuildResult) {
        let mut slot = lock(&self.result);
        if slot.is_none() {
            *slot = Some(result);
        }
        self.done.notify_all();
    }

    fn wait(&self) -> BuildResult {
        let mut slot = lock(&self.result);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Fails the slot and wakes waiters if the leader unwinds before finishing
struct FlightGuard<'a> {
    store: &'a IndexStore,
    release: &'a str,
    variant: Variant,
    flight: &'a InFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if lock(&self.flight.result).is_some() {
            return;
        }
        let aborted = Err(IndexError::Compile {
            release: self.release.to_string(),
            variant: self.variant,
            reason: "build aborted".to_string(),
        });
        let result = self.store.publish(self.release, self.variant, self.flight, aborted);
        self.flight.complete(result);
    }
}

#[derive(Debug)]
enum SlotState {
    Pending,
    Building(Arc<InFlight>),
    Ready(Arc<ReleaseIndex>),
    Failed(Failure),
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    updated_at: DateTime<Utc>,
}

impl Slot {
    fn new(state: SlotState) -> Self {
        Self {
            state,
            updated_at: Utc::now(),
        }
    }

    fn set(&mut self, state: SlotState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    fn status(&self) -> BuildStatus {
        match &self.state {
            SlotState::Pending | SlotState::Building(_) => BuildStatus::Pending,
            SlotState::Ready(index) => BuildStatus::Ready {
                nodes: index.len(),
                warnings: index.warnings().len(),
                fingerprint: index.fingerprint().to_string(),
            },
            SlotState::Failed(failure) => BuildStatus::Failed {
                reason: failure.reason(),
            },
        }
    }
}

enum Role {
    Leader {
        flight: Arc<InFlight>,
        /// Orphaned build of the same key that must finish first
        previous: Option<Arc<InFlight>>,
    },
    Waiter(Arc<InFlight>),
}

type Key = (String, Variant);

/// State guarded by the store lock
#[derive(Default)]
struct Entries {
    slots: HashMap<String, BTreeMap<Variant, Slot>>,
    /// Builds still running for invalidated keys
    draining: HashMap<Key, Arc<InFlight>>,
}

impl Entries {
    fn drain(&mut self, release: &str, slots: BTreeMap<Variant, Slot>) {
        for (variant, slot) in slots {
            if let SlotState::Building(flight) = slot.state {
                self.draining.insert((release.to_string(), variant), flight);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct IndexStore {
    source: Arc<dyn SchemaSource>,
    last_loaded: Option<Arc<dyn LastLoaded>>,
    entries: Mutex<Entries>,
    next_build: AtomicU64,
}

impl IndexStore {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            last_loaded: None,
            entries: Mutex::new(Entries::default()),
            next_build: AtomicU64::new(1),
        }
    }

    /// Record successful loads and pre-warm from this marker
    pub fn with_last_loaded(mut self, marker: Arc<dyn LastLoaded>) -> Self {
        self.last_loaded = Some(marker);
        self
    }

    /// Note a discovered release; both variants start `pending`
    pub fn register(&self, release: &str) {
        let mut entries = lock(&self.entries);
        let slots = entries.slots.entry(release.to_string()).or_default();
        for variant in Variant::ALL {
            slots
                .entry(variant)
                .or_insert_with(|| Slot::new(SlotState::Pending));
        }
    }

    /// Return the ready index, building it first if needed. Blocks while
    /// another caller's build of the same key is in flight.
    pub fn get_or_build(&self, release: &str, variant: Variant) -> Result<Arc<ReleaseIndex>> {
        let role = {
            let mut guard = lock(&self.entries);
            let entries = &mut *guard;
            let slot = entries
                .slots
                .entry(release.to_string())
                .or_default()
                .entry(variant)
                .or_insert_with(|| Slot::new(SlotState::Pending));

            match &slot.state {
                SlotState::Ready(index) => return Ok(Arc::clone(index)),
                SlotState::Building(flight) => Role::Waiter(Arc::clone(flight)),
                SlotState::Pending | SlotState::Failed(_) => {
                    let id = self.next_build.fetch_add(1, Ordering::Relaxed);
                    let flight = Arc::new(InFlight::new(id));
                    slot.set(SlotState::Building(Arc::clone(&flight)));
                    let key = (release.to_string(), variant);
                    let previous = entries.draining.get(&key).cloned();
                    Role::Leader { flight, previous }
                }
            }
        };

        let result = match role {
            Role::Waiter(flight) => {
                tracing::debug!(release, %variant, "waiting on in-flight build");
                flight.wait()
            }
            Role::Leader { flight, previous } => {
                let _guard = FlightGuard {
                    store: self,
                    release,
                    variant,
                    flight: &flight,
                };
                if let Some(previous) = previous {
                    tracing::debug!(release, %variant, "waiting for invalidated build");
                    let _ = previous.wait();
                }
                let result = self.build(release, variant).map(Arc::new);
                let result = self.publish(release, variant, &flight, result);
                flight.complete(result.clone());
                result
            }
        };

        result.map_err(|failure| failure.into_error(release, variant))
    }

    /// Non-blocking access: the ready index or `NotReady` with the current status
    pub fn get(&self, release: &str, variant: Variant) -> Result<Arc<ReleaseIndex>> {
        let entries = lock(&self.entries);
        let slot = entries.slots.get(release).and_then(|slots| slots.get(&variant));

        let status = match slot.map(|s| &s.state) {
            Some(SlotState::Ready(index)) => return Ok(Arc::clone(index)),
            Some(SlotState::Pending) | Some(SlotState::Building(_)) => "pending".to_string(),
            Some(SlotState::Failed(failure)) => format!("failed: {}", failure.reason()),
            None => "absent".to_string(),
        };

        Err(IndexError::NotReady {
            release: release.to_string(),
            variant,
            status,
        })
    }

    /// Build on a background thread
    pub fn spawn_build(self: &Arc<Self>, release: &str, variant: Variant) -> Result<BuildHandle> {
        let store = Arc::clone(self);
        let name = release.to_string();
        let handle = thread::Builder::new()
            .name(format!("build-{}-{}", release, variant))
            .spawn(move || store.get_or_build(&name, variant))?;

        Ok(BuildHandle {
            release: release.to_string(),
            variant,
            handle,
        })
    }

    /// Register and start building every variant of each release
    pub fn prewarm(self: &Arc<Self>, releases: &[String]) -> Result<Vec<BuildHandle>> {
        let mut handles = Vec::with_capacity(releases.len() * Variant::ALL.len());
        for release in releases {
            self.register(release);
            for variant in Variant::ALL {
                handles.push(self.spawn_build(release, variant)?);
            }
        }
        Ok(handles)
    }

    /// Pre-warm the release recorded by the last-loaded marker, if any
    pub fn prewarm_last_loaded(self: &Arc<Self>) -> Result<Vec<BuildHandle>> {
        let Some(release) = self.last_loaded.as_ref().and_then(|m| m.load()) else {
            return Ok(Vec::new());
        };
        tracing::info!(release = %release, "pre-warming last loaded release");
        self.prewarm(&[release])
    }

    /// Drop every variant of a release. Returns whether it was present.
    pub fn invalidate(&self, release: &str) -> bool {
        let mut entries = lock(&self.entries);
        let Some(slots) = entries.slots.remove(release) else {
            return false;
        };
        entries.drain(release, slots);
        tracing::info!(release, "invalidated release");
        true
    }

    pub fn invalidate_all(&self) {
        let mut entries = lock(&self.entries);
        let all = std::mem::take(&mut entries.slots);
        tracing::info!(releases = all.len(), "invalidated all releases");
        for (release, slots) in all {
            entries.drain(&release, slots);
        }
    }

    pub fn list_status(&self) -> StatusMap {
        lock(&self.entries)
            .slots
            .iter()
            .map(|(release, slots)| {
                let variants = slots
                    .iter()
                    .map(|(variant, slot)| {
                        (
                            *variant,
                            StatusEntry {
                                status: slot.status(),
                                updated_at: slot.updated_at,
                            },
                        )
                    })
                    .collect();
                (release.clone(), variants)
            })
            .collect()
    }

    fn build(&self, release: &str, variant: Variant) -> Result<ReleaseIndex> {
        tracing::info!(release, %variant, "building release index");
        let compiled = self.source.compile(release, variant)?;
        let label = self.source.label(release, variant);
        let flattened = flatten(&compiled, &label)?;

        for warning in &flattened.warnings {
            tracing::debug!(release, %variant, "{}", warning);
        }
        if !flattened.warnings.is_empty() {
            tracing::warn!(
                release,
                %variant,
                warnings = flattened.warnings.len(),
                "flatten finished with warnings"
            );
        }

        Ok(ReleaseIndex::build(release, variant, flattened))
    }

    /// Store the outcome unless the key was invalidated or rebuilt meanwhile
    fn publish(
        &self,
        release: &str,
        variant: Variant,
        flight: &InFlight,
        result: Result<Arc<ReleaseIndex>>,
    ) -> BuildResult {
        let result = result.map_err(Failure::from_error);

        let mut guard = lock(&self.entries);
        let entries = &mut *guard;

        let key = (release.to_string(), variant);
        if entries.draining.get(&key).is_some_and(|f| f.id == flight.id) {
            entries.draining.remove(&key);
        }

        let slot = entries
            .slots
            .get_mut(release)
            .and_then(|slots| slots.get_mut(&variant))
            .filter(|slot| matches!(&slot.state, SlotState::Building(f) if f.id == flight.id));

        let Some(slot) = slot else {
            tracing::info!(release, %variant, "discarding build of invalidated release");
            return Err(Failure::Discarded);
        };

        match &result {
            Ok(index) => {
                tracing::info!(release, %variant, nodes = index.len(), "release index ready");
                slot.set(SlotState::Ready(Arc::clone(index)));
            }
            Err(failure) => {
                tracing::error!(
                    release,
                    %variant,
                    reason = %failure.reason(),
                    "release build failed"
                );
                slot.set(SlotState::Failed(failure.clone()));
            }
        }
        drop(guard);

        if result.is_ok() {
            if let Some(marker) = &self.last_loaded {
                if let Err(e) = marker.store(release) {
                    tracing::warn!(release, error = %e, "could not record last loaded release");
                }
            }
        }

        result
    }
}

/// Background build started by [`IndexStore::spawn_build`]
#[derive(Debug)]
pub struct BuildHandle {
    pub release: String,
    pub variant: Variant,
    handle: JoinHandle<Result<Arc<ReleaseIndex>>>,
}

impl BuildHandle {
    pub fn join(self) -> Result<Arc<ReleaseIndex>> {
        self.handle.join().unwrap_or_else(|_| {
            Err(IndexError::Compile {
                release: self.release,
                variant: self.variant,
                reason: "build thread panicked".to_string(),
            })
        })
    }
}
