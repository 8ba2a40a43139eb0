//! Keyed stale-while-revalidate request cache.
//!
//! A [`RequestCache`] is owned by the application root and handed to every
//! resource that needs it. Fetches run on an [`Executor`]; their results come
//! back over a channel and are applied on the owning loop by [`RequestCache::poll`].
//! Every fetch carries a per-key sequence number, and a completion is applied
//! only when it is newer than the last one applied for that key.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Select, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::FetchError;
use crate::executor::{Executor, Job};

pub type Fetcher<T> = Arc<dyn Fn(&str) -> Result<T, FetchError> + Send + Sync>;

#[derive(Clone)]
pub enum RetryDelay {
    Fixed(Duration),
    Exponential { base: Duration, max: Duration },
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryDelay {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::Exponential { base, max } => {
                let shift = attempt.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << shift).min(*max)
            }
            RetryDelay::Custom(f) => f(attempt),
        }
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            RetryDelay::Exponential { base, max } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("max", max)
                .finish(),
            RetryDelay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Window after a fetch starts or succeeds during which the key is not
    /// fetched again automatically.
    pub deduping_interval: Duration,
    pub revalidate_on_focus: bool,
    pub revalidate_on_reconnect: bool,
    pub max_retries: u32,
    pub retry_delay: RetryDelay,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            deduping_interval: Duration::from_secs(60),
            revalidate_on_focus: false,
            revalidate_on_reconnect: false,
            max_retries: 3,
            retry_delay: RetryDelay::Fixed(Duration::from_secs(3)),
        }
    }
}

/// Read-only view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub error: Option<FetchError>,
    /// No value yet and a fetch is in flight.
    pub loading: bool,
    /// Any fetch is in flight.
    pub validating: bool,
    /// A retry is scheduled for the last failure.
    pub retrying: bool,
    pub updated_at: Option<Instant>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
            validating: false,
            retrying: false,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated { key: String },
    Failed { key: String, error: FetchError },
}

struct Entry<T> {
    data: Option<T>,
    error: Option<FetchError>,
    updated_at: Option<Instant>,
    started_at: Option<Instant>,
    issued: u64,
    applied: u64,
    in_flight: usize,
    retries: u32,
    retry_at: Option<Instant>,
    fetcher: Option<Fetcher<T>>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            started_at: None,
            issued: 0,
            applied: 0,
            in_flight: 0,
            retries: 0,
            retry_at: None,
            fetcher: None,
        }
    }
}

impl<T: Clone> Entry<T> {
    fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            data: self.data.clone(),
            error: self.error.clone(),
            loading: self.data.is_none() && self.in_flight > 0,
            validating: self.in_flight > 0,
            retrying: self.retry_at.is_some(),
            updated_at: self.updated_at,
        }
    }

    fn within(stamp: Option<Instant>, now: Instant, window: Duration) -> bool {
        stamp.is_some_and(|at| now.saturating_duration_since(at) < window)
    }

    fn needs_fetch(&self, now: Instant, window: Duration) -> bool {
        self.in_flight == 0
            && self.retry_at.is_none()
            && !Self::within(self.updated_at, now, window)
            && !Self::within(self.started_at, now, window)
    }
}

struct Completion<T> {
    key: String,
    seq: u64,
    result: Result<T, FetchError>,
}

struct State<T> {
    entries: HashMap<String, Entry<T>>,
    subscribers: HashMap<String, Vec<Sender<CacheEvent>>>,
}

impl<T> State<T> {
    fn notify(&mut self, key: &str, event: CacheEvent) {
        if let Some(subs) = self.subscribers.get_mut(key) {
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

pub struct RequestCache<T> {
    state: Arc<Mutex<State<T>>>,
    options: Arc<CacheOptions>,
    clock: Arc<dyn Clock>,
    executor: Arc<dyn Executor>,
    tx: Sender<Completion<T>>,
    rx: Receiver<Completion<T>>,
}

impl<T> Clone for RequestCache<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            options: self.options.clone(),
            clock: self.clock.clone(),
            executor: self.executor.clone(),
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> fmt::Debug for RequestCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("keys", &self.state.lock().entries.len())
            .field("options", &self.options)
            .finish()
    }
}

impl<T: Clone + Send + 'static> RequestCache<T> {
    pub fn new(options: CacheOptions, clock: Arc<dyn Clock>, executor: Arc<dyn Executor>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                subscribers: HashMap::new(),
            })),
            options: Arc::new(options),
            clock,
            executor,
            tx,
            rx,
        }
    }

    /// Returns the entry for `key`, starting a fetch unless one is already in
    /// flight, a retry is pending, or the entry is inside its deduping window.
    pub fn get_or_fetch<F>(&self, key: &str, fetcher: F) -> Snapshot<T>
    where
        F: Fn(&str) -> Result<T, FetchError> + Send + Sync + 'static,
    {
        let now = self.clock.now();
        let (job, snapshot) = {
            let mut state = self.state.lock();
            let entry = state.entries.entry(key.to_string()).or_default();
            entry.fetcher = Some(Arc::new(fetcher));
            let job = if entry.needs_fetch(now, self.options.deduping_interval) {
                debug!(key, "cache: starting fetch");
                entry.retries = 0;
                self.start(key, entry, now)
            } else {
                debug!(key, in_flight = entry.in_flight, "cache: serving existing entry");
                None
            };
            (job, entry.snapshot())
        };
        self.spawn(job);
        snapshot
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but `None` suppresses the
    /// fetch entirely and yields an idle snapshot.
    pub fn get_or_fetch_opt<F>(&self, key: Option<&str>, fetcher: F) -> Snapshot<T>
    where
        F: Fn(&str) -> Result<T, FetchError> + Send + Sync + 'static,
    {
        match key {
            Some(key) => self.get_or_fetch(key, fetcher),
            None => Snapshot::default(),
        }
    }

    pub fn snapshot(&self, key: &str) -> Snapshot<T> {
        self.state
            .lock()
            .entries
            .get(key)
            .map(Entry::snapshot)
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// True while any key is in flight or waiting on a scheduled retry.
    pub fn is_busy(&self) -> bool {
        self.state
            .lock()
            .entries
            .values()
            .any(|entry| entry.in_flight > 0 || entry.retry_at.is_some())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Forces a new fetch with the last fetcher used for `key`. The current
    /// value stays visible until the new one arrives.
    pub fn revalidate(&self, key: &str) -> bool {
        let now = self.clock.now();
        let job = {
            let mut state = self.state.lock();
            let Some(entry) = state.entries.get_mut(key) else {
                return false;
            };
            entry.retries = 0;
            entry.retry_at = None;
            self.start(key, entry, now)
        };
        let started = job.is_some();
        self.spawn(job);
        started
    }

    /// Overwrites the value locally. Fetches issued before this call can no
    /// longer replace it.
    pub fn mutate(&self, key: &str, value: T) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let entry = state.entries.entry(key.to_string()).or_default();
        entry.data = Some(value);
        entry.error = None;
        entry.updated_at = Some(now);
        entry.applied = entry.issued;
        entry.retries = 0;
        entry.retry_at = None;
        state.notify(
            key,
            CacheEvent::Updated {
                key: key.to_string(),
            },
        );
    }

    pub fn subscribe(&self, key: &str) -> Receiver<CacheEvent> {
        let (tx, rx) = unbounded();
        self.state
            .lock()
            .subscribers
            .entry(key.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub fn on_focus(&self) -> usize {
        if !self.options.revalidate_on_focus {
            return 0;
        }
        self.revalidate_all()
    }

    pub fn on_reconnect(&self) -> usize {
        if !self.options.revalidate_on_reconnect {
            return 0;
        }
        self.revalidate_all()
    }

    fn revalidate_all(&self) -> usize {
        self.keys()
            .iter()
            .filter(|key| self.revalidate(key))
            .count()
    }

    /// Applies every completion received so far and starts due retries.
    /// Returns true when any entry changed.
    pub fn poll(&self) -> bool {
        let mut changed = false;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            changed = true;
        }
        changed | self.fire_due_retries()
    }

    /// Registers this cache's completion channel with `select`, so one owner
    /// can block on several caches at once.
    pub fn watch<'a>(&'a self, select: &mut Select<'a>) -> usize {
        select.recv(&self.rx)
    }

    fn start(&self, key: &str, entry: &mut Entry<T>, now: Instant) -> Option<Job> {
        let fetcher = entry.fetcher.clone()?;
        entry.issued += 1;
        entry.in_flight += 1;
        entry.started_at = Some(now);
        let seq = entry.issued;
        let tx = self.tx.clone();
        let key = key.to_string();
        Some(Box::new(move || {
            let result = fetcher(&key);
            let _ = tx.send(Completion { key, seq, result });
        }))
    }

    fn spawn(&self, job: Option<Job>) {
        if let Some(job) = job {
            self.executor.spawn(job);
        }
    }

    fn apply(&self, completion: Completion<T>) {
        let now = self.clock.now();
        let Completion { key, seq, result } = completion;
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(&key) else {
            return;
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);
        if seq <= entry.applied {
            debug!(key = %key, seq, applied = entry.applied, "cache: discarding superseded result");
            return;
        }
        entry.applied = seq;

        let event = match result {
            Ok(value) => {
                entry.data = Some(value);
                entry.error = None;
                entry.updated_at = Some(now);
                entry.retries = 0;
                entry.retry_at = None;
                CacheEvent::Updated { key: key.clone() }
            }
            Err(error) => {
                let latest = seq == entry.issued;
                if latest && error.is_retryable() && entry.retries < self.options.max_retries {
                    entry.retries += 1;
                    let delay = self.options.retry_delay.delay(entry.retries);
                    entry.retry_at = Some(now + delay);
                    warn!(
                        key = %key,
                        attempt = entry.retries,
                        ?delay,
                        %error,
                        "cache: fetch failed, retry scheduled"
                    );
                } else {
                    warn!(key = %key, %error, "cache: fetch failed");
                }
                entry.error = Some(error.clone());
                CacheEvent::Failed {
                    key: key.clone(),
                    error,
                }
            }
        };
        state.notify(&key, event);
    }

    fn fire_due_retries(&self) -> bool {
        let now = self.clock.now();
        let jobs: Vec<Job> = {
            let mut state = self.state.lock();
            let mut jobs = Vec::new();
            for (key, entry) in state.entries.iter_mut() {
                let due = entry.retry_at.is_some_and(|at| at <= now);
                if !due || entry.in_flight > 0 {
                    continue;
                }
                entry.retry_at = None;
                debug!(key = %key, attempt = entry.retries, "cache: retrying");
                if let Some(job) = self.start(key, entry, now) {
                    jobs.push(job);
                }
            }
            jobs
        };
        let fired = !jobs.is_empty();
        for job in jobs {
            self.executor.spawn(job);
        }
        fired
    }
}
