//! Debounced medication search behind a suggestion list.
//!
//! Every keystroke cancels the timer of the previous one. Requests that were
//! already sent are left to finish, but their results are only applied while
//! their generation is still the latest, so a slow answer to an old query can
//! never overwrite a newer one. The generation check and the publish happen
//! under one lock.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::{sync::watch, task::JoinHandle, time::sleep};

use crate::{inputs::MedicationHit, ports::MedicationSearch};

pub use std::time::Duration;

pub const DEBOUNCE: Duration = Duration::from_millis(300);
pub const BLUR_DELAY: Duration = Duration::from_millis(200);
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Suggestions {
    #[default]
    Hidden,
    /// Shown as an explicit "no results" placeholder
    NotFound,
    Results(Vec<MedicationHit>),
}

impl Suggestions {
    pub fn is_visible(&self) -> bool {
        !matches!(self, Suggestions::Hidden)
    }
}

struct Shared {
    generation: Mutex<u64>,
    current: watch::Sender<Suggestions>,
    last_shown: Mutex<Suggestions>,
}

impl Shared {
    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) -> u64 {
        let mut generation = self.generation();
        *generation += 1;
        *generation
    }

    fn latest(&self) -> u64 {
        *self.generation()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.latest() == generation
    }

    /// Publish `suggestions` if `generation` is still the latest. Returns
    /// whether they were applied.
    fn publish(&self, generation: u64, suggestions: Suggestions) -> bool {
        let latest = self.generation();
        if *latest != generation {
            return false;
        }

        if suggestions.is_visible() {
            let mut last = self.last_shown.lock().unwrap_or_else(|e| e.into_inner());
            *last = suggestions.clone();
        }
        self.current.send_replace(suggestions);
        true
    }

    /// Start a new generation with the list closed.
    fn bump_hidden(&self) -> u64 {
        let mut generation = self.generation();
        *generation += 1;
        self.current.send_replace(Suggestions::Hidden);
        *generation
    }

    fn forget(&self) {
        let mut last = self.last_shown.lock().unwrap_or_else(|e| e.into_inner());
        *last = Suggestions::Hidden;
    }
}

pub struct SearchBox<S: ?Sized> {
    source: Arc<S>,
    shared: Arc<Shared>,
    debounce: Duration,
    timer: Option<JoinHandle<()>>,
    blur: Option<JoinHandle<()>>,
}

impl<S> SearchBox<S>
where
    S: MedicationSearch + ?Sized + 'static,
{
    pub fn new(source: Arc<S>) -> Self {
        let (current, _) = watch::channel(Suggestions::Hidden);
        Self {
            source,
            shared: Arc::new(Shared {
                generation: Mutex::new(0),
                current,
                last_shown: Mutex::new(Suggestions::Hidden),
            }),
            debounce: DEBOUNCE,
            timer: None,
            blur: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn suggestions(&self) -> Suggestions {
        self.shared.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Suggestions> {
        self.shared.current.subscribe()
    }

    /// Keystroke: schedule a lookup after the debounce delay.
    pub fn input(&mut self, query: &str) {
        self.cancel_timers();
        let query = query.trim().to_string();

        if query.chars().count() < MIN_QUERY_CHARS {
            self.shared.bump_hidden();
            return;
        }
        let generation = self.shared.bump();

        let shared = self.shared.clone();
        let source = self.source.clone();
        let debounce = self.debounce;

        self.timer = Some(tokio::spawn(async move {
            sleep(debounce).await;
            if !shared.is_current(generation) {
                return;
            }
            // Detached so the next keystroke cancels only the timer.
            tokio::spawn(fetch(source, shared, generation, query));
        }));
    }

    /// Explicit search button: no debounce, resolves once applied.
    pub async fn search_now(&mut self, query: &str) -> Suggestions {
        self.cancel_timers();
        let query = query.trim().to_string();

        if query.chars().count() < MIN_QUERY_CHARS {
            self.shared.bump_hidden();
            return Suggestions::Hidden;
        }
        let generation = self.shared.bump();

        fetch(self.source.clone(), self.shared.clone(), generation, query).await;
        self.suggestions()
    }

    /// Pick the suggestion at `index`; the list closes immediately.
    pub fn select(&mut self, index: usize) -> Option<MedicationHit> {
        let hit = match &*self.shared.current.borrow() {
            Suggestions::Results(hits) => hits.get(index).cloned(),
            _ => None,
        }?;

        self.cancel_timers();
        self.shared.bump_hidden();
        self.shared.forget();
        Some(hit)
    }

    /// Focus left the input: close after a short delay so a click on a
    /// suggestion still lands.
    pub fn blur(&mut self) {
        if let Some(handle) = self.blur.take() {
            handle.abort();
        }
        let shared = self.shared.clone();
        let generation = shared.latest();

        self.blur = Some(tokio::spawn(async move {
            sleep(BLUR_DELAY).await;
            shared.publish(generation, Suggestions::Hidden);
        }));
    }

    /// Focus returned: reopen the last list if there was one.
    pub fn focus(&mut self) {
        if let Some(handle) = self.blur.take() {
            handle.abort();
        }
        let last = self
            .shared
            .last_shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if last.is_visible() {
            self.shared.current.send_replace(last);
        }
    }

    fn cancel_timers(&mut self) {
        for handle in [self.timer.take(), self.blur.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

impl<S: ?Sized> Drop for SearchBox<S> {
    fn drop(&mut self) {
        for handle in [self.timer.take(), self.blur.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

async fn fetch<S>(source: Arc<S>, shared: Arc<Shared>, generation: u64, query: String)
where
    S: MedicationSearch + ?Sized,
{
    let suggestions = match source.search_medications(&query).await {
        Ok(hits) if hits.is_empty() => Suggestions::NotFound,
        Ok(hits) => Suggestions::Results(hits),
        Err(e) => {
            tracing::warn!("Medication search failed for {:?}: {}", query, e);
            Suggestions::Hidden
        }
    };

    if !shared.publish(generation, suggestions) {
        tracing::debug!("Discarding stale results for {:?}", query);
    }
}
