//! Bounded change log.
//!
//! The one piece of shared mutable state in the notification path. Readers
//! load the current sequence lock-free through `arc-swap`; appends replace it
//! wholesale and then notify every observer with `(old, new)`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};

use super::message::ChangeEvent;

/// Maximum number of events retained, newest first.
pub const CHANGE_LOG_CAPACITY: usize = 30;

/// Callback invoked synchronously on every append with `(old, new)`.
///
/// Must not block: hand work off to a task instead.
pub type Observer = Arc<dyn Fn(&[Arc<ChangeEvent>], &[Arc<ChangeEvent>]) + Send + Sync>;

/// Handle returned by [`ChangeLog::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Process-wide bounded event log with observers.
pub struct ChangeLog {
    events: ArcSwap<Vec<Arc<ChangeEvent>>>,
    observers: RwLock<Vec<(SubscriptionId, Observer)>>,
    /// Serializes replace + notify so observers see appends in log order
    append_gate: Mutex<()>,
    next_id: AtomicU64,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self {
            events: ArcSwap::from_pointee(Vec::new()),
            observers: RwLock::new(Vec::new()),
            append_gate: Mutex::new(()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Prepend `event`, drop anything beyond capacity, notify observers.
    pub fn append(&self, event: ChangeEvent) {
        let event = Arc::new(event);
        let _gate = self.append_gate.lock();

        let old = self.events.load_full();
        let mut next = Vec::with_capacity(CHANGE_LOG_CAPACITY.min(old.len() + 1));
        next.push(Arc::clone(&event));
        next.extend(old.iter().take(CHANGE_LOG_CAPACITY - 1).cloned());
        let new = Arc::new(next);
        self.events.store(Arc::clone(&new));

        crate::debug!("log"; "append {} ({} retained)", event.name(), new.len());

        // Snapshot observers so callbacks may unsubscribe without deadlock
        let observers: Vec<Observer> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(&old, &new);
        }
    }

    /// Register an observer, called on every subsequent append.
    pub fn subscribe<F>(&self, on_append: F) -> SubscriptionId
    where
        F: Fn(&[Arc<ChangeEvent>], &[Arc<ChangeEvent>]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(on_append)));
        id
    }

    /// Remove an observer. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

}

#[cfg(test)]
impl ChangeLog {
    /// Current contents, newest first.
    pub fn events(&self) -> Arc<Vec<Arc<ChangeEvent>>> {
        self.events.load_full()
    }

    /// Most recent event.
    pub fn head(&self) -> Option<Arc<ChangeEvent>> {
        self.events.load().first().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.load().is_empty()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(i: usize) -> ChangeEvent {
        ChangeEvent::compile_warning(format!("warning {i}"))
    }

    #[test]
    fn test_append_newest_first() {
        let log = ChangeLog::new();
        log.append(warning(1));
        log.append(warning(2));

        let events = log.events();
        assert_eq!(*events[0], warning(2));
        assert_eq!(*events[1], warning(1));
        assert_eq!(log.head().as_deref(), Some(&warning(2)));
    }

    #[test]
    fn test_capacity_keeps_last_thirty() {
        let log = ChangeLog::new();
        for i in 0..40 {
            log.append(warning(i));
        }

        let events = log.events();
        assert_eq!(events.len(), CHANGE_LOG_CAPACITY);
        let expected: Vec<_> = (10..40).rev().map(warning).collect();
        let actual: Vec<_> = events.iter().map(|e| (**e).clone()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_observer_gets_old_and_new() {
        let log = ChangeLog::new();
        log.append(warning(0));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        log.subscribe(move |old, new| {
            sink.lock().push((old.len(), new.len(), (*new[0]).clone()));
        });

        log.append(warning(1));
        assert_eq!(*seen.lock(), vec![(1, 2, warning(1))]);
    }

    #[test]
    fn test_late_subscriber_sees_only_new_event() {
        let log = ChangeLog::new();
        for i in 0..5 {
            log.append(warning(i));
        }

        let heads = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&heads);
        log.subscribe(move |_, new| sink.lock().push((*new[0]).clone()));

        log.append(warning(5));
        assert_eq!(*heads.lock(), vec![warning(5)]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let log = ChangeLog::new();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let id = log.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        log.append(warning(0));
        assert!(log.unsubscribe(id));
        assert!(!log.unsubscribe(id));
        log.append(warning(1));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.observer_count(), 0);
    }

    #[test]
    fn test_observer_may_unsubscribe_itself() {
        let log = Arc::new(ChangeLog::new());
        let slot = Arc::new(Mutex::new(None::<SubscriptionId>));

        let weak = Arc::downgrade(&log);
        let own_id = Arc::clone(&slot);
        let id = log.subscribe(move |_, _| {
            if let (Some(log), Some(id)) = (weak.upgrade(), *own_id.lock()) {
                log.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        log.append(warning(0));
        assert_eq!(log.observer_count(), 0);
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let log = Arc::new(ChangeLog::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..5 {
                        log.append(warning(t * 100 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 20);
        // Each thread's own events keep their relative order
        for t in 0..4 {
            let mine: Vec<_> = log
                .events()
                .iter()
                .filter_map(|e| match &**e {
                    ChangeEvent::CompileWarning { message } => {
                        let n: usize = message.trim_start_matches("warning ").parse().unwrap();
                        (n / 100 == t).then_some(n)
                    }
                    _ => None,
                })
                .collect();
            let expected: Vec<_> = (0..5).rev().map(|i| t * 100 + i).collect();
            assert_eq!(mine, expected);
        }
    }
}
