//! Push-based observable values
//!
//! An `Observable<T>` is a recipe for a value source: subscribing runs the
//! recipe, wiring a callback into the upstream sources, and returns a
//! `Subscription` that tears the wiring down again. Values are pushed
//! synchronously on the publishing thread; no lock is held while a callback
//! runs, so callbacks may publish further values.
//!
//! Combinators follow the usual stream vocabulary: `map`, `filter`,
//! `filter_map`, `skip_duplicates`, `to_property`, `combine`, `tap`.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Subscriber callback
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

type SubscribeFn<T> = dyn Fn(Callback<T>) -> Subscription + Send + Sync;

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle to an active subscription
///
/// `unsubscribe` runs every teardown exactly once; later calls are no-ops.
pub struct Subscription {
    teardown: Mutex<Vec<Teardown>>,
    closed: AtomicBool,
}

impl Subscription {
    /// Subscription with a single teardown action
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Mutex::new(vec![Box::new(teardown)]),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscription with nothing to tear down
    pub fn empty() -> Self {
        Self {
            teardown: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Combine two subscriptions into one
    pub fn merge(self, other: Subscription) -> Self {
        let mut teardown = self.teardown.into_inner();
        teardown.extend(other.teardown.into_inner());
        Self {
            teardown: Mutex::new(teardown),
            closed: AtomicBool::new(false),
        }
    }

    /// Tear down the subscription
    pub fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let actions = std::mem::take(&mut *self.teardown.lock());
        for action in actions {
            action();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Push-based value source
pub struct Observable<T> {
    subscribe: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<T> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Observable")
    }
}

impl<T: Send + Sync + 'static> Observable<T> {
    /// Create an observable from a subscribe function
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(Callback<T>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            subscribe: Arc::new(subscribe),
        }
    }

    /// Observable that emits `value` once to every subscriber
    pub fn constant(value: T) -> Self {
        Self::new(move |sink| {
            sink(&value);
            Subscription::empty()
        })
    }

    /// Subscribe a callback
    pub fn subscribe<F>(&self, on_value: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        (self.subscribe)(Arc::new(on_value))
    }

    /// Transform every value
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::new(move |sink: Callback<U>| {
            let f = Arc::clone(&f);
            source.subscribe(move |v| sink(&f(v)))
        })
    }

    /// Keep values matching a predicate
    pub fn filter<F>(&self, predicate: F) -> Observable<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Observable::new(move |sink: Callback<T>| {
            let predicate = Arc::clone(&predicate);
            source.subscribe(move |v| {
                if predicate(v) {
                    sink(v);
                }
            })
        })
    }

    /// Transform values, dropping those mapped to `None`
    pub fn filter_map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::new(move |sink: Callback<U>| {
            let f = Arc::clone(&f);
            source.subscribe(move |v| {
                if let Some(u) = f(v) {
                    sink(&u);
                }
            })
        })
    }

    /// Run a side effect for every value, passing the value through
    pub fn tap<F>(&self, f: F) -> Observable<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::new(move |sink: Callback<T>| {
            let f = Arc::clone(&f);
            source.subscribe(move |v| {
                f(v);
                sink(v);
            })
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Drop values equal to the previous value seen by this subscriber
    pub fn skip_duplicates(&self) -> Observable<T>
    where
        T: PartialEq,
    {
        let source = self.clone();
        Observable::new(move |sink: Callback<T>| {
            let last: Mutex<Option<T>> = Mutex::new(None);
            source.subscribe(move |v| {
                let fresh = {
                    let mut last = last.lock();
                    if last.as_ref() == Some(v) {
                        false
                    } else {
                        *last = Some(v.clone());
                        true
                    }
                };
                if fresh {
                    sink(v);
                }
            })
        })
    }

    /// Emit `initial` on subscribe unless the source supplies a current value
    pub fn to_property(&self, initial: T) -> Observable<T> {
        let source = self.clone();
        Observable::new(move |sink: Callback<T>| {
            let seen = Arc::new(AtomicBool::new(false));
            let subscription = {
                let seen = Arc::clone(&seen);
                let sink = Arc::clone(&sink);
                source.subscribe(move |v| {
                    seen.store(true, Ordering::SeqCst);
                    sink(v);
                })
            };
            if !seen.load(Ordering::SeqCst) {
                sink(&initial);
            }
            subscription
        })
    }

    /// Combine the latest values of two sources
    ///
    /// Emits once both sources have produced a value, and again whenever
    /// either source produces a new one. Every emission sees the latest value
    /// of both sides.
    pub fn combine<U, R, F>(&self, other: &Observable<U>, f: F) -> Observable<R>
    where
        U: Clone + Send + Sync + 'static,
        R: Send + Sync + 'static,
        F: Fn(&T, &U) -> R + Send + Sync + 'static,
    {
        let left = self.clone();
        let right = other.clone();
        let f = Arc::new(f);

        Observable::new(move |sink: Callback<R>| {
            let latest: Arc<Mutex<(Option<T>, Option<U>)>> = Arc::new(Mutex::new((None, None)));

            let left_sub = {
                let latest = Arc::clone(&latest);
                let f = Arc::clone(&f);
                let sink = Arc::clone(&sink);
                left.subscribe(move |a: &T| {
                    let pair = {
                        let mut guard = latest.lock();
                        guard.0 = Some(a.clone());
                        guard.1.clone()
                    };
                    if let Some(b) = pair {
                        sink(&f(a, &b));
                    }
                })
            };

            let right_sub = {
                let latest = Arc::clone(&latest);
                let f = Arc::clone(&f);
                let sink = Arc::clone(&sink);
                right.subscribe(move |b: &U| {
                    let pair = {
                        let mut guard = latest.lock();
                        guard.1 = Some(b.clone());
                        guard.0.clone()
                    };
                    if let Some(a) = pair {
                        sink(&f(&a, b));
                    }
                })
            };

            left_sub.merge(right_sub)
        })
    }
}

impl Observable<bool> {
    /// Logical negation
    pub fn negate(&self) -> Observable<bool> {
        self.map(|v| !v)
    }
}

/// Multicast value source that remembers its latest value
///
/// New subscribers receive the latest value immediately, then every value
/// published afterwards.
///
/// Values reach every subscriber in publish order. A value published while
/// a fan-out is in progress (from a callback, or from another thread) is
/// queued and delivered by the publisher already fanning out, once the
/// current value has reached every subscriber.
pub struct Subject<T> {
    latest: RwLock<Option<T>>,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
    dispatch: Mutex<Dispatch<T>>,
}

struct Dispatch<T> {
    active: bool,
    queue: VecDeque<T>,
}

impl<T: Clone + Send + Sync + 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            dispatch: Mutex::new(Dispatch {
                active: false,
                queue: VecDeque::new(),
            }),
        }
    }

    /// Publish a value, returning the number of subscribers it goes to
    ///
    /// When a fan-out is already running the value is queued behind it and
    /// this returns before delivery.
    pub fn publish(&self, value: T) -> usize {
        {
            let mut dispatch = self.dispatch.lock();
            if dispatch.active {
                dispatch.queue.push_back(value);
                return self.subscriber_count();
            }
            dispatch.active = true;
        }

        let mut notified = 0;
        let mut next = Some(value);
        while let Some(value) = next {
            notified = self.fan_out(&value);
            let mut dispatch = self.dispatch.lock();
            next = dispatch.queue.pop_front();
            if next.is_none() {
                dispatch.active = false;
            }
        }
        notified
    }

    fn fan_out(&self, value: &T) -> usize {
        *self.latest.write() = Some(value.clone());

        // Snapshot so callbacks can subscribe or publish without deadlocking
        let subscribers: Vec<Callback<T>> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in &subscribers {
            callback(value);
        }
        subscribers.len()
    }

    pub fn latest(&self) -> Option<T> {
        self.latest.read().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Observable view of this subject
    pub fn observable(self: &Arc<Self>) -> Observable<T> {
        let subject = Arc::clone(self);
        Observable::new(move |sink: Callback<T>| {
            let id = subject.next_id.fetch_add(1, Ordering::Relaxed);
            subject.subscribers.lock().push((id, Arc::clone(&sink)));

            if let Some(current) = subject.latest() {
                sink(&current);
            }

            let weak = Arc::downgrade(&subject);
            Subscription::new(move || {
                if let Some(subject) = weak.upgrade() {
                    subject.subscribers.lock().retain(|(i, _)| *i != id);
                }
            })
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    /// Collect every value an observable emits
    fn collect<T: Clone + Send + Sync + 'static>(
        observable: &Observable<T>,
    ) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&values);
        let subscription = observable.subscribe(move |v: &T| sink.lock().push(v.clone()));
        (values, subscription)
    }

    #[test]
    fn test_constant_emits_on_subscribe() {
        let (values, _sub) = collect(&Observable::constant(7));
        assert_eq!(*values.lock(), vec![7]);
    }

    #[test]
    fn test_subject_replays_latest() {
        let subject = Arc::new(Subject::new());
        subject.publish(1);
        subject.publish(2);

        let (values, _sub) = collect(&subject.observable());
        subject.publish(3);

        assert_eq!(*values.lock(), vec![2, 3]);
    }

    #[test]
    fn test_map_filter_filter_map() {
        let subject = Arc::new(Subject::new());
        let doubled_even = subject
            .observable()
            .filter(|v: &i32| v % 2 == 0)
            .map(|v| v * 2);
        let parsed = subject
            .observable()
            .filter_map(|v: &i32| if *v > 2 { Some(v.to_string()) } else { None });

        let (doubled, _a) = collect(&doubled_even);
        let (strings, _b) = collect(&parsed);
        for v in 1..=4 {
            subject.publish(v);
        }

        assert_eq!(*doubled.lock(), vec![4, 8]);
        assert_eq!(*strings.lock(), vec!["3".to_string(), "4".to_string()]);
    }

    #[test]
    fn test_skip_duplicates() {
        let subject = Arc::new(Subject::new());
        let (values, _sub) = collect(&subject.observable().skip_duplicates());

        for v in [0, 0, 1, 1, 1, 0, 1] {
            subject.publish(v);
        }

        assert_eq!(*values.lock(), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_skip_duplicates_state_is_per_subscriber() {
        let subject = Arc::new(Subject::new());
        let deduped = subject.observable().skip_duplicates();

        let (first, _a) = collect(&deduped);
        subject.publish(5);
        let (second, _b) = collect(&deduped);

        assert_eq!(*first.lock(), vec![5]);
        assert_eq!(*second.lock(), vec![5]);
    }

    #[test]
    fn test_to_property_default_and_replay() {
        let empty: Arc<Subject<i32>> = Arc::new(Subject::new());
        let (values, _a) = collect(&empty.observable().to_property(0));
        empty.publish(9);
        assert_eq!(*values.lock(), vec![0, 9]);

        let primed = Arc::new(Subject::new());
        primed.publish(4);
        let (values, _b) = collect(&primed.observable().to_property(0));
        assert_eq!(*values.lock(), vec![4]);
    }

    #[test]
    fn test_combine_waits_for_both_sides() {
        let left = Arc::new(Subject::new());
        let right = Arc::new(Subject::new());
        let sum = left
            .observable()
            .combine(&right.observable(), |a: &i32, b: &i32| a + b);
        let (values, _sub) = collect(&sum);

        left.publish(1);
        assert!(values.lock().is_empty());
        right.publish(10);
        left.publish(2);
        right.publish(20);

        assert_eq!(*values.lock(), vec![11, 12, 22]);
    }

    #[test]
    fn test_negate() {
        let (values, _sub) = collect(&Observable::constant(true).negate());
        assert_eq!(*values.lock(), vec![false]);
    }

    #[test]
    fn test_tap_sees_every_value() {
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        let subject = Arc::new(Subject::new());
        let (values, _sub) = collect(&subject.observable().tap(move |_: &u8| *counter.lock() += 1));

        subject.publish(1);
        subject.publish(1);

        assert_eq!(*seen.lock(), 2);
        assert_eq!(*values.lock(), vec![1, 1]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let subject = Arc::new(Subject::new());
        let (values, sub) = collect(&subject.observable());
        assert_eq!(subject.subscriber_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        subject.publish(1);

        assert!(sub.is_closed());
        assert_eq!(subject.subscriber_count(), 0);
        assert!(values.lock().is_empty());
    }

    #[test]
    fn test_unsubscribe_combined_detaches_both_sides() {
        let left = Arc::new(Subject::new());
        let right = Arc::new(Subject::new());
        let both = left
            .observable()
            .combine(&right.observable(), |a: &u8, b: &u8| a & b);
        let (_values, sub) = collect(&both);

        assert_eq!(left.subscriber_count(), 1);
        assert_eq!(right.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(left.subscriber_count(), 0);
        assert_eq!(right.subscriber_count(), 0);
    }

    #[test]
    fn test_reentrant_publish() {
        // A subscriber may publish into the subject it is subscribed to
        let subject: Arc<Subject<u32>> = Arc::new(Subject::new());
        let echo = Arc::clone(&subject);
        let _echo_sub = subject.observable().subscribe(move |v| {
            if *v < 3 {
                echo.publish(v + 1);
            }
        });

        subject.publish(0);
        assert_eq!(subject.latest(), Some(3));
    }

    #[test]
    fn test_nested_publish_keeps_order_for_every_subscriber() {
        let subject: Arc<Subject<u32>> = Arc::new(Subject::new());
        let echo = Arc::clone(&subject);
        let _first = subject.observable().subscribe(move |v| {
            if *v == 1 {
                echo.publish(2);
            }
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _second = subject
            .observable()
            .subscribe(move |v| seen_clone.lock().push(*v));

        subject.publish(1);
        // The later subscriber sees 1 before the 2 published from inside the fan-out
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(subject.latest(), Some(2));
    }

    #[test]
    fn test_feedback_loop_settles_on_newest_pair() {
        // p drives q and q drives p, each through its own subject
        let p: Arc<Subject<bool>> = Arc::new(Subject::new());
        let q: Arc<Subject<bool>> = Arc::new(Subject::new());
        p.publish(false);
        q.publish(false);

        let pairs = Arc::new(Mutex::new(Vec::new()));
        let pairs_clone = Arc::clone(&pairs);
        let _watch = p
            .observable()
            .combine(&q.observable(), |a: &bool, b: &bool| (*a, *b))
            .subscribe(move |pair: &(bool, bool)| pairs_clone.lock().push(*pair));

        let q_out = Arc::clone(&q);
        let _p_to_q = p.observable().subscribe(move |v| {
            if q_out.latest() != Some(*v) {
                q_out.publish(*v);
            }
        });
        let p_out = Arc::clone(&p);
        let _q_to_p = q.observable().subscribe(move |v| {
            if p_out.latest() != Some(*v) {
                p_out.publish(*v);
            }
        });

        p.publish(true);
        assert_eq!(pairs.lock().last(), Some(&(true, true)));
        assert_eq!(p.latest(), Some(true));
        assert_eq!(q.latest(), Some(true));
    }
}
