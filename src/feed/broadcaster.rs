use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::aggregator::Aggregator;
use crate::activity::Activity;

pub type ActivityCallback = Arc<dyn Fn(&[Activity]) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: ActivityCallback,
}

/// Owned polling task; dropping it stops the timer.
struct PollTask(JoinHandle<()>);

impl Drop for PollTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum PollState {
    Idle,
    Polling(PollTask),
}

struct Inner {
    subscribers: Vec<Subscriber>,
    state: PollState,
    next_id: u64,
}

/// Fans each aggregation result out to every subscriber. Polls while at least
/// one subscriber exists and goes idle when the last one leaves.
pub struct Broadcaster {
    aggregator: Arc<Aggregator>,
    interval: Duration,
    inner: Mutex<Inner>,
    last_snapshot: Mutex<Vec<Activity>>,
}

impl Broadcaster {
    pub fn new(aggregator: Arc<Aggregator>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            aggregator,
            interval,
            inner: Mutex::new(Inner {
                subscribers: Vec::new(),
                state: PollState::Idle,
                next_id: 0,
            }),
            last_snapshot: Mutex::new(Vec::new()),
        })
    }

    /// Must be called from within a tokio runtime: the first subscriber
    /// starts the polling task.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&[Activity]) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            callback: Arc::new(callback),
        });

        if inner.subscribers.len() == 1 {
            log::info!("Polling activities every {:?}", self.interval);
            inner.state = PollState::Polling(self.spawn_polling());
        }

        Subscription {
            broadcaster: Arc::downgrade(self),
            id: Some(id),
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|s| s.id != id);
        if inner.subscribers.is_empty() {
            if let PollState::Polling(task) = std::mem::replace(&mut inner.state, PollState::Idle) {
                drop(task);
                log::info!("Last subscriber left, polling stopped");
            }
        }
    }

    fn spawn_polling(self: &Arc<Self>) -> PollTask {
        let weak = Arc::downgrade(self);
        let period = self.interval;
        PollTask(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(this) = weak.upgrade() else {
                    break;
                };
                let activities = this.aggregator.fetch_activities().await;
                this.dispatch(&activities);
            }
        }))
    }

    /// One aggregation outside the timer cadence, pushed to all subscribers.
    pub async fn refresh(&self) -> Vec<Activity> {
        let activities = self.aggregator.fetch_activities().await;
        self.dispatch(&activities);
        activities
    }

    /// Records the snapshot and calls every subscriber in subscription order.
    /// Callbacks run outside the lock so they may unsubscribe.
    pub fn dispatch(&self, activities: &[Activity]) {
        *self.last_snapshot.lock() = activities.to_vec();
        let callbacks: Vec<ActivityCallback> = self
            .inner
            .lock()
            .subscribers
            .iter()
            .map(|s| s.callback.clone())
            .collect();
        for callback in callbacks {
            callback(activities);
        }
    }

    pub fn last_snapshot(&self) -> Vec<Activity> {
        self.last_snapshot.lock().clone()
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.inner.lock().state, PollState::Polling(_))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// Handle returned by [`Broadcaster::subscribe`]; unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    broadcaster: Weak<Broadcaster>,
    id: Option<u64>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let (Some(id), Some(broadcaster)) = (self.id.take(), self.broadcaster.upgrade()) {
            broadcaster.unsubscribe(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{storage::Storage, CredentialStore};
    use crate::notify::Notifier;
    use tokio::sync::mpsc;

    fn broadcaster() -> Arc<Broadcaster> {
        let notifier = Notifier::new();
        let store = CredentialStore::load(Storage::in_memory().unwrap(), true, notifier.clone()).unwrap();
        let aggregator = Aggregator::new(reqwest::Client::new(), Arc::new(store), notifier);
        Broadcaster::new(Arc::new(aggregator), Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval_while_subscribed() {
        let b = broadcaster();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = b.subscribe(move |list| {
            let _ = tx.send(list.len());
        });
        assert!(b.is_polling());

        // Nothing before the first period has elapsed.
        assert!(tokio::time::timeout(Duration::from_secs(29), rx.recv()).await.is_err());
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(first.unwrap(), Some(5));
        let second = tokio::time::timeout(Duration::from_secs(31), rx.recv()).await;
        assert_eq!(second.unwrap(), Some(5));

        sub.unsubscribe();
        assert!(!b.is_polling());
        assert_eq!(b.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn last_unsubscribe_goes_idle() {
        let b = broadcaster();
        let first = b.subscribe(|_| {});
        let second = b.subscribe(|_| {});
        assert_eq!(b.subscriber_count(), 2);

        drop(first);
        assert!(b.is_polling());
        drop(second);
        assert!(!b.is_polling());

        let _again = b.subscribe(|_| {});
        assert!(b.is_polling());
    }

    #[tokio::test]
    async fn refresh_dispatches_in_subscription_order() {
        let b = broadcaster();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());
        let _s1 = b.subscribe(move |_| o1.lock().push(1));
        let _s2 = b.subscribe(move |_| o2.lock().push(2));

        let list = b.refresh().await;
        assert_eq!(list.len(), 5);
        assert_eq!(*order.lock(), vec![1, 2]);
        assert_eq!(b.last_snapshot().len(), 5);
    }
}
