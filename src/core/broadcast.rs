//! Live sample fan-out
//!
//! The hub keeps, per device, a set of subscriber sinks and pushes every
//! published sample to each of them. Each device's set sits behind its own
//! mutex, so publishing to one device never waits on another device's
//! subscribers. The outer map lock is only held to find or create a set.

use super::sample::Sample;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Why a sink refused a sample
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// Receiver is gone; the sink will be dropped
    #[error("Subscriber closed")]
    Closed,

    /// Receiver is lagging; this sample is skipped
    #[error("Subscriber queue full")]
    Full,
}

/// Destination for live samples
pub trait SampleSink: Send + Sync {
    /// Deliver one sample without blocking
    fn deliver(&self, sample: &Sample) -> Result<(), SinkError>;
}

impl SampleSink for mpsc::UnboundedSender<Sample> {
    fn deliver(&self, sample: &Sample) -> Result<(), SinkError> {
        self.send(*sample).map_err(|_| SinkError::Closed)
    }
}

impl SampleSink for mpsc::Sender<Sample> {
    fn deliver(&self, sample: &Sample) -> Result<(), SinkError> {
        self.try_send(*sample).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription backed by a bounded channel
#[derive(Debug)]
pub struct Subscription {
    /// Subscriber handle, for `unsubscribe`
    pub id: SubscriberId,
    /// Device subscribed to
    pub device_id: String,
    rx: mpsc::Receiver<Sample>,
}

impl Subscription {
    /// Wait for the next sample; `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<Sample> {
        self.rx.recv().await
    }

    /// Take a sample if one is queued
    pub fn try_recv(&mut self) -> Result<Sample, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

type SubscriberSet = Arc<Mutex<HashMap<SubscriberId, Box<dyn SampleSink>>>>;

/// Per-device fan-out of live samples
#[derive(Default)]
pub struct BroadcastHub {
    devices: RwLock<HashMap<String, SubscriberSet>>,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("devices", &self.devices.read().len())
            .finish()
    }
}

impl BroadcastHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` for `device_id`
    pub fn subscribe(&self, device_id: &str, sink: impl SampleSink + 'static) -> SubscriberId {
        let id = SubscriberId::new();
        let sink: Box<dyn SampleSink> = Box::new(sink);

        // Holding the map lock while inserting keeps a concurrent prune
        // from discarding the set we insert into.
        {
            let devices = self.devices.read();
            if let Some(set) = devices.get(device_id) {
                set.lock().insert(id, sink);
                debug!(device = device_id, subscriber = %id, "subscribed");
                return id;
            }
        }

        let mut devices = self.devices.write();
        devices
            .entry(device_id.to_string())
            .or_default()
            .lock()
            .insert(id, sink);
        debug!(device = device_id, subscriber = %id, "subscribed");
        id
    }

    /// Subscribe through a bounded channel of `capacity` samples
    pub fn subscribe_channel(&self, device_id: &str, capacity: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.subscribe(device_id, tx);
        Subscription {
            id,
            device_id: device_id.to_string(),
            rx,
        }
    }

    /// Remove a subscriber; true if it was registered
    pub fn unsubscribe(&self, device_id: &str, id: SubscriberId) -> bool {
        let Some(set) = self.set(device_id) else {
            return false;
        };
        let removed = set.lock().remove(&id).is_some();
        if removed {
            debug!(device = device_id, subscriber = %id, "unsubscribed");
            self.prune(device_id);
        }
        removed
    }

    /// Deliver `sample` to every subscriber of `device_id`.
    ///
    /// Closed sinks are dropped; returns the number of sinks that accepted
    /// the sample.
    pub fn publish(&self, device_id: &str, sample: &Sample) -> usize {
        let Some(set) = self.set(device_id) else {
            return 0;
        };

        let mut delivered = 0;
        let emptied = {
            let mut sinks = set.lock();
            sinks.retain(|id, sink| match sink.deliver(sample) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(SinkError::Full) => {
                    warn!(device = device_id, subscriber = %id, "subscriber lagging, sample skipped");
                    true
                }
                Err(SinkError::Closed) => {
                    debug!(device = device_id, subscriber = %id, "subscriber gone, dropped");
                    false
                }
            });
            sinks.is_empty()
        };

        if emptied {
            self.prune(device_id);
        }
        delivered
    }

    /// Number of subscribers for `device_id`
    pub fn subscriber_count(&self, device_id: &str) -> usize {
        self.set(device_id).map_or(0, |set| set.lock().len())
    }

    /// Devices that currently have subscribers
    pub fn devices(&self) -> Vec<String> {
        self.devices.read().keys().cloned().collect()
    }

    fn set(&self, device_id: &str) -> Option<SubscriberSet> {
        self.devices.read().get(device_id).cloned()
    }

    /// Drop the set for `device_id` if it is empty
    fn prune(&self, device_id: &str) {
        let mut devices = self.devices.write();
        let empty = devices
            .get(device_id)
            .is_some_and(|set| set.lock().is_empty());
        if empty {
            devices.remove(device_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts deliveries, optionally refusing them as closed
    struct CountingSink {
        count: Arc<AtomicUsize>,
        closed: bool,
    }

    impl SampleSink for CountingSink {
        fn deliver(&self, _sample: &Sample) -> Result<(), SinkError> {
            if self.closed {
                return Err(SinkError::Closed);
            }
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting(closed: bool) -> (CountingSink, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (CountingSink { count: count.clone(), closed }, count)
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.publish("dev1", &Sample::now(1.0)), 0);
        assert!(hub.devices().is_empty());
    }

    #[test]
    fn test_two_sinks_receive_exactly_once() {
        let hub = BroadcastHub::new();
        let mut a = hub.subscribe_channel("dev1", 8);
        let mut b = hub.subscribe_channel("dev1", 8);
        let sample = Sample::now(21.5);

        assert_eq!(hub.publish("dev1", &sample), 2);
        assert_eq!(a.try_recv().unwrap(), sample);
        assert_eq!(b.try_recv().unwrap(), sample);
        assert!(a.try_recv().is_err());
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn test_devices_are_isolated() {
        let hub = BroadcastHub::new();
        let mut one = hub.subscribe_channel("dev1", 8);
        let mut two = hub.subscribe_channel("dev2", 8);
        hub.publish("dev1", &Sample::now(1.0));
        assert!(one.try_recv().is_ok());
        assert!(two.try_recv().is_err());
    }

    #[test]
    fn test_closed_sink_dropped_others_served() {
        let hub = BroadcastHub::new();
        let (live, live_count) = counting(false);
        let (dead, dead_count) = counting(true);
        hub.subscribe("dev1", live);
        hub.subscribe("dev1", dead);

        assert_eq!(hub.publish("dev1", &Sample::now(1.0)), 1);
        assert_eq!(hub.subscriber_count("dev1"), 1);
        hub.publish("dev1", &Sample::now(2.0));
        assert_eq!(live_count.load(Ordering::SeqCst), 2);
        assert_eq!(dead_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_receiver_removed() {
        let hub = BroadcastHub::new();
        let sub = hub.subscribe_channel("dev1", 8);
        drop(sub);
        hub.publish("dev1", &Sample::now(1.0));
        assert_eq!(hub.subscriber_count("dev1"), 0);
        assert!(hub.devices().is_empty());
    }

    #[test]
    fn test_full_sink_kept() {
        let hub = BroadcastHub::new();
        let mut sub = hub.subscribe_channel("dev1", 1);
        assert_eq!(hub.publish("dev1", &Sample::now(1.0)), 1);
        assert_eq!(hub.publish("dev1", &Sample::now(2.0)), 0);
        assert_eq!(hub.subscriber_count("dev1"), 1);
        assert_eq!(sub.try_recv().unwrap().value, 1.0);
    }

    #[test]
    fn test_unsubscribe() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.subscribe("dev1", tx);
        assert!(hub.unsubscribe("dev1", id));
        assert!(!hub.unsubscribe("dev1", id));
        assert!(!hub.unsubscribe("nobody", id));
        hub.publish("dev1", &Sample::now(1.0));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscription_recv() {
        let hub = BroadcastHub::new();
        let mut sub = hub.subscribe_channel("dev1", 4);
        hub.publish("dev1", &Sample::now(3.0));
        assert_eq!(sub.recv().await.unwrap().value, 3.0);
    }
}
