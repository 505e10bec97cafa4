//! Per-Device Publish/Subscribe Hub
//!
//! Tracks which viewer connections are watching which device and fans each
//! published reading out to them. Delivery is push-and-forget: a subscriber
//! whose send fails is pruned, never retried, and the failure is invisible
//! to the publisher.
//!
//! ## Architecture
//!
//! - **Hub**: device id → `DeviceChannel`, each with its own lock so
//!   unrelated devices never contend
//! - **RelayConnection**: the narrow seam the hub pushes frames through
//! - **HubEvents**: diagnostic hook invoked for every pruned subscriber

pub mod connection;

pub use connection::{ConnectionError, ConnectionId, RelayConnection, CLOSE_UNAUTHORIZED};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::telemetry::Telemetry;

/// Configuration for the relay hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Upper bound for a single subscriber send in milliseconds; a send that
    /// exceeds it counts as failed. 0 disables the bound.
    pub send_timeout_ms: u64,
    /// Remove a device's registry once its last subscriber leaves.
    pub evict_empty_devices: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5000,
            evict_empty_devices: true,
        }
    }
}

/// Diagnostic hook for subscriber lifecycle events.
///
/// Send failures never reach the publisher; this is where they surface.
pub trait HubEvents: Send + Sync {
    /// A subscriber was pruned after a failed send.
    fn subscriber_dropped(&self, device_id: &str, connection_id: &str, error: &ConnectionError);
}

/// Default observer: logs each drop.
struct LogEvents;

impl HubEvents for LogEvents {
    fn subscriber_dropped(&self, device_id: &str, connection_id: &str, error: &ConnectionError) {
        tracing::warn!(
            device_id = %device_id,
            connection_id = %connection_id,
            error = %error,
            "Pruned stale subscriber"
        );
    }
}

/// Live subscribers of one device.
#[derive(Default)]
struct DeviceChannel {
    subscribers: RwLock<HashMap<ConnectionId, Arc<dyn RelayConnection>>>,
}

/// The relay hub. Constructed once at startup and shared via `Arc`.
pub struct Hub {
    /// Lock order: `devices` before any channel's `subscribers`. Every
    /// insert into a channel happens while an outer guard is held, so the
    /// eviction path (outer write + emptiness check) cannot orphan a
    /// concurrent subscribe.
    devices: RwLock<HashMap<String, Arc<DeviceChannel>>>,
    config: HubConfig,
    observer: Arc<dyn HubEvents>,
}

impl Hub {
    /// Create a hub with the default logging observer.
    pub fn new(config: HubConfig) -> Self {
        Self::with_observer(config, Arc::new(LogEvents))
    }

    /// Create a hub with a custom drop observer (metrics, tests).
    pub fn with_observer(config: HubConfig, observer: Arc<dyn HubEvents>) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            config,
            observer,
        }
    }

    /// Register a connection as a listener for a device.
    ///
    /// Creates the device's registry on first subscribe. Infallible: the
    /// connection is assumed accepted.
    pub async fn subscribe(
        &self,
        device_id: &str,
        connection: Arc<dyn RelayConnection>,
    ) -> ConnectionId {
        let id = Uuid::new_v4().to_string();

        {
            let devices = self.devices.read().await;
            if let Some(channel) = devices.get(device_id) {
                channel
                    .subscribers
                    .write()
                    .await
                    .insert(id.clone(), connection);
                tracing::debug!(device_id = %device_id, connection_id = %id, "Subscribed");
                return id;
            }
        }

        // First subscriber for this device: entry creation goes through the
        // write lock so two racing first-subscribes land in one channel.
        let mut devices = self.devices.write().await;
        let channel = devices
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(DeviceChannel::default()));
        channel
            .subscribers
            .write()
            .await
            .insert(id.clone(), connection);

        tracing::debug!(device_id = %device_id, connection_id = %id, "Subscribed");
        id
    }

    /// Remove a connection from a device's registry.
    ///
    /// Idempotent: unknown devices and already-removed connections are
    /// no-ops.
    pub async fn unsubscribe(&self, device_id: &str, connection_id: &str) {
        let emptied = {
            let devices = self.devices.read().await;
            let Some(channel) = devices.get(device_id) else {
                return;
            };
            let mut subs = channel.subscribers.write().await;
            if subs.remove(connection_id).is_none() {
                return;
            }
            tracing::debug!(device_id = %device_id, connection_id = %connection_id, "Unsubscribed");
            subs.is_empty()
        };

        if emptied && self.config.evict_empty_devices {
            self.evict_if_empty(device_id).await;
        }
    }

    /// Fan a reading out to every current subscriber of its device.
    ///
    /// Iterates a snapshot taken at the start of the call; subscribers whose
    /// send fails are removed before returning. Returns the number of
    /// successful deliveries (diagnostic only).
    pub async fn publish(&self, reading: &Telemetry) -> usize {
        let channel = {
            let devices = self.devices.read().await;
            match devices.get(&reading.device_id) {
                Some(channel) => Arc::clone(channel),
                None => return 0,
            }
        };

        let text = match serde_json::to_string(reading) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize reading");
                return 0;
            }
        };

        // Snapshot before sending: a subscriber joining mid-fan-out is
        // unaffected by this call, one leaving cannot break iteration.
        let snapshot: Vec<(ConnectionId, Arc<dyn RelayConnection>)> = {
            let subs = channel.subscribers.read().await;
            subs.iter()
                .map(|(id, conn)| (id.clone(), Arc::clone(conn)))
                .collect()
        };

        let mut delivered = 0;
        let mut stale = Vec::new();

        for (id, conn) in snapshot {
            match self.send_bounded(conn.as_ref(), &text).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    self.observer.subscriber_dropped(&reading.device_id, &id, &e);
                    stale.push(id);
                }
            }
        }

        if !stale.is_empty() {
            let emptied = {
                let mut subs = channel.subscribers.write().await;
                for id in &stale {
                    subs.remove(id);
                }
                subs.is_empty()
            };
            if emptied && self.config.evict_empty_devices {
                self.evict_if_empty(&reading.device_id).await;
            }
        }

        if delivered > 0 {
            tracing::trace!(
                device_id = %reading.device_id,
                subscribers = delivered,
                "Relayed reading"
            );
        }

        delivered
    }

    /// Number of devices with a live registry.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Number of live subscribers for one device.
    pub async fn subscriber_count(&self, device_id: &str) -> usize {
        match self.devices.read().await.get(device_id) {
            Some(channel) => channel.subscribers.read().await.len(),
            None => 0,
        }
    }

    /// Total live subscribers across all devices.
    pub async fn total_subscribers(&self) -> usize {
        let devices = self.devices.read().await;
        let mut total = 0;
        for channel in devices.values() {
            total += channel.subscribers.read().await.len();
        }
        total
    }

    async fn send_bounded(
        &self,
        conn: &dyn RelayConnection,
        text: &str,
    ) -> Result<(), ConnectionError> {
        if self.config.send_timeout_ms == 0 {
            return conn.send(text).await;
        }
        let bound = Duration::from_millis(self.config.send_timeout_ms);
        match tokio::time::timeout(bound, conn.send(text)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Drop the device entry if its registry is empty. The emptiness check
    /// runs under the outer write lock, which excludes every subscribe path.
    async fn evict_if_empty(&self, device_id: &str) {
        let mut devices = self.devices.write().await;
        let empty = match devices.get(device_id) {
            Some(channel) => channel.subscribers.read().await.is_empty(),
            None => false,
        };
        if empty {
            devices.remove(device_id);
            tracing::debug!(device_id = %device_id, "Evicted idle device channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted connection: records frames, optionally fails or hangs.
    struct FakeConnection {
        sent: Mutex<Vec<String>>,
        fail: AtomicBool,
        hang: bool,
    }

    impl FakeConnection {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                hang: false,
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                hang: true,
            })
        }

        fn start_failing(&self) {
            self.fail.store(true, Ordering::SeqCst);
        }

        fn frames(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RelayConnection for FakeConnection {
        async fn send(&self, text: &str) -> Result<(), ConnectionError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ConnectionError::Closed);
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&self, _code: u16) {}
    }

    struct CountingEvents {
        drops: AtomicUsize,
    }

    impl HubEvents for CountingEvents {
        fn subscriber_dropped(&self, _device: &str, _conn: &str, _error: &ConnectionError) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn reading(device: &str) -> Telemetry {
        Telemetry::new(device).field("respiration_rate", 24.2)
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.send_timeout_ms, 5000);
        assert!(config.evict_empty_devices);
    }

    #[tokio::test]
    async fn test_fanout_reaches_all_subscribers() {
        let hub = Hub::new(HubConfig::default());
        let c1 = FakeConnection::new();
        let c2 = FakeConnection::new();

        hub.subscribe("demo-1", c1.clone()).await;
        hub.subscribe("demo-1", c2.clone()).await;

        let delivered = hub.publish(&reading("demo-1")).await;
        assert_eq!(delivered, 2);

        for conn in [&c1, &c2] {
            let frames = conn.frames();
            assert_eq!(frames.len(), 1);
            let payload: Value = serde_json::from_str(&frames[0]).unwrap();
            assert_eq!(payload["device_id"], "demo-1");
            assert_eq!(payload["respiration_rate"], 24.2);
        }
    }

    #[tokio::test]
    async fn test_isolation_across_devices() {
        let hub = Hub::new(HubConfig::default());
        let watcher_a = FakeConnection::new();
        let watcher_b = FakeConnection::new();

        hub.subscribe("demo-1", watcher_a.clone()).await;
        hub.subscribe("demo-2", watcher_b.clone()).await;

        hub.publish(&reading("demo-1")).await;

        assert_eq!(watcher_a.frames().len(), 1);
        assert!(watcher_b.frames().is_empty());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let hub = Hub::new(HubConfig::default());
        assert_eq!(hub.publish(&reading("nobody-home")).await, 0);
    }

    #[tokio::test]
    async fn test_failed_send_prunes_without_retry() {
        let hub = Hub::new(HubConfig::default());
        let good = FakeConnection::new();
        let bad = FakeConnection::new();
        bad.start_failing();

        hub.subscribe("demo-1", good.clone()).await;
        hub.subscribe("demo-1", bad.clone()).await;

        let delivered = hub.publish(&reading("demo-1")).await;
        assert_eq!(delivered, 1);
        assert_eq!(hub.subscriber_count("demo-1").await, 1);

        // Pruned subscriber is gone for good; the survivor keeps receiving.
        hub.publish(&reading("demo-1")).await;
        assert_eq!(good.frames().len(), 2);
        assert!(bad.frames().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = Hub::new(HubConfig::default());
        let conn = FakeConnection::new();

        let id = hub.subscribe("demo-1", conn).await;
        hub.unsubscribe("demo-1", &id).await;
        hub.unsubscribe("demo-1", &id).await;
        hub.unsubscribe("demo-1", "never-subscribed").await;
        hub.unsubscribe("no-such-device", &id).await;

        assert_eq!(hub.subscriber_count("demo-1").await, 0);
    }

    #[tokio::test]
    async fn test_no_cross_call_interference() {
        let hub = Hub::new(HubConfig::default());
        let c1 = FakeConnection::new();
        let c2 = FakeConnection::new();

        hub.subscribe("demo-1", c1.clone()).await;
        hub.publish(&reading("demo-1").field("seq", 1.0)).await;

        hub.subscribe("demo-1", c2.clone()).await;
        hub.publish(&reading("demo-1").field("seq", 2.0)).await;

        assert_eq!(c1.frames().len(), 2);
        assert_eq!(c2.frames().len(), 1);
        let first_for_c2: Value = serde_json::from_str(&c2.frames()[0]).unwrap();
        assert_eq!(first_for_c2["seq"], 2.0);
    }

    #[tokio::test]
    async fn test_empty_registry_is_evicted() {
        let hub = Hub::new(HubConfig::default());
        let conn = FakeConnection::new();

        let id = hub.subscribe("demo-1", conn).await;
        assert_eq!(hub.device_count().await, 1);

        hub.unsubscribe("demo-1", &id).await;
        assert_eq!(hub.device_count().await, 0);
    }

    #[tokio::test]
    async fn test_eviction_can_be_disabled() {
        let config = HubConfig {
            evict_empty_devices: false,
            ..Default::default()
        };
        let hub = Hub::new(config);
        let conn = FakeConnection::new();

        let id = hub.subscribe("demo-1", conn).await;
        hub.unsubscribe("demo-1", &id).await;

        assert_eq!(hub.device_count().await, 1);
        assert_eq!(hub.subscriber_count("demo-1").await, 0);
    }

    #[tokio::test]
    async fn test_observer_sees_each_drop() {
        let observer = Arc::new(CountingEvents {
            drops: AtomicUsize::new(0),
        });
        let hub = Hub::with_observer(HubConfig::default(), observer.clone());

        let bad = FakeConnection::new();
        bad.start_failing();
        hub.subscribe("demo-1", bad).await;
        hub.publish(&reading("demo-1")).await;

        assert_eq!(observer.drops.load(Ordering::SeqCst), 1);
        assert_eq!(hub.total_subscribers().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_subscriber_times_out_and_is_pruned() {
        let config = HubConfig {
            send_timeout_ms: 100,
            ..Default::default()
        };
        let hub = Hub::new(config);
        let stuck = FakeConnection::hanging();
        let good = FakeConnection::new();

        hub.subscribe("demo-1", stuck).await;
        hub.subscribe("demo-1", good.clone()).await;

        let delivered = hub.publish(&reading("demo-1")).await;

        assert_eq!(delivered, 1);
        assert_eq!(good.frames().len(), 1);
        assert_eq!(hub.subscriber_count("demo-1").await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_subscribes_share_one_channel() {
        let hub = Arc::new(Hub::new(HubConfig::default()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let hub = Arc::clone(&hub);
            handles.push(tokio::spawn(async move {
                hub.subscribe("fresh-device", FakeConnection::new()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(hub.device_count().await, 1);
        assert_eq!(hub.subscriber_count("fresh-device").await, 16);
    }
}
