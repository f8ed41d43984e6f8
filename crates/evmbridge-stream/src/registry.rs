//! Subscription registry: remote subscription ID → owning namespace.
//!
//! A shared cache with lazy population. The remote fetch is an
//! injected strategy rather than baked into the cache, so the
//! resolution discipline (populate eagerly on subscribe, fetch once on
//! first unseen ID, cache for the connector lifetime) is testable
//! without a gateway.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use evmbridge_client::streams::{StreamManager, Subscription};
use evmbridge_core::error::ConnectorError;

use crate::subname::parse_subscription_name;

/// Resolved metadata for one subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    pub id: String,
    pub name: String,
    /// `None` for legacy namespace-less listener names; such events are
    /// broadcast to every registered namespace.
    pub namespace: Option<String>,
    pub listener_id: String,
}

/// The reserved batch-pin subscription of a namespace.
#[derive(Debug, Clone)]
pub struct MultipartySubscription {
    pub subscription_id: String,
    pub namespace: String,
    pub network_version: i64,
}

/// Fetch-on-miss strategy for unknown subscription IDs.
#[async_trait]
pub trait SubscriptionFetcher: Send + Sync {
    /// `None` means the gateway does not know the subscription.
    async fn fetch(&self, subscription_id: &str) -> Result<Option<Subscription>, ConnectorError>;
}

#[async_trait]
impl SubscriptionFetcher for StreamManager {
    async fn fetch(&self, subscription_id: &str) -> Result<Option<Subscription>, ConnectorError> {
        self.subscription(subscription_id).await
    }
}

/// Concurrent map of resolved subscriptions plus the reserved
/// multiparty subscriptions, scoped to the connector lifetime.
pub struct SubscriptionRegistry {
    prefix: String,
    listeners: RwLock<HashMap<String, Arc<SubscriptionInfo>>>,
    multiparty: RwLock<HashMap<String, Arc<MultipartySubscription>>>,
}

impl SubscriptionRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            listeners: RwLock::new(HashMap::new()),
            multiparty: RwLock::new(HashMap::new()),
        }
    }

    /// Eager registration at subscribe time.
    pub fn insert_listener(&self, info: SubscriptionInfo) {
        self.listeners
            .write()
            .unwrap()
            .insert(info.id.clone(), Arc::new(info));
    }

    pub fn remove_listener(&self, subscription_id: &str) {
        self.listeners.write().unwrap().remove(subscription_id);
    }

    pub fn add_multiparty(&self, subscription_id: &str, namespace: &str, network_version: i64) {
        self.multiparty.write().unwrap().insert(
            subscription_id.to_string(),
            Arc::new(MultipartySubscription {
                subscription_id: subscription_id.to_string(),
                namespace: namespace.to_string(),
                network_version,
            }),
        );
    }

    pub fn remove_multiparty(&self, subscription_id: &str) {
        self.multiparty.write().unwrap().remove(subscription_id);
    }

    pub fn multiparty(&self, subscription_id: &str) -> Option<Arc<MultipartySubscription>> {
        self.multiparty.read().unwrap().get(subscription_id).cloned()
    }

    /// Resolve a subscription ID to its owner, fetching once on a
    /// miss. `None` means the gateway does not know the ID (the event
    /// has no route); an unparseable name is a hard error.
    pub async fn resolve(
        &self,
        subscription_id: &str,
        fetcher: &dyn SubscriptionFetcher,
    ) -> Result<Option<Arc<SubscriptionInfo>>, ConnectorError> {
        if let Some(hit) = self.listeners.read().unwrap().get(subscription_id) {
            return Ok(Some(hit.clone()));
        }

        let Some(sub) = fetcher.fetch(subscription_id).await? else {
            debug!(subscription_id, "subscription unknown to gateway, no route");
            return Ok(None);
        };

        let parsed = parse_subscription_name(&self.prefix, &sub.name)?;
        let info = Arc::new(SubscriptionInfo {
            id: subscription_id.to_string(),
            name: sub.name,
            namespace: parsed.namespace,
            listener_id: parsed.listener_id,
        });
        self.listeners
            .write()
            .unwrap()
            .insert(subscription_id.to_string(), info.clone());
        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeFetcher {
        name: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SubscriptionFetcher for FakeFetcher {
        async fn fetch(
            &self,
            subscription_id: &str,
        ) -> Result<Option<Subscription>, ConnectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.name.as_ref().map(|name| Subscription {
                id: subscription_id.to_string(),
                name: name.clone(),
                stream: "es1".into(),
                from_block: None,
                catchup: false,
                checkpoint: None,
            }))
        }
    }

    #[tokio::test]
    async fn miss_fetches_once_then_caches() {
        let registry = SubscriptionRegistry::new("eb");
        let fetcher = FakeFetcher {
            name: Some("eb-sub-ns1-1132312312312".into()),
            calls: AtomicUsize::new(0),
        };

        let first = registry.resolve("sub2", &fetcher).await.unwrap().unwrap();
        assert_eq!(first.namespace.as_deref(), Some("ns1"));
        let second = registry.resolve("sub2", &fetcher).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_subscription_has_no_route() {
        let registry = SubscriptionRegistry::new("eb");
        let fetcher = FakeFetcher {
            name: None,
            calls: AtomicUsize::new(0),
        };
        assert!(registry.resolve("sub2", &fetcher).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unparseable_name_is_a_hard_error() {
        let registry = SubscriptionRegistry::new("eb");
        let fetcher = FakeFetcher {
            name: Some("garbage".into()),
            calls: AtomicUsize::new(0),
        };
        assert!(matches!(
            registry.resolve("sub2", &fetcher).await,
            Err(ConnectorError::SubscriptionName { .. })
        ));
    }

    #[tokio::test]
    async fn eager_insert_skips_fetch() {
        let registry = SubscriptionRegistry::new("eb");
        registry.insert_listener(SubscriptionInfo {
            id: "sub1".into(),
            name: "eb-sub-ns1-abc".into(),
            namespace: Some("ns1".into()),
            listener_id: "abc".into(),
        });
        let fetcher = FakeFetcher {
            name: None,
            calls: AtomicUsize::new(0),
        };
        let info = registry.resolve("sub1", &fetcher).await.unwrap().unwrap();
        assert_eq!(info.namespace.as_deref(), Some("ns1"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
