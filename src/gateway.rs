//! Orchestration of every authenticated operation.
//!
//! Each operation follows the same order: verify the bearer token, obtain the
//! profile, validate references, commit the local write, then mirror it to
//! the recommendation engine. Remote delivery always happens after the local
//! commit and never rolls it back.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::catalog::{Catalog, Item};
use crate::config::Preferences;
use crate::error::{Result, ServerError};
use crate::identity::{CredentialResolver, IdentityAdmin, VerifiedIdentity};
use crate::ledger::{PageRequest, Pagination, PreferenceLedger, Signal};
use crate::sync::{SyncClient, SyncEvent, recommendation_id};
use crate::user::{ProfileBuilder, ProfileStore, Provisioned, UserProfile};

const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default onboarding budget bounds.
pub const DEFAULT_BUDGET_MIN: f64 = 0.0;
pub const DEFAULT_BUDGET_MAX: f64 = 500.0;

/// Liked items with their pagination block.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct LikedItems {
    pub items: Vec<Item>,
    pub pagination: Pagination,
}

/// Onboarding answers forwarded as user attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Onboarding {
    pub budget_min: f64,
    pub budget_max: f64,
    pub gender: String,
    pub preferred_brands: Vec<String>,
    pub sizes: Vec<String>,
}

impl Onboarding {
    /// Attribute names understood by the recommendation engine.
    pub fn attributes(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("InitialBudgetMin".into(), json!(self.budget_min));
        map.insert("InitialBudgetMax".into(), json!(self.budget_max));
        map.insert("InitialGender".into(), json!(self.gender));
        map.insert("InitialPreferredBrands".into(), json!(self.preferred_brands));
        map.insert("InitialSizes".into(), json!(self.sizes));
        map
    }
}

/// Authenticated preference-synchronization gateway.
pub struct Gateway {
    resolver: Arc<dyn CredentialResolver>,
    profiles: Arc<dyn ProfileStore>,
    ledger: Arc<dyn PreferenceLedger>,
    catalog: Arc<dyn Catalog>,
    identity_admin: Arc<dyn IdentityAdmin>,
    sync: SyncClient,
    verify_timeout: Duration,
    preferences: Preferences,
}

impl Gateway {
    /// Create a new [`Gateway`].
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        profiles: Arc<dyn ProfileStore>,
        ledger: Arc<dyn PreferenceLedger>,
        catalog: Arc<dyn Catalog>,
        identity_admin: Arc<dyn IdentityAdmin>,
        sync: SyncClient,
    ) -> Self {
        Self {
            resolver,
            profiles,
            ledger,
            catalog,
            identity_admin,
            sync,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            preferences: Preferences::default(),
        }
    }

    /// Update the bearer token verification timeout.
    pub fn verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Update ledger tuning.
    pub fn preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Verify a bearer token.
    ///
    /// Every verification failure, timeouts included, is reported as
    /// [`ServerError::InvalidToken`].
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity> {
        match tokio::time::timeout(self.verify_timeout, self.resolver.resolve(token)).await {
            Ok(Ok(identity)) => Ok(identity),
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "bearer token rejected");
                Err(ServerError::InvalidToken)
            },
            Err(_) => {
                tracing::debug!(timeout = ?self.verify_timeout, "bearer token verification timed out");
                Err(ServerError::InvalidToken)
            },
        }
    }

    /// Verify a bearer token and return its profile, provisioning it on
    /// first sight.
    pub async fn authenticate(&self, token: &str) -> Result<UserProfile> {
        let identity = self.verify(token).await?;
        self.profiles
            .get_or_create(&ProfileBuilder::from_identity(&identity).build())
            .await
    }

    /// Record a preference signal for `item_id`.
    pub async fn record_signal(
        &self,
        user: &UserProfile,
        item_id: &str,
        value: i32,
        recommendation: Option<String>,
    ) -> Result<()> {
        let Preferences { min_signal, max_signal, .. } = self.preferences;
        if !(min_signal..=max_signal).contains(&value) {
            return Err(ServerError::InvalidSignal(format!(
                "{value} is outside [{min_signal}, {max_signal}]"
            )));
        }

        if !self.catalog.exists(item_id).await? {
            return Err(ServerError::item_not_found(item_id));
        }

        let signal = Signal::new(item_id, value, self.preferences.like_threshold);
        self.ledger.set_preference(user, &signal).await?;
        tracing::debug!(subject_id = %user.subject_id, %item_id, value, liked = signal.liked, "preference saved");

        self.sync
            .dispatch(&SyncEvent::RatingSet {
                subject_id: user.subject_id.clone(),
                item_id: signal.item_id,
                value,
                recommendation_id: recommendation_id(recommendation),
            })
            .await;

        Ok(())
    }

    /// Normalize client pagination against configured bounds.
    pub fn page_request(&self, page: Option<u32>, page_size: Option<u32>) -> PageRequest {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(self.preferences.default_page_size)
                .clamp(1, self.preferences.max_page_size.max(1)),
        }
    }

    /// Page of liked items.
    ///
    /// A catalog failure yields an empty first page instead of an error.
    pub async fn liked_items(&self, user: &UserProfile, request: PageRequest) -> Result<LikedItems> {
        let page = self.ledger.liked_items(user, request).await?;

        match self.catalog.fetch(&page.item_ids).await {
            Ok(items) => Ok(LikedItems {
                items,
                pagination: Pagination::new(request, page.total_count),
            }),
            Err(err) => {
                tracing::warn!(subject_id = %user.subject_id, error = %err, "liked items could not be loaded");
                Ok(LikedItems {
                    items: Vec::new(),
                    pagination: Pagination::new(self.page_request(None, None), 0),
                })
            },
        }
    }

    /// Every purchased item.
    pub async fn purchased_items(&self, user: &UserProfile) -> Result<Vec<Item>> {
        let item_ids = self.ledger.purchased_items(user).await?;
        self.catalog.fetch(&item_ids).await
    }

    /// Add items to the purchased set. Unknown ids reject the whole batch.
    pub async fn confirm_purchases(&self, user: &UserProfile, item_ids: Vec<String>) -> Result<()> {
        let mut seen = HashSet::new();
        let item_ids: Vec<String> = item_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if let Some(missing) = self.catalog.missing(&item_ids).await?.into_iter().next() {
            return Err(ServerError::item_not_found(missing));
        }

        self.ledger.mark_purchased(user, &item_ids).await
    }

    /// Create the profile for a verified identity, or refresh it.
    pub async fn provision(
        &self,
        identity: &VerifiedIdentity,
        name: Option<String>,
    ) -> Result<Provisioned> {
        let profile = ProfileBuilder::from_identity(identity)
            .name(name.clone())
            .build_with_explicit(name);
        let provisioned = self.profiles.create_or_update(&profile).await?;

        if provisioned.created {
            tracing::info!(subject_id = %identity.subject_id, "profile created");
        }

        self.sync
            .dispatch(&SyncEvent::UserCreated {
                subject_id: identity.subject_id.clone(),
            })
            .await;

        Ok(provisioned)
    }

    /// Profile of a verified identity, if provisioned. Never creates one.
    pub async fn profile(&self, identity: &VerifiedIdentity) -> Result<Option<UserProfile>> {
        self.profiles.find(&identity.subject_id).await
    }

    /// Mirror a detail view.
    pub async fn record_detail_view(
        &self,
        user: &UserProfile,
        item_id: &str,
        recommendation: Option<String>,
    ) -> Result<()> {
        self.sync
            .dispatch(&SyncEvent::DetailViewed {
                subject_id: user.subject_id.clone(),
                item_id: item_id.to_owned(),
                recommendation_id: recommendation_id(recommendation),
            })
            .await;
        Ok(())
    }

    /// Mirror a purchase. Purchase confirmation is a separate operation.
    pub async fn record_purchase(
        &self,
        user: &UserProfile,
        item_id: &str,
        recommendation: Option<String>,
    ) -> Result<()> {
        self.sync
            .dispatch(&SyncEvent::Purchased {
                subject_id: user.subject_id.clone(),
                item_id: item_id.to_owned(),
                recommendation_id: recommendation_id(recommendation),
            })
            .await;
        Ok(())
    }

    /// Send onboarding answers. The remote write is the whole operation, so
    /// its failure is returned.
    pub async fn set_onboarding(&self, user: &UserProfile, onboarding: &Onboarding) -> Result<()> {
        self.sync
            .deliver(&SyncEvent::AttributesSet {
                subject_id: user.subject_id.clone(),
                attributes: onboarding.attributes(),
            })
            .await?;
        Ok(())
    }

    /// Delete an account from the recommendation engine, the identity
    /// provider and the local store, in that order.
    ///
    /// Remote failures are logged and do not stop the sequence; only the
    /// local deletion, attempted last, can fail the operation.
    pub async fn delete_account(&self, identity: &VerifiedIdentity) -> Result<()> {
        let subject_id = &identity.subject_id;
        let Some(profile) = self.profiles.find(subject_id).await? else {
            return Err(ServerError::NotFound {
                entity: "profile",
                id: subject_id.clone(),
            });
        };

        self.sync
            .dispatch(&SyncEvent::UserDeleted {
                subject_id: subject_id.clone(),
            })
            .await;

        if let Err(err) = self.identity_admin.delete_subject(subject_id).await {
            metrics::counter!("identity_provider_failures_total").increment(1);
            tracing::warn!(%subject_id, error = %err, "identity provider deletion failed, continuing");
        }

        self.profiles.delete(&profile).await?;
        tracing::info!(%subject_id, "account deleted");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::*;

    const TOKEN: &str = "token-ada";
    const SUBJECT: &str = "uid-ada";

    struct Harness {
        gateway: Arc<Gateway>,
        store: Arc<MemoryStore>,
        engine: Arc<RecordingEngine>,
        admin: Arc<RecordingIdentityAdmin>,
        journal: Journal,
    }

    fn harness_with(engine: RecordingEngine, admin: RecordingIdentityAdmin) -> Harness {
        let journal = Journal::default();
        let store = Arc::new(MemoryStore::default().with_journal(journal.clone()));
        let engine = Arc::new(engine.with_journal(journal.clone()));
        let admin = Arc::new(admin.with_journal(journal.clone()));
        let catalog = Arc::new(MemoryCatalog::with_items((0..30).map(|i| format!("P{i}"))));
        let resolver = Arc::new(StaticResolver::default().with(
            TOKEN,
            VerifiedIdentity {
                subject_id: SUBJECT.into(),
                claimed_name: None,
                claimed_email: Some("ada@example.com".into()),
            },
        ));

        let gateway = Gateway::new(
            resolver,
            store.clone(),
            store.clone(),
            catalog,
            admin.clone(),
            SyncClient::new(engine.clone(), Duration::from_millis(200)),
        );

        Harness {
            gateway: Arc::new(gateway),
            store,
            engine,
            admin,
            journal,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingEngine::default(), RecordingIdentityAdmin::default())
    }

    fn identity() -> VerifiedIdentity {
        VerifiedIdentity {
            subject_id: SUBJECT.into(),
            claimed_name: None,
            claimed_email: Some("ada@example.com".into()),
        }
    }

    #[tokio::test]
    async fn test_invalid_token_is_uniform() {
        let h = harness();
        assert!(matches!(
            h.gateway.authenticate("forged").await,
            Err(ServerError::InvalidToken)
        ));
        assert_eq!(h.store.profile_count(), 0);
    }

    #[tokio::test]
    async fn test_verification_timeout_is_unauthorized() {
        let store = Arc::new(MemoryStore::default());
        let gateway = Gateway::new(
            Arc::new(StaticResolver::default().slow(Duration::from_millis(200))),
            store.clone(),
            store,
            Arc::new(MemoryCatalog::default()),
            Arc::new(RecordingIdentityAdmin::default()),
            SyncClient::disabled(),
        )
        .verify_timeout(Duration::from_millis(10));

        assert!(matches!(
            gateway.verify(TOKEN).await,
            Err(ServerError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_provisions_lazily() {
        let h = harness();

        let first = h.gateway.authenticate(TOKEN).await.unwrap();
        let second = h.gateway.authenticate(TOKEN).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.username, "ada");
        assert_eq!(h.store.profile_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_share_one_profile() {
        let h = harness();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let gateway = Arc::clone(&h.gateway);
            handles.push(tokio::spawn(async move {
                gateway.authenticate(TOKEN).await.unwrap().id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 1);
        assert_eq!(h.store.profile_count(), 1);
    }

    #[tokio::test]
    async fn test_provision_twice() {
        let h = harness();

        let first = h.gateway.provision(&identity(), None).await.unwrap();
        let second = h
            .gateway
            .provision(&identity(), Some("Ada Lovelace".into()))
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.profile.id, second.profile.id);
        assert_eq!(second.profile.username, "Ada Lovelace");
        assert_eq!(
            h.engine.events(),
            vec![
                SyncEvent::UserCreated { subject_id: SUBJECT.into() },
                SyncEvent::UserCreated { subject_id: SUBJECT.into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_last_signal_wins_and_likes_are_additive() {
        let h = harness();
        let user = h.gateway.authenticate(TOKEN).await.unwrap();

        h.gateway.record_signal(&user, "P1", 1, None).await.unwrap();
        assert_eq!(h.store.liked(&user), vec!["P1".to_string()]);
        assert_eq!(h.store.preference_value(&user, "P1"), Some(1));

        h.gateway.record_signal(&user, "P1", 0, Some(String::new())).await.unwrap();
        assert_eq!(h.store.liked(&user), vec!["P1".to_string()]);
        assert_eq!(h.store.preference_value(&user, "P1"), Some(0));
        assert_eq!(h.store.preference_count(&user), 1);

        for value in [-1, 1, 0, 1] {
            h.gateway.record_signal(&user, "P2", value, Some("r-1".into())).await.unwrap();
        }
        assert_eq!(h.store.preference_value(&user, "P2"), Some(1));
        assert_eq!(h.store.preference_count(&user), 2);

        assert_eq!(
            h.engine.events()[1],
            SyncEvent::RatingSet {
                subject_id: SUBJECT.into(),
                item_id: "P1".into(),
                value: 0,
                recommendation_id: None,
            }
        );
        assert_eq!(
            h.engine.events().last(),
            Some(&SyncEvent::RatingSet {
                subject_id: SUBJECT.into(),
                item_id: "P2".into(),
                value: 1,
                recommendation_id: Some("r-1".into()),
            })
        );
    }

    #[tokio::test]
    async fn test_configurable_like_threshold() {
        let store = Arc::new(MemoryStore::default());
        let gateway = Gateway::new(
            Arc::new(StaticResolver::default().with(TOKEN, identity())),
            store.clone(),
            store.clone(),
            Arc::new(MemoryCatalog::with_items(["P1", "P2"])),
            Arc::new(RecordingIdentityAdmin::default()),
            SyncClient::disabled(),
        )
        .preferences(Preferences {
            like_threshold: 3,
            max_signal: 5,
            ..Default::default()
        });

        let user = gateway.authenticate(TOKEN).await.unwrap();
        gateway.record_signal(&user, "P1", 2, None).await.unwrap();
        gateway.record_signal(&user, "P2", 3, None).await.unwrap();

        assert_eq!(store.liked(&user), vec!["P2".to_string()]);
    }

    #[tokio::test]
    async fn test_signal_outside_scale_is_rejected() {
        let h = harness();
        let user = h.gateway.authenticate(TOKEN).await.unwrap();

        for value in [2, 5, -2] {
            assert!(matches!(
                h.gateway.record_signal(&user, "P1", value, None).await,
                Err(ServerError::InvalidSignal(_))
            ));
        }

        assert_eq!(h.store.preference_count(&user), 0);
        assert!(h.store.liked(&user).is_empty());
        assert!(h.engine.events().is_empty());
    }

    #[tokio::test]
    async fn test_signal_on_unknown_item() {
        let h = harness();
        let user = h.gateway.authenticate(TOKEN).await.unwrap();

        assert!(matches!(
            h.gateway.record_signal(&user, "missing", 1, None).await,
            Err(ServerError::NotFound { .. })
        ));
        assert_eq!(h.store.preference_count(&user), 0);
        assert!(h.engine.events().is_empty());
    }

    #[tokio::test]
    async fn test_engine_outage_keeps_local_write() {
        let h = harness_with(RecordingEngine::failing(), RecordingIdentityAdmin::default());
        let user = h.gateway.authenticate(TOKEN).await.unwrap();

        h.gateway.record_signal(&user, "P3", 1, None).await.unwrap();

        assert_eq!(h.store.preference_value(&user, "P3"), Some(1));
        assert_eq!(h.engine.events().len(), 1);
    }

    #[tokio::test]
    async fn test_liked_pagination() {
        let h = harness();
        let user = h.gateway.authenticate(TOKEN).await.unwrap();
        for i in 0..25 {
            h.gateway.record_signal(&user, &format!("P{i}"), 1, None).await.unwrap();
        }

        let page = h
            .gateway
            .liked_items(&user, h.gateway.page_request(Some(2), Some(20)))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0].id, "P20");
        assert_eq!(page.items[4].id, "P24");
        assert_eq!(page.pagination.total_count, 25);
        assert_eq!(page.pagination.total_pages, 2);

        let beyond = h
            .gateway
            .liked_items(&user, h.gateway.page_request(Some(7), None))
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.pagination.total_count, 25);
        assert_eq!(beyond.pagination.page, 7);
    }

    #[tokio::test]
    async fn test_liked_items_catalog_failure_yields_empty_page() {
        let store = Arc::new(MemoryStore::default());
        let gateway = Gateway::new(
            Arc::new(StaticResolver::default().with(TOKEN, identity())),
            store.clone(),
            store.clone(),
            Arc::new(MemoryCatalog::with_items(["P1"]).failing_fetch()),
            Arc::new(RecordingIdentityAdmin::default()),
            SyncClient::disabled(),
        );
        let user = gateway.authenticate(TOKEN).await.unwrap();
        gateway.record_signal(&user, "P1", 1, None).await.unwrap();

        let page = gateway
            .liked_items(&user, gateway.page_request(Some(1), Some(5)))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(
            page.pagination,
            Pagination { page: 1, page_size: 20, total_count: 0, total_pages: 0 }
        );
    }

    #[test]
    fn test_page_request_bounds() {
        let h = harness();
        assert_eq!(h.gateway.page_request(None, None), PageRequest { page: 1, page_size: 20 });
        assert_eq!(h.gateway.page_request(Some(0), Some(0)), PageRequest { page: 1, page_size: 1 });
        assert_eq!(h.gateway.page_request(Some(3), Some(1_000)), PageRequest { page: 3, page_size: 100 });
    }

    #[tokio::test]
    async fn test_confirm_purchases() {
        let h = harness();
        let user = h.gateway.authenticate(TOKEN).await.unwrap();

        h.gateway
            .confirm_purchases(&user, vec!["P1".into(), "P2".into(), "P1".into()])
            .await
            .unwrap();
        h.gateway.confirm_purchases(&user, vec!["P2".into()]).await.unwrap();
        h.gateway.confirm_purchases(&user, Vec::new()).await.unwrap();

        let items = h.gateway.purchased_items(&user).await.unwrap();
        assert_eq!(items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["P1", "P2"]);

        assert!(matches!(
            h.gateway.confirm_purchases(&user, vec!["P3".into(), "nope".into()]).await,
            Err(ServerError::NotFound { ref id, .. }) if id == "nope"
        ));
        // Rejected batch leaves no partial write.
        assert_eq!(h.gateway.purchased_items(&user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_interaction_events() {
        let h = harness_with(RecordingEngine::failing(), RecordingIdentityAdmin::default());
        let user = h.gateway.authenticate(TOKEN).await.unwrap();

        h.gateway.record_detail_view(&user, "P1", Some("r-9".into())).await.unwrap();
        h.gateway.record_purchase(&user, "P1", None).await.unwrap();

        assert_eq!(
            h.engine.events(),
            vec![
                SyncEvent::DetailViewed {
                    subject_id: SUBJECT.into(),
                    item_id: "P1".into(),
                    recommendation_id: Some("r-9".into()),
                },
                SyncEvent::Purchased {
                    subject_id: SUBJECT.into(),
                    item_id: "P1".into(),
                    recommendation_id: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_onboarding_failure_is_surfaced() {
        let onboarding = Onboarding {
            budget_min: DEFAULT_BUDGET_MIN,
            budget_max: DEFAULT_BUDGET_MAX,
            gender: "women".into(),
            preferred_brands: vec!["Nike".into()],
            sizes: vec!["38".into()],
        };

        let h = harness();
        let user = h.gateway.authenticate(TOKEN).await.unwrap();
        h.gateway.set_onboarding(&user, &onboarding).await.unwrap();
        let events = h.engine.events();
        let SyncEvent::AttributesSet { attributes, .. } = &events[0] else {
            panic!("attributes were not sent");
        };
        assert_eq!(attributes["InitialBudgetMax"], json!(500.0));
        assert_eq!(attributes["InitialPreferredBrands"], json!(["Nike"]));

        let h = harness_with(RecordingEngine::failing(), RecordingIdentityAdmin::default());
        let user = h.gateway.authenticate(TOKEN).await.unwrap();
        assert!(matches!(
            h.gateway.set_onboarding(&user, &onboarding).await,
            Err(ServerError::Sync(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_account_order_and_cascade() {
        let h = harness();
        let user = h.gateway.authenticate(TOKEN).await.unwrap();
        h.gateway.record_signal(&user, "P1", 1, None).await.unwrap();
        h.gateway.confirm_purchases(&user, vec!["P2".into()]).await.unwrap();
        h.journal.clear();

        h.gateway.delete_account(&identity()).await.unwrap();

        assert_eq!(h.journal.entries(), vec!["engine:user_deleted", "admin:delete", "store:delete"]);
        assert_eq!(h.store.profile_count(), 0);
        assert_eq!(h.store.preference_count(&user), 0);
        assert!(h.store.liked(&user).is_empty());
        assert_eq!(h.admin.deleted(), vec![SUBJECT.to_string()]);

        // A fresh profile starts without residual data.
        let fresh = h.gateway.authenticate(TOKEN).await.unwrap();
        assert_ne!(fresh.id, user.id);
        assert_eq!(h.store.preference_count(&fresh), 0);
        assert!(h.gateway.purchased_items(&fresh).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_account_tolerates_remote_failures() {
        let h = harness_with(RecordingEngine::failing(), RecordingIdentityAdmin::failing());
        h.gateway.authenticate(TOKEN).await.unwrap();
        h.journal.clear();

        h.gateway.delete_account(&identity()).await.unwrap();

        assert_eq!(h.journal.entries(), vec!["engine:user_deleted", "admin:delete", "store:delete"]);
        assert_eq!(h.store.profile_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_account_surfaces_local_failure() {
        let h = harness();
        h.gateway.authenticate(TOKEN).await.unwrap();
        h.store.fail_deletes();

        assert!(h.gateway.delete_account(&identity()).await.is_err());
        // Remote steps were still attempted first.
        assert_eq!(h.admin.deleted(), vec![SUBJECT.to_string()]);
        assert_eq!(h.store.profile_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_account() {
        let h = harness();
        assert!(matches!(
            h.gateway.delete_account(&identity()).await,
            Err(ServerError::NotFound { entity: "profile", .. })
        ));
        assert!(h.engine.events().is_empty());
        assert!(h.admin.deleted().is_empty());
    }
}
