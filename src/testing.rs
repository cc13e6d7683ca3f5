//! In-memory collaborators for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::AppState;
use crate::catalog::{Catalog, Item};
use crate::config::Configuration;
use crate::gateway::Gateway;
use crate::error::{Result, ServerError};
use crate::identity::{CredentialResolver, IdentityAdmin, IdentityError, VerifiedIdentity};
use crate::ledger::{LikedPage, PageRequest, PreferenceLedger, PreferenceRecord, Signal};
use crate::sync::{RecommendationEngine, SyncClient, SyncError, SyncEvent};
use crate::user::{NewProfile, ProfileStore, Provisioned, UserProfile};

/// Bearer token accepted by [`state`].
pub const TOKEN: &str = "token-ada";
pub const SUBJECT: &str = "uid-ada";

/// Fakes wired into an [`AppState`].
pub struct Fakes {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<RecordingEngine>,
    pub admin: Arc<RecordingIdentityAdmin>,
}

impl Fakes {
    /// Profile of [`SUBJECT`]. Panics when not provisioned.
    pub fn user(&self) -> UserProfile {
        self.store
            .state
            .lock()
            .unwrap()
            .profiles
            .get(SUBJECT)
            .cloned()
            .expect("profile not provisioned")
    }
}

fn state_from(engine: RecordingEngine) -> (AppState, Fakes) {
    let store = Arc::new(MemoryStore::default());
    let engine = Arc::new(engine);
    let admin = Arc::new(RecordingIdentityAdmin::default());
    let resolver = StaticResolver::default().with(
        TOKEN,
        VerifiedIdentity {
            subject_id: SUBJECT.into(),
            claimed_name: None,
            claimed_email: Some("ada@example.com".into()),
        },
    );

    let gateway = Gateway::new(
        Arc::new(resolver),
        store.clone(),
        store.clone(),
        Arc::new(MemoryCatalog::with_items((0..30).map(|i| format!("P{i}")))),
        admin.clone(),
        SyncClient::new(engine.clone(), Duration::from_millis(200)),
    );

    let state = AppState {
        config: Arc::new(Configuration::default()),
        gateway: Arc::new(gateway),
        metrics: None,
    };

    (state, Fakes { store, engine, admin })
}

/// State backed by in-memory fakes, with catalog items `P0` to `P29`.
pub fn state() -> (AppState, Fakes) {
    state_from(RecordingEngine::default())
}

/// Same as [`state`] with an unreachable recommendation engine.
pub fn state_with_failing_engine() -> (AppState, Fakes) {
    state_from(RecordingEngine::failing())
}

/// Shared, ordered log of side effects across fakes.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

#[derive(Default)]
struct State {
    next_id: i64,
    profiles: HashMap<String, UserProfile>,
    preferences: Vec<PreferenceRecord>,
    liked: Vec<(i64, String)>,
    purchased: Vec<(i64, String)>,
}

/// Profile store and ledger sharing one lock, so deletes cascade.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_deletes: AtomicBool,
    journal: Option<Journal>,
}

impl MemoryStore {
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn profile_count(&self) -> usize {
        self.state.lock().unwrap().profiles.len()
    }

    pub fn preference_count(&self, user: &UserProfile) -> usize {
        let state = self.state.lock().unwrap();
        state.preferences.iter().filter(|p| p.user_id == user.id).count()
    }

    pub fn preference_value(&self, user: &UserProfile, item_id: &str) -> Option<i32> {
        let state = self.state.lock().unwrap();
        state
            .preferences
            .iter()
            .find(|p| p.user_id == user.id && p.item_id == item_id)
            .map(|p| p.preference)
    }

    pub fn liked(&self, user: &UserProfile) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .liked
            .iter()
            .filter(|(id, _)| *id == user.id)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

impl State {
    fn insert(&mut self, profile: &NewProfile) -> UserProfile {
        self.next_id += 1;
        let now = Utc::now();
        let user = UserProfile {
            id: self.next_id,
            subject_id: profile.subject_id.clone(),
            username: profile.username.clone(),
            email: profile.email.clone(),
            created_at: now,
            updated_at: now,
        };
        self.profiles.insert(user.subject_id.clone(), user.clone());
        user
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_or_create(&self, profile: &NewProfile) -> Result<UserProfile> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.profiles.get(&profile.subject_id) {
            return Ok(user.clone());
        }
        Ok(state.insert(profile))
    }

    async fn create_or_update(&self, profile: &NewProfile) -> Result<Provisioned> {
        let mut state = self.state.lock().unwrap();
        match state.profiles.get_mut(&profile.subject_id) {
            Some(user) => {
                if let Some(name) = &profile.explicit_name {
                    user.username = name.clone();
                }
                if !profile.email.is_empty() {
                    user.email = profile.email.clone();
                }
                user.updated_at = Utc::now();
                Ok(Provisioned {
                    profile: user.clone(),
                    created: false,
                })
            },
            None => Ok(Provisioned {
                profile: state.insert(profile),
                created: true,
            }),
        }
    }

    async fn find(&self, subject_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.state.lock().unwrap().profiles.get(subject_id).cloned())
    }

    async fn delete(&self, profile: &UserProfile) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.push("store:delete".into());
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ServerError::Internal {
                details: "store unavailable".into(),
                source: None,
            });
        }

        let mut state = self.state.lock().unwrap();
        state.profiles.remove(&profile.subject_id);
        state.preferences.retain(|p| p.user_id != profile.id);
        state.liked.retain(|(id, _)| *id != profile.id);
        state.purchased.retain(|(id, _)| *id != profile.id);
        Ok(())
    }
}

#[async_trait]
impl PreferenceLedger for MemoryStore {
    async fn set_preference(&self, user: &UserProfile, signal: &Signal) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        match state
            .preferences
            .iter_mut()
            .find(|p| p.user_id == user.id && p.item_id == signal.item_id)
        {
            Some(record) => {
                record.preference = signal.value;
                record.updated_at = now;
            },
            None => state.preferences.push(PreferenceRecord {
                user_id: user.id,
                item_id: signal.item_id.clone(),
                preference: signal.value,
                updated_at: now,
            }),
        }

        let entry = (user.id, signal.item_id.clone());
        if signal.liked && !state.liked.contains(&entry) {
            state.liked.push(entry);
        }
        Ok(())
    }

    async fn preference(&self, user: &UserProfile, item_id: &str) -> Result<Option<PreferenceRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .preferences
            .iter()
            .find(|p| p.user_id == user.id && p.item_id == item_id)
            .cloned())
    }

    async fn liked_items(&self, user: &UserProfile, page: PageRequest) -> Result<LikedPage> {
        let liked = self.liked(user);
        Ok(LikedPage {
            total_count: liked.len() as u64,
            item_ids: liked
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.page_size as usize)
                .collect(),
        })
    }

    async fn purchased_items(&self, user: &UserProfile) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .purchased
            .iter()
            .filter(|(id, _)| *id == user.id)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn mark_purchased(&self, user: &UserProfile, item_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for item_id in item_ids {
            let entry = (user.id, item_id.clone());
            if !state.purchased.contains(&entry) {
                state.purchased.push(entry);
            }
        }
        Ok(())
    }
}

/// Catalog holding a fixed set of items.
#[derive(Default)]
pub struct MemoryCatalog {
    items: HashMap<String, Item>,
    failing_fetch: bool,
}

impl MemoryCatalog {
    pub fn with_items<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                let item = Item {
                    title: format!("Item {id}"),
                    id: id.clone(),
                    brand: Some("Acme".into()),
                    retail_price: Some(42.0),
                };
                (id, item)
            })
            .collect();

        Self {
            items,
            failing_fetch: false,
        }
    }

    pub fn failing_fetch(mut self) -> Self {
        self.failing_fetch = true;
        self
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn exists(&self, item_id: &str) -> Result<bool> {
        Ok(self.items.contains_key(item_id))
    }

    async fn missing(&self, item_ids: &[String]) -> Result<Vec<String>> {
        Ok(item_ids
            .iter()
            .filter(|id| !self.items.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn fetch(&self, item_ids: &[String]) -> Result<Vec<Item>> {
        if self.failing_fetch {
            return Err(ServerError::Internal {
                details: "catalog unavailable".into(),
                source: None,
            });
        }
        Ok(item_ids
            .iter()
            .filter_map(|id| self.items.get(id).cloned())
            .collect())
    }
}

/// Resolver accepting a fixed set of tokens.
#[derive(Default)]
pub struct StaticResolver {
    tokens: HashMap<String, VerifiedIdentity>,
    delay: Option<Duration>,
}

impl StaticResolver {
    pub fn with(mut self, token: &str, identity: VerifiedIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CredentialResolver for StaticResolver {
    async fn resolve(&self, token: &str) -> std::result::Result<VerifiedIdentity, IdentityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or(IdentityError::UnknownKey(None))
    }
}

/// Engine recording every event it receives.
#[derive(Default)]
pub struct RecordingEngine {
    events: Mutex<Vec<SyncEvent>>,
    failing: bool,
    delay: Option<Duration>,
    journal: Option<Journal>,
}

impl RecordingEngine {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecommendationEngine for RecordingEngine {
    async fn send(&self, event: &SyncEvent) -> std::result::Result<(), SyncError> {
        self.events.lock().unwrap().push(event.clone());
        if let Some(journal) = &self.journal {
            journal.push(format!("engine:{}", event.kind()));
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(SyncError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }
}

/// Identity provider admin recording deletions.
#[derive(Default)]
pub struct RecordingIdentityAdmin {
    deleted: Mutex<Vec<String>>,
    failing: bool,
    journal: Option<Journal>,
}

impl RecordingIdentityAdmin {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityAdmin for RecordingIdentityAdmin {
    async fn delete_subject(&self, subject_id: &str) -> std::result::Result<(), IdentityError> {
        if let Some(journal) = &self.journal {
            journal.push("admin:delete".into());
        }
        if self.failing {
            return Err(IdentityError::Status {
                status: 500,
                body: "unavailable".into(),
            });
        }
        self.deleted.lock().unwrap().push(subject_id.to_owned());
        Ok(())
    }
}
