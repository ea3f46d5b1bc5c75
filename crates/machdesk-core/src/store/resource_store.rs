// ── Resource store ──
//
// Process-wide owner of one resource collection. The only writers are
// `replace_all`, `patch_one`, and `fetch_all`; every write lands as one
// snapshot assignment in the underlying `EntityCollection`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use machdesk_api::{ResourceClient, TransportConfig};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::collection::EntityCollection;
use super::{FetchPolicy, FetchSummary, PageParams, PatchMissPolicy, PatchOutcome};
use crate::config::ResourceEndpoint;
use crate::error::CoreError;
use crate::model::{EntityId, Resource};
use crate::session::SessionHandle;
use crate::stream::EntityStream;

/// Reactive container for one resource kind, synchronized from a remote
/// paginated endpoint.
pub struct ResourceStore<T: Resource> {
    collection: EntityCollection<T>,
    client: ResourceClient,
    path: String,
    collection_field: String,
    session: SessionHandle,
    patch_miss: PatchMissPolicy,
    fetch_policy: FetchPolicy,
    /// Ticket of the most recently issued fetch.
    issued: AtomicU64,
    /// Serializes the supersede check with the apply.
    apply_guard: Mutex<()>,
    last_fetch: watch::Sender<Option<DateTime<Utc>>>,
}

impl<T: Resource> ResourceStore<T> {
    pub fn new(client: ResourceClient, endpoint: &ResourceEndpoint, session: SessionHandle) -> Self {
        let (last_fetch, _) = watch::channel(None);
        Self {
            collection: EntityCollection::new(),
            client,
            path: endpoint.path.clone(),
            collection_field: endpoint.collection_field.clone(),
            session,
            patch_miss: PatchMissPolicy::default(),
            fetch_policy: FetchPolicy::default(),
            issued: AtomicU64::new(0),
            apply_guard: Mutex::new(()),
            last_fetch,
        }
    }

    /// Build the HTTP client for `endpoint` and wrap it in a store.
    pub fn connect(
        endpoint: &ResourceEndpoint,
        transport: &TransportConfig,
        session: SessionHandle,
    ) -> Result<Self, CoreError> {
        let client = ResourceClient::new(endpoint.base_url.clone(), transport)?;
        Ok(Self::new(client, endpoint, session))
    }

    #[must_use]
    pub fn with_patch_miss_policy(mut self, policy: PatchMissPolicy) -> Self {
        self.patch_miss = policy;
        self
    }

    #[must_use]
    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn patch_miss_policy(&self) -> PatchMissPolicy {
        self.patch_miss
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        self.fetch_policy
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Replace the whole collection. Returns the resulting record count.
    pub fn replace_all(&self, records: Vec<T>) -> usize {
        let count = self.collection.replace(records);
        debug!(kind = T::KIND, count, "collection replaced");
        count
    }

    /// Merge a partial update into the record it targets.
    pub fn patch_one(&self, patch: T::Patch) -> Result<PatchOutcome, CoreError> {
        let id = T::patch_target(&patch).clone();
        let policy = self.patch_miss;
        let mut outcome = PatchOutcome::Ignored;

        self.collection.upsert_with(&id, |existing| match existing {
            Some(record) => {
                record.apply_patch(patch);
                outcome = PatchOutcome::Merged;
                None
            }
            None if policy == PatchMissPolicy::Insert => {
                outcome = PatchOutcome::Inserted;
                Some(T::from_patch(patch))
            }
            None => None,
        });

        match outcome {
            PatchOutcome::Ignored if policy == PatchMissPolicy::Reject => {
                Err(CoreError::PatchTargetNotFound { id })
            }
            PatchOutcome::Ignored => {
                debug!(kind = T::KIND, %id, "patch target not found, ignored");
                Ok(outcome)
            }
            _ => Ok(outcome),
        }
    }

    /// Fetch one page from the endpoint and replace the collection with it.
    ///
    /// Exactly one request, no retry. On failure the collection is left
    /// unchanged.
    pub async fn fetch_all(&self, params: PageParams) -> Result<FetchSummary, CoreError> {
        let params = params.validate()?;
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let bearer = self.session.bearer_token();

        debug!(
            kind = T::KIND,
            page = params.page,
            per_page = params.per_page,
            authenticated = bearer.is_some(),
            ticket,
            "fetching collection"
        );

        let page = match self
            .client
            .list_page::<T>(
                &self.path,
                &self.collection_field,
                params.page,
                params.per_page,
                bearer.as_ref(),
            )
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!(kind = T::KIND, error = %e, "fetch failed, collection unchanged");
                return Err(CoreError::resource_fetch(&e));
            }
        };

        let guard = self.apply_guard.lock().unwrap_or_else(PoisonError::into_inner);
        if self.fetch_policy == FetchPolicy::Supersede
            && self.issued.load(Ordering::SeqCst) != ticket
        {
            debug!(kind = T::KIND, ticket, "discarding superseded fetch");
            return Ok(FetchSummary {
                count: page.items.len(),
                total: page.total,
                page: page.page.unwrap_or(params.page),
                pages: page.pages,
                superseded: true,
            });
        }

        let count = self.collection.replace(page.items);
        drop(guard);
        self.last_fetch.send_replace(Some(Utc::now()));
        info!(kind = T::KIND, count, "collection fetched");

        Ok(FetchSummary {
            count,
            total: page.total,
            page: page.page.unwrap_or(params.page),
            pages: page.pages,
            superseded: false,
        })
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.collection.snapshot()
    }

    pub fn get(&self, id: &EntityId) -> Option<Arc<T>> {
        self.collection.get_by_id(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.collection.contains(id)
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.len() == 0
    }

    /// Mutation counter; bumps once per published change.
    pub fn version(&self) -> u64 {
        self.collection.version()
    }

    pub fn subscribe(&self) -> EntityStream<T> {
        EntityStream::new(self.collection.subscribe())
    }

    /// When the collection was last replaced by a successful fetch.
    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        *self.last_fetch.borrow()
    }
}
