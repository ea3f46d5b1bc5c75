// ── Client facade ──
//
// Owns the session gate, the router, and the machine store, and runs the
// bootstrap sequence: initialize the gate, then let the host navigate and
// fetch. An optional background task re-fetches the collection on an
// interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::model::Machine;
use crate::navigation::{NavigationOutcome, RouteTable, Router};
use crate::session::{GateState, IdentityProvider, OidcProvider, SessionGate, SessionHandle};
use crate::store::{FetchSummary, MachineStore, PageParams};
use crate::stream::EntityStream;

// ── Client ───────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Does nothing on construction;
/// call [`start()`](Self::start) to initialize the session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    gate: SessionGate,
    router: Router,
    store: Arc<MachineStore>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
    /// Create a client that talks to the configured OIDC realm.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let provider = OidcProvider::from_config(&config.provider, &config.transport())?;
        Self::with_provider(config, Arc::new(provider))
    }

    /// Create a client around any identity provider.
    pub fn with_provider(
        config: ClientConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, CoreError> {
        Self::with_routes(config, provider, RouteTable::default())
    }

    /// Create a client with a custom route table.
    pub fn with_routes(
        config: ClientConfig,
        provider: Arc<dyn IdentityProvider>,
        routes: RouteTable,
    ) -> Result<Self, CoreError> {
        let gate = SessionGate::new(provider).with_init_timeout(config.init_timeout);
        let router = Router::new(Arc::new(routes), gate.handle());
        let store = MachineStore::connect(&config.resources, &config.transport(), gate.handle())?
            .with_patch_miss_policy(config.patch_miss)
            .with_fetch_policy(config.fetch_policy);

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                gate,
                router,
                store: Arc::new(store),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn gate(&self) -> &SessionGate {
        &self.inner.gate
    }

    pub fn session(&self) -> SessionHandle {
        self.inner.gate.handle()
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    pub fn store(&self) -> &Arc<MachineStore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Initialize the session and spawn background tasks.
    ///
    /// Resolves to whether the user is authenticated. Hosts must not show
    /// protected views if this fails.
    pub async fn start(&self) -> Result<bool, CoreError> {
        let authenticated = self.inner.gate.initialize(&self.inner.config.init).await?;

        let interval_secs = self.inner.config.refresh_interval_secs;
        if interval_secs > 0 {
            let cancel = self.inner.cancel.child_token();
            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(refresh_task(self.clone(), interval_secs, cancel)));
            debug!(interval_secs, "periodic fetch scheduled");
        }

        info!(authenticated, "client started");
        Ok(authenticated)
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("client shut down");
    }

    /// One-shot: start, run closure, shut down.
    ///
    /// Periodic fetching is disabled since only a single
    /// request-response cycle is needed.
    pub async fn oneshot<F, Fut, T>(config: ClientConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Client) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.refresh_interval_secs = 0;

        let client = Client::new(cfg)?;
        client.start().await?;
        let result = f(client.clone()).await;
        client.shutdown().await;
        result
    }

    // ── Session ──────────────────────────────────────────────────

    pub async fn login(&self) -> Result<(), CoreError> {
        self.inner.gate.login().await?;
        self.revalidate_route();
        Ok(())
    }

    /// End the session and re-check the current route against it.
    pub async fn logout(&self) {
        self.inner.gate.logout().await;
        self.revalidate_route();
    }

    // ── Navigation ───────────────────────────────────────────────

    pub fn navigate(&self, path: &str) -> Result<NavigationOutcome, CoreError> {
        self.inner.router.navigate(path)
    }

    // ── Resources ────────────────────────────────────────────────

    /// Fetch one page of machines into the store.
    ///
    /// The credential is refreshed first if it is about to expire. A 401
    /// from the endpoint triggers one credential refresh for the next
    /// call; the failed fetch itself is not retried.
    pub async fn fetch_machines(&self, params: PageParams) -> Result<FetchSummary, CoreError> {
        let gate = &self.inner.gate;
        if let Err(e) = gate.ensure_fresh(self.inner.config.token_min_validity).await {
            warn!(error = %e, "credential refresh before fetch failed");
        }

        let result = self.inner.store.fetch_all(params).await;
        if let Err(e) = &result {
            if e.is_unauthorized() && gate.state() == GateState::Authenticated {
                info!("resource endpoint rejected the credential, refreshing");
                if let Err(e) = gate.refresh().await {
                    warn!(error = %e, "credential refresh after 401 failed");
                }
                self.revalidate_route();
            }
        }
        result
    }

    /// Subscribe to the machine collection.
    pub fn machines(&self) -> EntityStream<Machine> {
        self.inner.store.subscribe()
    }

    pub fn machines_snapshot(&self) -> Arc<Vec<Arc<Machine>>> {
        self.inner.store.snapshot()
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Re-run authorization for the current route after a session change.
    fn revalidate_route(&self) {
        let Some(current) = self.inner.router.current_route() else {
            return;
        };
        if let Err(e) = self.inner.router.navigate(&current.path) {
            debug!(error = %e, path = %current.path, "route revalidation failed");
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically re-fetch the configured page until cancelled.
async fn refresh_task(client: Client, interval_secs: u64, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let params = client.inner.config.page;
                if let Err(e) = client.fetch_machines(params).await {
                    warn!(error = %e, "periodic fetch failed");
                }
            }
        }
    }
}
