//! Session gate, navigation authorizer, and reactive resource store
//! between `machdesk-api` and hosts (the CLI).
//!
//! - **[`Client`]**: Facade owning the three components below.
//!   [`start()`](Client::start) initializes the session and spawns the
//!   optional periodic fetch; [`Client::oneshot()`](Client::oneshot) runs a
//!   single request-response cycle for CLI invocations.
//!
//! - **[`SessionGate`]**: Authentication lifecycle against an
//!   [`IdentityProvider`] (shipped: [`OidcProvider`]). Publishes the
//!   [`Session`] through a `watch` channel; other components hold a
//!   read-only [`SessionHandle`].
//!
//! - **[`Router`]**: Applies the pure [`authorize`] decision to every
//!   navigation over a static [`RouteTable`], following redirects.
//!
//! - **[`ResourceStore`]**: Ordered reactive collection built on
//!   `tokio::sync::watch`, populated by paginated fetches. Subscriptions are
//!   vended as [`EntityStream<T>`].

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod navigation;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::Client;
pub use config::{ClientConfig, ProviderConfig, ResourceEndpoint, TlsVerification};
pub use error::CoreError;
pub use model::{EntityId, Machine, MachinePatch, Resource};
pub use navigation::{
    NavigationDecision, NavigationOutcome, RedirectReason, Resolution, ResolvedRoute,
    RouteDescriptor, RouteTable, Router, authorize,
};
pub use session::{
    Credential, GateState, Grant, IdentityClaims, IdentityProvider, InitMode, InitOptions,
    OidcProvider, Session, SessionGate, SessionHandle,
};
pub use store::{
    FetchPolicy, FetchSummary, MachineStore, PageParams, PatchMissPolicy, PatchOutcome,
    ResourceStore,
};
pub use stream::EntityStream;
