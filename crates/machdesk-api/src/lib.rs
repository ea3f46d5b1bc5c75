// machdesk-api: Async HTTP clients for the identity provider and resource endpoints

pub mod error;
pub mod oidc;
pub mod resource;
pub mod transport;

pub use error::Error;
pub use oidc::{CodeChallengeMethod, OidcClient, TokenSet};
pub use resource::{Page, ResourceClient};
pub use transport::{TlsMode, TransportConfig};
