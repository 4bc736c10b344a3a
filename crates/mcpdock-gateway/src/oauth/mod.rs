//! OAuth 2.1 client engine
//!
//! Discovers provider metadata, registers a client dynamically (RFC 7591),
//! runs the PKCE authorization-code flow, and carries the in-flight flow
//! context through the browser redirect inside a sealed state token.

mod authorize;
mod callback;
mod discovery;
mod pkce;
mod registrar;
mod state_token;

pub use authorize::build_authorization_url;
pub use callback::{CallbackParams, TokenExchanger, TokenResponse};
pub use discovery::{AuthServerMetadata, MetadataDiscoverer};
pub use pkce::PkceMaterial;
pub use registrar::{
    ClientRegistrationRequest, ClientRegistrationResponse, DynamicClientRegistrar,
};
pub use state_token::{AuthorizationAttempt, StateTokenCodec};
