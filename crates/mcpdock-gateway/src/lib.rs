//! McpDock Gateway
//!
//! The OAuth connection engine for remote MCP tool servers:
//! - Authorization server metadata discovery (RFC 8414 / OIDC discovery)
//! - Dynamic Client Registration (RFC 7591)
//! - PKCE-protected authorization code flow (RFC 7636)
//! - Tamper-evident state tokens carried across the browser redirect
//! - Code-for-token exchange and token persistence
//! - Post-authorization tool introspection over two wire transports
//! - Opaque API key issuance for internal proxy access

pub mod apikey;
pub mod error;
pub mod http;
pub mod introspect;
pub mod oauth;
pub mod services;

pub use apikey::ApiKeyIssuer;
pub use error::ConnectError;
pub use http::{callback_router, AuthenticatedUser};
pub use introspect::{IntrospectionReport, ToolDescriptor, ToolIntrospector, ToolListingClient};
pub use oauth::{
    build_authorization_url, AuthServerMetadata, AuthorizationAttempt, CallbackParams,
    ClientRegistrationRequest, ClientRegistrationResponse, DynamicClientRegistrar,
    MetadataDiscoverer, PkceMaterial, StateTokenCodec, TokenExchanger, TokenResponse,
};
pub use services::{AuthorizationRedirect, CallbackOutcome, ConnectionService};
