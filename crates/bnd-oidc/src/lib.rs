//! OpenID Connect identity acquisition
//!
//! Obtains short-lived identity tokens for signing: from a caller-supplied
//! token, from ambient CI credentials, or through an interactive browser or
//! device code OAuth flow.

pub mod acquirer;
pub mod ambient;
pub mod error;
pub mod oauth;
pub mod templates;
pub mod token;

pub use acquirer::{
    DeviceFlow, IdentityAcquirer, IdentityProvider, InteractiveFlow, OidcConfig, TokenFlow,
    DEFAULT_CLIENT_ID, DEFAULT_OIDC_ISSUER, DEFAULT_REDIRECT_URL,
};
pub use ambient::{AmbientProvider, AmbientRegistry, GitHubActions};
pub use error::{Error, Result};
pub use oauth::{randomize_port, DeviceCodeResponse, OAuthClient, OAuthConfig};
pub use templates::{DefaultTemplates, HtmlTemplates};
pub use token::{IdentityToken, TokenClaims};
