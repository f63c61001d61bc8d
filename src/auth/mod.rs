//! OIDC device-authorization and refresh-token flows.

pub mod authenticator;
pub mod device_code;
pub mod error;
pub mod oidc;
pub mod token;

pub use authenticator::{Authenticator, OidcAuthenticator};
pub use device_code::{DeviceCodePoll, DeviceCodeSession};
pub use error::AuthError;
pub use oidc::ProviderMetadata;
pub use token::{AuthData, AuthResult, SharedAuthData, UserInfo};
