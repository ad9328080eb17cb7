//! WHOOP OAuth building blocks
//!
//! Leaf components of the token lifecycle, each usable and testable on its own:
//!
//! - `state::StateTracker` issues and consumes one-time CSRF state nonces
//! - `authorize::build_authorization_url` composes the browser redirect URL
//! - `token::HttpExchanger` trades an authorization code or refresh token for a
//!   `TokenRecord` at the provider's token endpoint
//! - `store::FileTokenStore` persists the single `TokenRecord` atomically
//!
//! The exchanger and the store sit behind the `TokenExchanger` and `TokenStore`
//! traits so the session state machine can run against in-memory fakes.

pub mod authorize;
pub mod constants;
pub mod error;
pub mod settings;
pub mod state;
pub mod store;
pub mod token;

pub use authorize::build_authorization_url;
pub use constants::*;
pub use error::{Error, Result};
pub use settings::{ClientCredentials, OAuthSettings};
pub use state::{StateTracker, generate_nonce};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{HttpExchanger, TokenExchanger, TokenRecord, compute_expires_at};
