//! OAuth session orchestration for a single WHOOP user
//!
//! Ties the leaf components from `whoop-auth` into one state machine:
//!
//! 1. `Session::begin_authorization` issues a state nonce and returns the authorization URL
//! 2. `Session::handle_callback` checks the nonce, exchanges the code, persists the record
//! 3. `Session::get_valid_token` returns the stored access token, refreshing it lazily once expired
//! 4. A refresh the provider rejects clears the record; the user must authorize again
//! 5. `Session::clear` forgets the record
//!
//! Callback handling and every refresh run under one lock scoped to the token,
//! so duplicate callbacks or concurrent refreshes cannot interleave their writes.

pub mod error;
pub mod session;

pub use error::{Error, Result};
pub use session::{CallbackParams, Session, SessionStatus};
