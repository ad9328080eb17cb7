//! Read-only client for the WHOOP v2 developer API
//!
//! Callers obtain a bearer token from the session and pass it to each call;
//! the client itself holds no credentials. Collection endpoints accept a
//! `WindowParams` (time window, page size, continuation token) and
//! `collect_all` walks every page of a collection.

pub mod client;
pub mod error;
pub mod params;

pub use client::{WhoopClient, endpoints};
pub use error::{Error, Result};
pub use params::WindowParams;
