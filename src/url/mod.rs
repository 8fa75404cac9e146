//! URL handling module for Seine
//!
//! This module provides URL normalization (the frontier key), crawlability
//! checks, and the authority/origin helpers used for domain scoping and the
//! robots.txt cache.

mod domain;
mod normalize;
mod validate;

pub use domain::{authority, origin, scope_of};
pub use normalize::normalize;
pub use validate::is_valid;
