//! Robots.txt handling module
//!
//! This module provides the politeness gate: fetching, parsing, and caching
//! robots.txt files, and answering whether a URL may be crawled.

mod cache;
mod gate;
mod parser;

pub use cache::RobotsEntry;
pub use gate::RobotsGate;
pub use parser::{product_token, RobotsRules};
