//! Reelindex - Video indexing and search service
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (video records, task status, search hits)
//! - ports/: Trait definitions (indexing API, status lookup, search, record store)
//! - adapters/: Concrete implementations (Twelve Labs, Redis, in-memory, HTTP)
//! - application/: Services (poller, indexing, search, events)
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::poller::{PollHandle, PollState, Poller, TerminalReason};
pub use config::{Config, PollConfig};
pub use domain::search::resolve_record;
