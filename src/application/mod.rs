//! Application layer - services built on the ports.

pub mod events;
pub mod indexing;
pub mod poller;
pub mod search;
