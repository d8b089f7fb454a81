//! Ports - Trait definitions for external collaborators.

pub mod indexing;
pub mod repository;
pub mod search;
