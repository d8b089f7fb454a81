//! Domain layer - Pure business logic.

// Remote search hits and their reconciliation with local records
pub mod search;

// Remote task status and its classification
pub mod task;

// Video records and lifecycle transitions
pub mod video;
