//! Twelve Labs adapter: remote indexing, task status and search.

mod client;
mod types;

pub use client::TwelveLabsClient;
