//! Adapters for the state store, counter store and HTTP surface.

pub mod http;
pub mod memory;
pub mod sqlite;
