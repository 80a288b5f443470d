//! File-backed configuration and replay traces.

pub mod config;
pub mod trace_store;
