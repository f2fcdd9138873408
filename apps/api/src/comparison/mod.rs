//! Career comparison — the resilient generation pipeline.
//!
//! `orchestrator` owns the request lifecycle; `fallback` is the
//! deterministic no-network synthesis; `models` is the shared data model;
//! `handlers` is the thin Axum wiring on top.

pub mod fallback;
pub mod handlers;
pub mod models;
pub mod orchestrator;
