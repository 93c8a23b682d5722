//! HTTP surface for the sizing engine.
//!
//! Thin axum layer: one SSE route streaming usage events, a cache refresh
//! hook, and a health probe. Everything interesting happens in [`crate::scan`].

pub mod routes;

pub use routes::serve;
