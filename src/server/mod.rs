//! HTTP server exposing the persona pipeline.
//!
//! A thin adapter: request parsing, persona lookup errors mapped to 404,
//! and recording of each exchange. All conversational behavior lives in
//! [`crate::chat`].
//!
//! # Endpoints
//!
//! - `GET /health`: Liveness probe
//! - `GET /personas`: Persona catalog
//! - `POST /personas/conversation`: Reply to a user message

pub mod routes;

pub use routes::{app_router, AppState};
