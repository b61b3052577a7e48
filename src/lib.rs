//! Recipes API: HTTP CRUD over recipes with a cached listing and token auth
//!
//! - Storage: Sled document trees for recipes and user credentials
//! - Cache: listing snapshot in-process or in Redis, invalidated on every write
//! - Auth: bcrypt credentials, HS256 bearer tokens
//!
//! This lib exposes the components; `main.rs` wires them together.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod recipes;
// REST API module: Axum router, auth and request-id middleware
pub mod rest;
pub mod storage;
pub mod telemetry;
