//! Blogging backend: users, posts and per-user tags over a JSON HTTP API
//!
//! The router is built by [`routes::create_router`] from an [`state::AppState`]
//! that carries the store, the token service and media storage. Access rules
//! live in [`policy`], listing filters in [`filters`] and the tag
//! find-or-create logic in [`reconcile`].

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod filters;
pub mod jwt;
pub mod media;
pub mod models;
pub mod password;
pub mod policy;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use routes::create_router;
pub use state::AppState;
