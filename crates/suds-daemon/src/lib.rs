//! suds-daemon: HTTP surface over the laundry store.
//!
//! `main.rs` wires config, store selection, and middleware; `routes.rs`
//! holds the router and handlers; `auth.rs` derives the acting principal;
//! `state.rs` owns the shared state types.

pub mod api_types;
pub mod auth;
pub mod routes;
pub mod state;
