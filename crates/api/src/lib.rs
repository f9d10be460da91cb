//! Boutique API library.
//!
//! The REST backend as a library, so the router can be exercised in-process
//! by the `routes` tests and the binary stays a thin startup shim. The
//! `boutique-integration-tests` crate drives a running server over HTTP.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;
