//! # pixie-core
//!
//! Lifecycle wrapper for a network-boot DHCPv6 server: bind, derive the
//! server DUID, run the engine's serving loop, stop on request.
#![warn(
    missing_debug_implementations,
    missing_docs,
    missing_copy_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
pub use anyhow;
pub use async_trait::async_trait;
pub use dhcp6;
pub use tokio;
pub use tracing;

pub use crate::server::{Server, ShutdownHandle};

pub mod config;
pub mod duid;
pub mod engine;
pub mod logger;
pub mod server;
