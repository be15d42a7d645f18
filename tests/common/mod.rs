//! Common test utilities and fixtures for uiver integration tests
//!
//! This module provides:
//! - `TestRepo` builder for creating watched roots with version files
//! - WebSocket helpers for talking to a hub bound on an ephemeral port

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod test_repo;
pub mod ws;

pub use test_repo::TestRepo;
pub use ws::*;
