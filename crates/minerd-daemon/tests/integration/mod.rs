//! Integration tests for minerd-daemon.
//!
//! These tests run the whole application on a real listener:
//! - Mining info polling from a mock pool
//! - Shutdown and restart requested through the API

pub mod common;
