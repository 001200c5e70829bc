//! Integration tests for minerd-web.
//!
//! These tests drive the full router:
//! - Login, sessions and secured pages
//! - Privileged actions and their collaborator calls
//! - The push channel over a real listener

pub mod common;
