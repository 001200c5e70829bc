//! Shared fixtures: collaborator doubles and an on-disk site.

// Each test binary uses a different subset.
#![allow(dead_code)]

pub mod fixture;
pub mod mocks;
