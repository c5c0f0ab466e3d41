//! Central module for organizing the application's API endpoints.
//!
//! Holds the user profile routes and the shared response/error plumbing.
//! Authentication routes live in `crate::auth`.

pub mod common;
pub mod user;
