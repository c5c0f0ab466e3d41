//! Authentication module for user registration, login and access control.
//!
//! This module provides the public interface for authentication-related
//! functionality: request/response models, handlers, routes and the bearer
//! token middleware that guards protected endpoints.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
