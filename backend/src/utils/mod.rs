//! Collection of stateless security primitives shared across the backend.

pub mod jwt;
pub mod password;
