//! Persistence layer: data access for the entities the services work with.

pub mod user_repository;
