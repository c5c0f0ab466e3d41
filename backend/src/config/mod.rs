//! Central module for application-wide configuration settings.
//!
//! This module handles loading configuration parameters such as the database
//! URL, server port, token signing secret and the request-limiting knobs.
//! It is read once at startup and handed to collaborators at construction.

use anyhow::{Context, Result, ensure};
use std::env;
use std::str::FromStr;

/// Shortest HMAC secret accepted for token signing.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Longest token lifetime accepted (one year).
pub const MAX_JWT_EXPIRES_IN_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Largest clock-skew allowance accepted on expiry checks.
pub const MAX_JWT_LEEWAY_SECONDS: u64 = 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expires_in_seconds: u64,
    pub jwt_leeway_seconds: u64,
    pub server_port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_seconds: u64,
    pub max_in_flight_requests: usize,
    pub throttle_backlog: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL not set")?;

        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET not set")?;
        ensure!(
            jwt_secret.len() >= MIN_JWT_SECRET_BYTES,
            "JWT_SECRET must be at least {} bytes",
            MIN_JWT_SECRET_BYTES
        );

        let jwt_expires_in_seconds = parse_or(&lookup, "JWT_EXPIRES_IN_SECONDS", 86400)?;
        ensure!(
            (1..=MAX_JWT_EXPIRES_IN_SECONDS).contains(&jwt_expires_in_seconds),
            "JWT_EXPIRES_IN_SECONDS must be between 1 and {}",
            MAX_JWT_EXPIRES_IN_SECONDS
        );

        let jwt_leeway_seconds = parse_or(&lookup, "JWT_LEEWAY_SECONDS", 0)?;
        ensure!(
            jwt_leeway_seconds <= MAX_JWT_LEEWAY_SECONDS,
            "JWT_LEEWAY_SECONDS must be at most {}",
            MAX_JWT_LEEWAY_SECONDS
        );

        Ok(Config {
            database_url,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            acquire_timeout_seconds: parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECONDS", 3)?,
            jwt_secret,
            jwt_expires_in_seconds,
            jwt_leeway_seconds,
            server_port: parse_or(&lookup, "SERVER_PORT", 4000)?,
            rate_limit_per_minute: parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 100)?,
            request_timeout_seconds: parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 60)?,
            max_in_flight_requests: parse_or(&lookup, "MAX_IN_FLIGHT_REQUESTS", 15)?,
            throttle_backlog: parse_or(&lookup, "THROTTLE_BACKLOG", 50)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
