//! AI content job service
//!
//! Tracks asynchronous content-generation jobs through their lifecycle and
//! memoizes generated responses, both on top of a pluggable document store
//! (PostgreSQL JSONB or in-memory).

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
