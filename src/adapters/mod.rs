//! Concrete adapters implementing the domain's ports: SQLite persistence,
//! a Redis-backed work queue, the upstream image-generation HTTP API, and
//! notification delivery.

pub mod image_api;
pub mod notify;
pub mod redis;
pub mod sqlite;
