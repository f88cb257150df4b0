//! rollwatch-cache — persisting rollout verdicts.
//!
//! The build pipeline reads a rollout's verdict from Redis under
//! `{build_id}-{service}`. This crate speaks just enough RESP over a
//! tokio `TcpStream` to `SET`, `EXPIRE` and `GET` that key.
//!
//! # Components
//!
//! - **`resp`** — command encoding and scalar reply parsing
//! - **`client`** — a single Redis connection, opened eagerly or on first use
//! - **`backend`** — the [`CacheBackend`] seam, with an in-memory backend
//! - **`store`** — [`VerdictStore`], key layout and expiry

pub mod backend;
pub mod client;
pub mod error;
pub mod resp;
pub mod store;

pub use backend::{CacheBackend, MemoryBackend};
pub use client::{LazyClient, RedisClient};
pub use error::{CacheError, CacheResult};
pub use store::{cache_key, VerdictStore, VERDICT_TTL};
