//! # EsoxSolutions.ResourcePool
//!
//! Bounded async pool for expensive, externally managed resources such as
//! database connections or sockets.
//!
//! ## Features
//!
//! - Capacity bound covering resources still being created
//! - Reuse of the most recently released idle resource
//! - Strict FIFO queue for callers when the pool is exhausted
//! - Automatic release via RAII (Drop trait)
//! - Cancellation-safe acquisition and optional acquisition timeout
//! - Idle eviction with a single sweep timer and a protected minimum
//! - Usage limits that retire resources after N checkouts
//! - Graceful and forced shutdown
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use esox_resourcepool::{ManageResource, PoolConfiguration, ResourcePool};
//!
//! struct Sockets;
//!
//! #[async_trait]
//! impl ManageResource for Sockets {
//!     type Resource = u16;
//!     type Error = std::io::Error;
//!
//!     async fn create(&self) -> Result<u16, std::io::Error> {
//!         Ok(8080)
//!     }
//!
//!     fn dispose(&self, _port: u16) {}
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = ResourcePool::new(Sockets, PoolConfiguration::default()).unwrap();
//! {
//!     let socket = pool.get().await.unwrap();
//!     println!("Got: {}", *socket);
//!     // Returned to the pool when `socket` goes out of scope
//! }
//! pool.close().await;
//! # }
//! ```

mod config;
mod errors;
mod eviction;
mod manager;
mod membership;
mod pool;
mod status;
mod waiters;

pub use config::PoolConfiguration;
pub use errors::{ClosedError, ConfigError, PoolError, PoolResult};
pub use manager::ManageResource;
pub use membership::ResourceId;
pub use pool::{CloseMode, Pooled, ResourcePool};
pub use status::PoolStatus;
