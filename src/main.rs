// EsoxSolutions.ResourcePool
// Bounded async resource pool with FIFO waiters and graceful shutdown

// This is just a binary wrapper - the actual library is in lib.rs
// Run demos with: cargo run --example basic

use async_trait::async_trait;
use esox_resourcepool::{ManageResource, PoolConfiguration, ResourcePool};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing_subscriber::EnvFilter;

struct Sessions {
    next: AtomicU32,
}

#[async_trait]
impl ManageResource for Sessions {
    type Resource = u32;
    type Error = std::convert::Infallible;

    async fn create(&self) -> Result<u32, Self::Error> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn dispose(&self, session: u32) {
        tracing::info!(session, "session disposed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== EsoxSolutions.ResourcePool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let pool = ResourcePool::new(
        Sessions { next: AtomicU32::new(0) },
        PoolConfiguration::new().with_max_count(2),
    )?;

    {
        let session = pool.get().await?;
        println!("  Got session: {}", *session);
    }

    println!("  Idle after return: {}", pool.idle_count());
    pool.close().await;
    println!("  Closed, total resources: {}", pool.total_count());
    Ok(())
}
