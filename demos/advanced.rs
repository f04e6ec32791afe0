//! Advanced features: idle eviction, usage limits, detaching and shutdown

use async_trait::async_trait;
use esox_resourcepool::{ClosedError, CloseMode, ManageResource, PoolConfiguration, ResourcePool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
struct Connection {
    id: usize,
}

#[derive(Default)]
struct ConnectionManager {
    next_id: AtomicUsize,
}

#[async_trait]
impl ManageResource for ConnectionManager {
    type Resource = Connection;
    type Error = std::io::Error;

    async fn create(&self) -> Result<Connection, std::io::Error> {
        Ok(Connection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
        })
    }

    fn dispose(&self, connection: Connection) {
        println!("   Disposed connection {}", connection.id);
    }
}

fn pool(config: PoolConfiguration) -> ResourcePool<ConnectionManager> {
    ResourcePool::new(ConnectionManager::default(), config).unwrap()
}

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ResourcePool - Advanced Features ===\n");

    // Example 1: Idle eviction
    idle_eviction().await;

    // Example 2: Usage limit
    usage_limit().await;

    // Example 3: Detaching a broken connection
    detach_broken().await;

    // Example 4: Graceful and forced close
    shutdown().await;
}

async fn idle_eviction() {
    println!("1. Idle Eviction:");
    let pool = pool(PoolConfiguration::new().with_idle_timeout(Duration::from_millis(100)));

    drop(pool.get().await.unwrap());
    println!("   Idle: {}", pool.idle_count());

    sleep(Duration::from_millis(250)).await;
    println!("   Idle after timeout: {}\n", pool.idle_count());
}

async fn usage_limit() {
    println!("2. Usage Limit:");
    let pool = pool(PoolConfiguration::new().with_max_count(1).with_usage_limit(2));

    for _ in 0..4 {
        let conn = pool.get().await.unwrap();
        println!("   Using connection {}", conn.id);
    }
    println!();
}

async fn detach_broken() {
    println!("3. Detach:");
    let pool = pool(PoolConfiguration::default());

    let conn = pool.get().await.unwrap();
    let broken = pool.remove(conn);
    println!("   Detached connection {} without disposal", broken.id);
    println!("   Total after detach: {}\n", pool.total_count());
}

async fn shutdown() {
    println!("4. Shutdown:");
    let graceful = pool(PoolConfiguration::default());
    let conn = graceful.get().await.unwrap();

    let closer = {
        let graceful = graceful.clone();
        tokio::spawn(async move { graceful.close().await })
    };
    sleep(Duration::from_millis(10)).await;
    println!("   Graceful close waiting, total: {}", graceful.total_count());
    drop(conn);
    closer.await.unwrap();
    println!("   Graceful close finished");

    let forced = pool(PoolConfiguration::default());
    let conn = forced.get().await.unwrap();
    forced.close_with(CloseMode::Force, ClosedError::new("maintenance window")).await;
    println!("   Forced close finished, total: {}", forced.total_count());
    if let Err(e) = forced.get().await {
        println!("   get() after close: {}", e);
    }
    drop(conn);
}
