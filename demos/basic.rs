//! Basic usage examples for ResourcePool

use async_trait::async_trait;
use esox_resourcepool::{ManageResource, PoolConfiguration, ResourcePool};
use std::sync::atomic::{AtomicUsize, Ordering};

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
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        println!("   Opening connection {}", id);
        Ok(Connection { id })
    }

    fn dispose(&self, connection: Connection) {
        println!("   Closing connection {}", connection.id);
    }
}

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Simple pool
    simple_pool().await;

    // Example 2: Reuse of released connections
    reuse().await;

    // Example 3: Status snapshot
    status().await;
}

async fn simple_pool() {
    println!("1. Simple Pool:");
    let pool =
        ResourcePool::new(ConnectionManager::default(), PoolConfiguration::default()).unwrap();

    {
        let conn = pool.get().await.unwrap();
        println!("   Got connection: {}", conn.id);
        // Connection automatically returned when dropped
    }

    println!("   Idle after return: {}\n", pool.idle_count());
    pool.close().await;
}

async fn reuse() {
    println!("2. Reuse:");
    let pool =
        ResourcePool::new(ConnectionManager::default(), PoolConfiguration::default()).unwrap();

    for round in 1..=3 {
        let conn = pool.get().await.unwrap();
        println!("   Round {} uses connection {}", round, conn.id);
    }

    println!("   Total connections: {}\n", pool.total_count());
    pool.close().await;
}

async fn status() {
    println!("3. Status:");
    let config = PoolConfiguration::new().with_max_count(4);
    let pool = ResourcePool::new(ConnectionManager::default(), config).unwrap();

    let _conn1 = pool.get().await.unwrap();
    let conn2 = pool.get().await.unwrap();
    pool.release(conn2);

    let status = pool.status();
    println!("   Utilization: {:.1}%", status.utilization() * 100.0);
    println!("   Busy: {}, Idle: {}, Waiting: {}", status.busy, status.idle, status.waiting);
    println!("   Saturated: {}", status.is_saturated());
}
