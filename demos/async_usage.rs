//! Async usage examples: queueing, timeouts and concurrent access

use async_trait::async_trait;
use esox_resourcepool::{ManageResource, PoolConfiguration, PoolError, ResourcePool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Default)]
struct SlowManager {
    next_id: AtomicUsize,
}

#[async_trait]
impl ManageResource for SlowManager {
    type Resource = usize;
    type Error = String;

    async fn create(&self) -> Result<usize, String> {
        sleep(Duration::from_millis(20)).await;
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn dispose(&self, _resource: usize) {}
}

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ResourcePool - Async Examples ===\n");

    // Example 1: Waiting for a released resource
    queued_get().await;

    // Example 2: Get with timeout
    get_with_timeout().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

async fn queued_get() {
    println!("1. Queued Get:");
    let config = PoolConfiguration::new().with_max_count(1);
    let pool = ResourcePool::new(SlowManager::default(), config).unwrap();

    let held = pool.get().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { *pool.get().await.unwrap() })
    };

    sleep(Duration::from_millis(10)).await;
    println!("   Waiting callers: {}", pool.waiting_count());
    drop(held);

    println!("   Waiter received resource {}\n", waiter.await.unwrap());
}

async fn get_with_timeout() {
    println!("2. Get with Timeout:");
    let config = PoolConfiguration::new().with_max_count(1);
    let pool = ResourcePool::new(SlowManager::default(), config).unwrap();

    let _held = pool.get().await.unwrap();
    match pool.get_timeout(Duration::from_millis(100)).await {
        Ok(_) => println!("   Got resource"),
        Err(PoolError::Timeout(after)) => println!("   Gave up after {:?}", after),
        Err(e) => println!("   Error: {}", e),
    }

    println!("   Waiting callers after timeout: {}\n", pool.waiting_count());
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");
    let config = PoolConfiguration::new().with_max_count(3);
    let pool = ResourcePool::new(SlowManager::default(), config).unwrap();

    let mut handles = vec![];

    for i in 0..10 {
        let pool = pool.clone();
        let handle = tokio::spawn(async move {
            let resource = pool.get().await.unwrap();
            println!("   Task {} got resource: {}", i, *resource);
            sleep(Duration::from_millis(50)).await;
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Resources created: {}", pool.total_count());
    pool.close().await;
}
