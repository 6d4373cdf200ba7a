//! Integration tests for size- and time-triggered flushing
//!
//! Each test records flushed groups through the public API only.

use batcher_core::{Batcher, LifecycleState};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Flushed<T> = Arc<Mutex<Vec<Vec<T>>>>;

fn recording_batcher<T: Send + 'static>(
    capacity: usize,
    timeout: Duration,
) -> (Batcher<T>, Flushed<T>) {
    let flushed: Flushed<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = flushed.clone();
    let batcher = Batcher::new(capacity, timeout, move |batch: Vec<T>| {
        sink.lock().unwrap().push(batch);
    })
    .expect("valid batcher configuration");
    (batcher, flushed)
}

fn snapshot<T: Clone>(flushed: &Flushed<T>) -> Vec<Vec<T>> {
    flushed.lock().unwrap().clone()
}

#[tokio::test]
async fn test_size_trigger_single_flush() {
    let (batcher, flushed) = recording_batcher(3, Duration::ZERO);

    batcher.push(1).await.unwrap();
    batcher.push(2).await.unwrap();
    batcher.push(3).await.unwrap();

    batcher.close().await.unwrap();

    assert_eq!(snapshot(&flushed), vec![vec![1, 2, 3]]);
    let stats = batcher.stats();
    assert_eq!(stats.size_flushes, 1);
    assert_eq!(stats.shutdown_flushes, 0);
}

#[tokio::test]
async fn test_timeout_trigger_single_flush() {
    let (batcher, flushed) = recording_batcher(10, Duration::from_millis(100));

    batcher.push(42).await.unwrap();

    // Nothing before the timeout
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(snapshot(&flushed).is_empty());

    tokio::time::sleep(Duration::from_millis(170)).await;
    assert_eq!(snapshot(&flushed), vec![vec![42]]);

    batcher.close().await.unwrap();
    assert_eq!(snapshot(&flushed), vec![vec![42]]);
    assert_eq!(batcher.stats().timeout_flushes, 1);
}

#[tokio::test]
async fn test_sub_millisecond_timeout_still_flushes() {
    let (batcher, flushed) = recording_batcher(10, Duration::from_micros(500));
    assert_eq!(batcher.timeout(), Duration::from_micros(500));

    batcher.push(1).await.unwrap();

    // a sub-millisecond timer is armed, not treated as disabled
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(snapshot(&flushed), vec![vec![1]]);

    batcher.close().await.unwrap();
    let stats = batcher.stats();
    assert_eq!(stats.timeout_flushes, 1);
    assert_eq!(stats.shutdown_flushes, 0);
}

#[tokio::test]
async fn test_multiple_size_flushes() {
    let (batcher, flushed) = recording_batcher(2, Duration::ZERO);

    assert_eq!(batcher.add([1, 2, 3, 4]).await.unwrap(), 4);
    batcher.close().await.unwrap();

    assert_eq!(snapshot(&flushed), vec![vec![1, 2], vec![3, 4]]);
}

#[tokio::test]
async fn test_multiple_adds_join_one_timed_group() {
    let (batcher, flushed) = recording_batcher(10, Duration::from_millis(50));

    batcher.add([1, 2, 3]).await.unwrap();
    batcher.add([4, 5]).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(snapshot(&flushed), vec![vec![1, 2, 3, 4, 5]]);
    batcher.close().await.unwrap();
}

#[tokio::test]
async fn test_overflow_item_waits_for_close() {
    let (batcher, flushed) = recording_batcher(3, Duration::ZERO);

    batcher.add(1..=4).await.unwrap();
    assert_eq!(snapshot(&flushed), vec![vec![1, 2, 3]]);

    batcher.close().await.unwrap();
    assert_eq!(snapshot(&flushed), vec![vec![1, 2, 3], vec![4]]);
    assert_eq!(batcher.stats().shutdown_flushes, 1);
}

#[tokio::test]
async fn test_size_and_timeout_never_flush_same_group() {
    let (batcher, flushed) = recording_batcher(3, Duration::from_millis(20));

    batcher.add(["a", "b", "c"]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    batcher.close().await.unwrap();

    assert_eq!(snapshot(&flushed), vec![vec!["a", "b", "c"]]);
    let stats = batcher.stats();
    assert_eq!(stats.size_flushes, 1);
    assert_eq!(stats.timeout_flushes, 0);
    assert_eq!(stats.total_flushes(), 1);
}

#[tokio::test]
async fn test_timer_rearms_per_group() {
    let (batcher, flushed) = recording_batcher(10, Duration::from_millis(40));

    batcher.push(1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    batcher.push(2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(snapshot(&flushed), vec![vec![1], vec![2]]);
    assert_eq!(batcher.stats().timeout_flushes, 2);
    batcher.close().await.unwrap();
}

#[tokio::test]
async fn test_close_flushes_pending_group_once() {
    let (batcher, flushed) = recording_batcher(10, Duration::from_millis(50));

    batcher.add([7, 8, 9]).await.unwrap();
    batcher.close().await.unwrap();
    assert_eq!(snapshot(&flushed), vec![vec![7, 8, 9]]);

    // The disarmed timer never fires after shutdown
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(snapshot(&flushed), vec![vec![7, 8, 9]]);

    let stats = batcher.stats();
    assert_eq!(stats.shutdown_flushes, 1);
    assert_eq!(stats.timeout_flushes, 0);
}

#[tokio::test]
async fn test_close_with_empty_group_does_not_flush() {
    let (batcher, flushed) = recording_batcher::<u32>(10, Duration::from_millis(50));

    batcher.close().await.unwrap();

    assert!(snapshot(&flushed).is_empty());
    assert_eq!(batcher.stats().total_flushes(), 0);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (batcher, flushed) = recording_batcher(10, Duration::ZERO);

    batcher.add([1, 2]).await.unwrap();
    batcher.close().await.unwrap();
    batcher.close().await.unwrap();

    assert_eq!(snapshot(&flushed), vec![vec![1, 2]]);
    assert_eq!(batcher.state(), LifecycleState::Terminated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_close_waits_for_termination() {
    let (batcher, flushed) = recording_batcher(10, Duration::ZERO);
    let batcher = Arc::new(batcher);

    batcher.add([1, 2, 3]).await.unwrap();

    let closers: Vec<_> = (0..3)
        .map(|_| {
            let batcher = batcher.clone();
            tokio::spawn(async move {
                batcher.close().await.unwrap();
                // every caller returns only after the worker is gone
                assert_eq!(batcher.state(), LifecycleState::Terminated);
            })
        })
        .collect();

    for closer in closers {
        closer.await.unwrap();
    }

    assert_eq!(snapshot(&flushed), vec![vec![1, 2, 3]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exact_partition_across_producers() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 250;
    const CAPACITY: usize = 16;

    let (batcher, flushed) = recording_batcher(CAPACITY, Duration::from_millis(5));
    let batcher = Arc::new(batcher);

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let batcher = batcher.clone();
            tokio::spawn(async move {
                for seq in 0..PER_PRODUCER {
                    batcher.push((producer, seq)).await.unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.await.unwrap();
    }
    batcher.close().await.unwrap();

    let groups = snapshot(&flushed);
    assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= CAPACITY));

    let items: Vec<(usize, usize)> = groups.into_iter().flatten().collect();
    assert_eq!(items.len(), PRODUCERS * PER_PRODUCER);

    // each producer's items appear once, in submission order
    for producer in 0..PRODUCERS {
        let seqs: Vec<usize> = items
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, seq)| *seq)
            .collect();
        assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
    }

    let stats = batcher.stats();
    assert_eq!(stats.accepted, (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(stats.rejected, 0);
}

#[tokio::test]
async fn test_capacity_one_flushes_each_item() {
    let (batcher, flushed) = recording_batcher(1, Duration::from_millis(10));

    batcher.add(["x", "y"]).await.unwrap();
    batcher.close().await.unwrap();

    assert_eq!(snapshot(&flushed), vec![vec!["x"], vec!["y"]]);
    assert_eq!(batcher.stats().timeout_flushes, 0);
}
