use futures::channel::mpsc;
use futures_util::stream::{self, Stream, StreamExt};
use rs2_replay::{ReplayError, ReplayStreamExt, SharedFanOut, SharedReplay};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::task;
use tokio_test::{assert_pending, assert_ready_eq};

fn counted(values: Vec<i32>, polls: &Arc<AtomicUsize>) -> impl Stream<Item = i32> + Unpin {
    let polls = Arc::clone(polls);
    stream::iter(values).inspect(move |_| {
        polls.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn test_replay_rs2_yields_every_item_to_every_cursor() {
    let polls = Arc::new(AtomicUsize::new(0));
    let replay = counted(vec![1, 2, 3], &polls).replay_rs2();

    let first: Vec<i32> = replay.cursor().collect().await;
    let second: Vec<i32> = replay.cursor().collect().await;

    assert_eq!(first, vec![1, 2, 3]);
    assert_eq!(second, vec![1, 2, 3]);
    assert_eq!(polls.load(Ordering::SeqCst), 3);

    let stats = replay.stats();
    assert_eq!(stats.produced, 3);
    assert_eq!(stats.cursors_created, 2);
    assert!(stats.producer_finished);
}

#[tokio::test]
async fn test_replay_rs2_cursor_created_late_sees_history() {
    let replay = SharedReplay::new(stream::iter(vec!["a", "b", "c"]));
    let mut early = replay.cursor();
    assert_eq!(early.next().await, Some("a"));
    assert_eq!(early.next().await, Some("b"));

    let late = replay.clone().cursor();
    assert_eq!(late.position(), 0);
    assert_eq!(late.collect::<Vec<_>>().await, vec!["a", "b", "c"]);
    assert_eq!(early.next().await, Some("c"));
    assert_eq!(replay.buffered_len(), 3);
}

#[tokio::test]
async fn test_fan_out_rs2_rejects_zero_consumers() {
    let result = stream::iter(0..3).fan_out_rs2(0);
    assert!(matches!(result, Err(ReplayError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_fan_out_rs2_concurrent_consumers() {
    let polls = Arc::new(AtomicUsize::new(0));
    let mut streams = counted((0..100).collect(), &polls).fan_out_rs2(3).unwrap();
    assert_eq!(streams.len(), 3);

    let third = streams.pop().unwrap();
    let second = streams.pop().unwrap();
    let first = streams.pop().unwrap();

    let (a, b, c) = tokio::join!(
        first.collect::<Vec<_>>(),
        second.map(|n| n * 2).collect::<Vec<_>>(),
        third.filter(|n| futures_util::future::ready(n % 10 == 0)).collect::<Vec<_>>(),
    );

    assert_eq!(a, (0..100).collect::<Vec<_>>());
    assert_eq!(b, (0..100).map(|n| n * 2).collect::<Vec<_>>());
    assert_eq!(c, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    assert_eq!(polls.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn test_shared_fan_out_evicts_behind_slowest_cursor() {
    let fan_out = SharedFanOut::new(stream::iter(0..5), 2).unwrap();
    let mut fast = fan_out.cursor().unwrap();
    let mut slow = fan_out.cursor().unwrap();

    for expected in 0..3 {
        assert_eq!(fast.next().await, Some(expected));
    }
    assert_eq!(fan_out.buffered_len(), 3);

    assert_eq!(slow.next().await, Some(0));
    assert_eq!(fan_out.buffered_len(), 2);

    assert!(matches!(
        fan_out.cursor(),
        Err(ReplayError::CapacityExceeded { capacity: 2 })
    ));

    drop(slow);
    assert_eq!(fan_out.buffered_len(), 0);
    assert_eq!(fast.collect::<Vec<_>>().await, vec![3, 4]);
    assert_eq!(fan_out.stats().evicted, 5);
}

#[tokio::test]
async fn test_shared_fan_out_release_unclaimed() {
    let fan_out = SharedFanOut::new(stream::iter(0..4), 3).unwrap();
    let mut only = fan_out.cursor().unwrap();
    assert_eq!(only.next().await, Some(0));
    assert_eq!(fan_out.buffered_len(), 1);

    assert_eq!(fan_out.release_unclaimed(), 2);
    assert_eq!(fan_out.buffered_len(), 0);
    assert_eq!(fan_out.remaining_capacity(), 0);
}

#[test]
fn test_pending_producer_parks_and_wakes_every_cursor() {
    let (tx, rx) = mpsc::unbounded::<i32>();
    let fan_out = SharedFanOut::new(rx, 2).unwrap();
    let mut first = fan_out.cursor().unwrap();
    let mut second = fan_out.cursor().unwrap();

    {
        let mut first_next = task::spawn(first.next());
        let mut second_next = task::spawn(second.next());
        assert_pending!(first_next.poll());
        assert_pending!(second_next.poll());

        tx.unbounded_send(7).unwrap();
        assert!(second_next.is_woken());
        assert_ready_eq!(second_next.poll(), Some(7));

        // The value reached the buffer through the second cursor's poll.
        assert!(first_next.is_woken());
        assert_ready_eq!(first_next.poll(), Some(7));
    }

    let mut first_next = task::spawn(first.next());
    assert_pending!(first_next.poll());
    drop(tx);
    assert_ready_eq!(first_next.poll(), None);
    drop(first_next);

    let mut second_next = task::spawn(second.next());
    assert_ready_eq!(second_next.poll(), None);
}

#[test]
fn test_dropping_a_parked_cursor_still_wakes_the_others() {
    let (tx, rx) = mpsc::unbounded::<i32>();
    let fan_out = SharedFanOut::new(rx, 2).unwrap();
    let mut first = fan_out.cursor().unwrap();
    let mut second = fan_out.cursor().unwrap();

    let mut first_next = task::spawn(first.next());
    {
        let mut second_next = task::spawn(second.next());
        assert_pending!(first_next.poll());
        assert_pending!(second_next.poll());
    }
    drop(second);

    tx.unbounded_send(7).unwrap();
    assert!(first_next.is_woken());
    assert_ready_eq!(first_next.poll(), Some(7));
    assert_eq!(fan_out.buffered_len(), 0);
}

#[test]
fn test_cancelled_next_does_not_strand_other_cursors() {
    let (tx, rx) = mpsc::unbounded::<i32>();
    let replay = SharedReplay::new(rx);
    let mut first = replay.cursor();
    let mut second = replay.cursor();

    let mut first_next = task::spawn(first.next());
    assert_pending!(first_next.poll());
    {
        // Polled last, then abandoned with the cursor kept alive.
        let mut second_next = task::spawn(second.next());
        assert_pending!(second_next.poll());
    }

    tx.unbounded_send(7).unwrap();
    assert!(first_next.is_woken());
    assert_ready_eq!(first_next.poll(), Some(7));
    drop(first_next);

    let mut second_next = task::spawn(second.next());
    assert_ready_eq!(second_next.poll(), Some(7));
}

#[tokio::test]
async fn test_shared_fan_out_capacity() {
    let fan_out = SharedFanOut::new(stream::iter(0..3), 3).unwrap();
    assert_eq!(fan_out.capacity(), 3);

    let _only = fan_out.cursor().unwrap();
    assert_eq!(fan_out.capacity(), 3);
    assert_eq!(fan_out.remaining_capacity(), 2);

    fan_out.release_unclaimed();
    assert_eq!(fan_out.capacity(), 1);
    assert_eq!(fan_out.remaining_capacity(), 0);
}

#[tokio::test]
async fn test_partition_intermediate_rs2() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let (evens, odds) = stream::iter(vec![1, 2, 4, 3, 7, 5, 6, 0]).partition_intermediate_rs2(
        move |n| {
            counter.fetch_add(1, Ordering::SeqCst);
            n % 2 == 0
        },
    );

    let (evens, odds) = tokio::join!(evens.collect::<Vec<_>>(), odds.collect::<Vec<_>>());
    assert_eq!(evens, vec![2, 4, 6, 0]);
    assert_eq!(odds, vec![1, 3, 7, 5]);
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_unzip_intermediate_rs2() {
    let (ids, names) = stream::iter(vec![(1, "ada"), (2, "grace"), (3, "barbara")])
        .unzip_intermediate_rs2();

    let names: Vec<&str> = names.collect().await;
    let ids: Vec<i32> = ids.collect().await;
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(names, vec!["ada", "grace", "barbara"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cursors_move_across_tasks() {
    let polls = Arc::new(AtomicUsize::new(0));
    let streams = counted((0..1000).collect(), &polls).fan_out_rs2(4).unwrap();

    let handles: Vec<_> = streams
        .into_iter()
        .map(|stream| tokio::spawn(stream.fold(0i64, |sum, n| async move { sum + n as i64 })))
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 499_500);
    }
    assert_eq!(polls.load(Ordering::SeqCst), 1000);

    let replay = SharedReplay::new(stream::iter(0..10));
    let spawned = tokio::spawn({
        let replay = replay.clone();
        async move { replay.cursor().collect::<Vec<_>>().await }
    });
    let here: Vec<i32> = replay.cursor().collect().await;
    assert_eq!(spawned.await.unwrap(), here);
}
