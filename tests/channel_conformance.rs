//! Conformance tests for the bounded MPMC channel.

use filament::sync::{BoundedChannel, TryRecvError, TrySendError};
use filament::test_utils::init_test_logging;
use filament::{test_complete, test_phase, ErrorKind};

fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

#[test]
fn capacity_two_walkthrough() {
    init_test("capacity_two_walkthrough");
    let channel = BoundedChannel::new(2);
    assert_eq!(channel.capacity(), 2);

    assert!(channel.try_send('a').is_ok());
    assert!(channel.try_send('b').is_ok());
    assert_eq!(channel.try_send('c'), Err(TrySendError::Full('c')));
    assert_eq!(channel.try_recv(), Ok('a'));
    assert!(channel.try_send('c').is_ok());
    assert_eq!(channel.try_recv(), Ok('b'));
    assert_eq!(channel.try_recv(), Ok('c'));
    assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
    test_complete!("capacity_two_walkthrough");
}

#[test]
fn fifo_round_trip_at_capacity() {
    init_test("fifo_round_trip_at_capacity");
    let channel = BoundedChannel::new(32);
    for i in 0..32 {
        assert!(channel.try_send(i).is_ok(), "push {i} within capacity");
    }
    assert!(matches!(channel.try_send(99), Err(TrySendError::Full(99))));
    for i in 0..32 {
        assert_eq!(channel.try_recv(), Ok(i), "pop {i} in FIFO order");
    }
    assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
    test_complete!("fifo_round_trip_at_capacity");
}

#[test]
fn close_is_terminal_and_idempotent_detecting() {
    init_test("close_is_terminal_and_idempotent_detecting");
    let channel = BoundedChannel::new(4);
    channel.try_send(1).expect("send");
    channel.try_send(2).expect("send");

    assert_eq!(channel.close().expect("first close"), 2);
    let err = channel.close().expect_err("second close fails");
    assert_eq!(err.kind(), ErrorKind::ChannelAlreadyClosed);

    // Non-blocking failures after close, for both directions.
    assert_eq!(channel.try_send(3), Err(TrySendError::Closed(3)));
    assert_eq!(channel.try_recv(), Err(TryRecvError::Closed));
    test_complete!("close_is_terminal_and_idempotent_detecting");
}

#[test]
fn pairing_with_a_semaphore_gives_blocking_semantics() {
    init_test("pairing_with_a_semaphore_gives_blocking_semantics");
    use filament::BinarySemaphore;
    use std::sync::Arc;
    use std::thread;

    // The channel itself never blocks; a semaphore carries the "item
    // available" signal across threads.
    let channel = Arc::new(BoundedChannel::new(1));
    let items = Arc::new(BinarySemaphore::new(false));

    let consumer = {
        let channel = Arc::clone(&channel);
        let items = Arc::clone(&items);
        thread::spawn(move || {
            let mut received = Vec::new();
            for _ in 0..3 {
                items.acquire();
                received.push(channel.try_recv().expect("signaled item present"));
            }
            received
        })
    };

    for i in 0..3 {
        loop {
            match channel.try_send(i) {
                Ok(()) => break,
                Err(TrySendError::Full(_)) => thread::yield_now(),
                Err(TrySendError::Closed(_)) => panic!("channel closed"),
            }
        }
        items.release();
    }

    assert_eq!(consumer.join().expect("consumer"), vec![0, 1, 2]);
    test_complete!("pairing_with_a_semaphore_gives_blocking_semantics");
}

#[test]
fn producers_from_pool_tasks_and_threads_interleave() {
    init_test("producers_from_pool_tasks_and_threads_interleave");
    use filament::test_utils::test_runtime;
    use std::sync::Arc;

    let runtime = test_runtime(2);
    let channel = Arc::new(BoundedChannel::new(8));

    // Half the items from pool tasks, half from a plain thread.
    let tasks: Vec<_> = (0..2)
        .map(|p| {
            let channel = Arc::clone(&channel);
            runtime.spawn(move || {
                for i in 0..50 {
                    let mut item = p * 100 + i;
                    loop {
                        match channel.try_send(item) {
                            Ok(()) => break,
                            Err(TrySendError::Full(back)) => {
                                item = back;
                                std::thread::yield_now();
                            }
                            Err(TrySendError::Closed(_)) => panic!("closed"),
                        }
                    }
                }
            })
        })
        .collect();

    let mut received = Vec::new();
    while received.len() < 100 {
        match channel.try_recv() {
            Ok(item) => received.push(item),
            Err(TryRecvError::Empty) => std::thread::yield_now(),
            Err(TryRecvError::Closed) => panic!("closed"),
        }
    }
    for task in tasks {
        task.get().expect("producer task");
    }

    received.sort_unstable();
    received.dedup();
    assert_eq!(received.len(), 100, "every item exactly once");
    test_complete!("producers_from_pool_tasks_and_threads_interleave");
}
