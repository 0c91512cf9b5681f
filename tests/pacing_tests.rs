//! Frame Pacing Integration Tests
//!
//! Tests for:
//! - InFlightGate: capacity bound under contention, backpressure blocking
//! - FrameResourceRing: rotation discipline
//! - Gate + ring combined: no two overlapping frames share a slot, and a
//!   laggy consumer stalls the producer exactly at the capacity bound

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use raypace::pacing::DEFAULT_UNIFORM_ALIGNMENT;
use raypace::{FrameResourceRing, InFlightGate};

/// Spins until `predicate` holds or the timeout elapses.
fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    predicate()
}

// ============================================================================
// Gate capacity bound
// ============================================================================

#[test]
fn outstanding_units_never_exceed_capacity() {
    const CAPACITY: usize = 3;
    const THREADS: usize = 8;
    const FRAMES_PER_THREAD: usize = 25;

    let gate = InFlightGate::new(CAPACITY);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            thread::spawn(move || {
                for _ in 0..FRAMES_PER_THREAD {
                    gate.acquire();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    gate.release();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
    assert_eq!(gate.outstanding(), 0);
}

// ============================================================================
// No-aliasing: overlapping frames hold distinct slots
// ============================================================================

#[test]
fn overlapping_frames_never_share_a_slot() {
    for capacity in 1..=4usize {
        let gate = InFlightGate::new(capacity);
        let mut ring = FrameResourceRing::new(capacity, DEFAULT_UNIFORM_ALIGNMENT);
        let in_flight_slots = Arc::new(Mutex::new(HashSet::new()));

        let (tx, rx) = mpsc::channel::<usize>();
        let consumer_gate = gate.clone();
        let consumer_slots = in_flight_slots.clone();
        let consumer = thread::spawn(move || {
            // Simulated GPU: finishes frames strictly after they were
            // submitted, with a small processing delay.
            while let Ok(slot) = rx.recv() {
                thread::sleep(Duration::from_micros(200));
                consumer_slots.lock().unwrap().remove(&slot);
                consumer_gate.release();
            }
        });

        for _frame in 0..capacity * 20 {
            gate.acquire();
            let slot = ring.acquire_next_slot();
            {
                let mut held = in_flight_slots.lock().unwrap();
                assert!(
                    held.insert(slot.index()),
                    "slot {} handed to two overlapping frames (K={capacity})",
                    slot.index()
                );
            }
            tx.send(slot.index()).unwrap();
        }

        drop(tx);
        consumer.join().unwrap();
        assert_eq!(gate.outstanding(), 0);
    }
}

// ============================================================================
// Backpressure scenario: laggy consumer stalls the producer
// ============================================================================

/// K = 3, five frames, and the consumer completes frame i only after frame
/// i+2 was submitted. The producer must block before submitting frame 4
/// until frame 1 completes.
#[test]
fn producer_blocks_until_oldest_frame_completes() {
    let gate = InFlightGate::new(3);
    let submitted = Arc::new(Mutex::new(Vec::new()));

    let producer_gate = gate.clone();
    let producer_log = submitted.clone();
    let producer = thread::spawn(move || {
        for frame in 1..=5u32 {
            producer_gate.acquire();
            producer_log.lock().unwrap().push(frame);
        }
    });

    // Frames 1..3 fill the gate.
    assert!(wait_until(Duration::from_secs(5), || {
        submitted.lock().unwrap().len() == 3
    }));

    // Frame 1 has not completed yet, so frame 4 must not appear.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(*submitted.lock().unwrap(), vec![1, 2, 3]);

    // Frame 1 completes (its +2 successor, frame 3, has been submitted).
    gate.release();
    assert!(wait_until(Duration::from_secs(5), || {
        submitted.lock().unwrap().len() == 4
    }));

    // Same for frame 2 / frame 5.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(*submitted.lock().unwrap(), vec![1, 2, 3, 4]);
    gate.release();

    assert!(wait_until(Duration::from_secs(5), || {
        submitted.lock().unwrap().len() == 5
    }));
    producer.join().unwrap();

    // Frames 3..5 are still in flight.
    assert_eq!(gate.outstanding(), 3);
    for _ in 0..3 {
        gate.release();
    }
    assert_eq!(gate.outstanding(), 0);
}

// ============================================================================
// Ring discipline under sustained use
// ============================================================================

#[test]
fn ring_cycles_through_all_slots_in_order() {
    let mut ring = FrameResourceRing::new(3, DEFAULT_UNIFORM_ALIGNMENT);
    let indices: Vec<_> = (0..9).map(|_| ring.acquire_next_slot().index()).collect();
    assert_eq!(indices, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
}

#[test]
fn single_slot_ring_always_returns_slot_zero() {
    let mut ring = FrameResourceRing::new(1, DEFAULT_UNIFORM_ALIGNMENT);
    for _ in 0..4 {
        let slot = ring.acquire_next_slot();
        assert_eq!(slot.index(), 0);
        assert_eq!(slot.byte_offset(), 0);
    }
}
