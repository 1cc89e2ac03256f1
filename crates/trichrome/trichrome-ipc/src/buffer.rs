//! Bounded multi-producer/single-consumer ring over POSIX shared memory.
//!
//! The supervisor process creates the ring ([`RingConsumer::create`]) and is
//! its sole reader; any number of generator processes open it
//! ([`RingProducer::open`]) and publish candidate values.
//!
//! # Protocol
//!
//! Three named semaphores govern every access:
//!
//! - `free` (initially `capacity`): a producer must take a permit before
//!   writing, so a writer can never overwrite an unread slot.
//! - `used` (initially 0): the consumer must take a permit before reading,
//!   so a reader can never read an unwritten slot.
//! - `mutex` (initially 1): serializes all mutation of `write_pos`,
//!   `read_pos` and slot contents. Taken only through a guard that posts on
//!   drop, so the lock is released on every exit path.
//!
//! Shutdown is cooperative. The consumer sets the shared flag under the
//! mutex and posts `free` once; each producer that wakes up and observes the
//! flag re-posts `free` before exiting, so any number of producers blocked
//! on a full ring drain out without writing.

use std::io;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tracing::{debug, trace};
use trichrome_shm::SharedRegion;

use crate::layout::{RING_MAGIC, RING_VERSION, RingHeader, bytes_for_ring, slot_offset};
use crate::names::IpcNames;
use crate::ring::{RingConfig, pos_to_index};
use crate::sem::{SemaphoreTriple, WaitOutcome};
use crate::shutdown::ShutdownToken;

/// Result of one publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The value is in the ring and `used` has been posted.
    Published,
    /// Shutdown was requested (remotely via the shared flag or locally via
    /// the token) before the value could be written. Nothing was published.
    Shutdown,
}

/// Result of one consume attempt.
#[derive(Debug)]
pub enum ConsumeOutcome<T> {
    /// A value was taken out of the ring and `free` has been posted.
    Received(T),
    /// The local token was set while waiting; nothing was read.
    Interrupted,
}

/// Mapped view of the shared ring, common to both endpoints.
struct RawRing<T: Copy> {
    /// Owns the mapping lifetime; the region is accessed through `base`.
    _region: SharedRegion,
    base: *mut u8,
    mask: u64,
    capacity: u64,
    _pd: PhantomData<T>,
}

impl<T: Copy> RawRing<T> {
    #[inline(always)]
    fn header(&self) -> &RingHeader {
        // SAFETY: base points at a RingHeader initialized by create() or
        // validated by open().
        unsafe { &*(self.base as *const RingHeader) }
    }

    /// Pointer to the slot for `pos`. Callers must hold the mutex.
    #[inline(always)]
    fn slot_ptr(&self, pos: u64) -> *mut T {
        let idx = pos_to_index(pos, self.mask);
        // SAFETY: idx is masked into [0, capacity) and the region was sized
        // for exactly `capacity` slots past the aligned header.
        unsafe { (self.base.add(slot_offset::<T>()) as *mut T).add(idx as usize) }
    }

    #[inline]
    fn shutdown_requested(&self) -> bool {
        self.header().shutdown.load(Ordering::Acquire) != 0
    }
}

/// The supervisor's end: creates and owns the shared resources, reads
/// published values. Exactly one consumer exists per ring.
pub struct RingConsumer<T: Copy> {
    ring: RawRing<T>,
    sems: SemaphoreTriple,
}

/// A generator's end: opens existing resources and publishes values.
pub struct RingProducer<T: Copy> {
    ring: RawRing<T>,
    sems: SemaphoreTriple,
}

// The raw base pointer is only dereferenced under the semaphore protocol;
// the endpoints may be moved across threads like any other owning handle.
unsafe impl<T: Copy + Send> Send for RingConsumer<T> {}
unsafe impl<T: Copy + Send> Send for RingProducer<T> {}

impl<T: Copy> std::fmt::Debug for RingProducer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingProducer").finish_non_exhaustive()
    }
}

impl<T: Copy> RingConsumer<T> {
    /// Creates the shared-memory ring and the semaphore triple.
    ///
    /// Fails if any of the named objects already exist (a stale instance
    /// must be removed first) or if the mapping cannot be established.
    pub fn create(names: &IpcNames, config: RingConfig) -> io::Result<Self> {
        let bytes = bytes_for_ring::<T>(config.capacity);
        let mut region = SharedRegion::create(&names.ring(), bytes)?;
        let base = region.as_mut_ptr();

        // SAFETY: freshly created region of exactly `bytes` bytes, not yet
        // shared with any other process.
        unsafe {
            ptr::write(
                base as *mut RingHeader,
                RingHeader {
                    magic: RING_MAGIC,
                    version: RING_VERSION,
                    capacity: config.capacity as u64,
                    elem_size: size_of::<T>() as u64,
                    write_pos: AtomicU64::new(0),
                    read_pos: AtomicU64::new(0),
                    shutdown: AtomicU32::new(0),
                },
            );
        }

        let sems = SemaphoreTriple::create(names, config.capacity as u32)?;
        debug!(
            ring = %names.ring(),
            capacity = config.capacity,
            "created shared ring"
        );

        Ok(Self {
            ring: RawRing {
                _region: region,
                base,
                mask: config.mask(),
                capacity: config.capacity as u64,
                _pd: PhantomData,
            },
            sems,
        })
    }

    /// Blocks until a value is available and returns it, or reports an
    /// interruption once the local token is set.
    pub fn consume(&mut self, token: &ShutdownToken) -> io::Result<ConsumeOutcome<T>> {
        loop {
            if token.is_set() {
                return Ok(ConsumeOutcome::Interrupted);
            }
            match self.sems.used.wait()? {
                WaitOutcome::Acquired => break,
                WaitOutcome::Interrupted => continue,
            }
        }

        let value;
        {
            let _guard = self.sems.mutex.lock()?;
            let header = self.ring.header();
            let r = header.read_pos.load(Ordering::Acquire);
            let w = header.write_pos.load(Ordering::Acquire);
            debug_assert!(r < w, "used permit without a published slot");
            debug_assert!(w - r <= self.ring.capacity, "ring overflow");
            // SAFETY: the mutex is held and the used permit guarantees the
            // slot at read_pos was fully written.
            value = unsafe { self.ring.slot_ptr(r).read() };
            header.read_pos.store(r + 1, Ordering::Release);
        }
        self.sems.free.post()?;
        trace!("consumed one slot");
        Ok(ConsumeOutcome::Received(value))
    }

    /// Requests cooperative shutdown: sets the shared flag under the lock
    /// and starts the producer wake chain. Idempotent.
    pub fn request_shutdown(&mut self) -> io::Result<()> {
        {
            let _guard = self.sems.mutex.lock()?;
            self.ring.header().shutdown.store(1, Ordering::Release);
        }
        // Wake one producer potentially blocked on a full ring; it will
        // re-post before exiting so the chain reaches all of them.
        self.sems.free.post()?;
        debug!("shutdown requested");
        Ok(())
    }

    /// Diagnostic snapshot of unread slots (`write_pos - read_pos`). Racy
    /// outside the lock; intended for logging and tests.
    pub fn pending(&self) -> u64 {
        let header = self.ring.header();
        let w = header.write_pos.load(Ordering::Acquire);
        let r = header.read_pos.load(Ordering::Acquire);
        w.wrapping_sub(r)
    }
}

impl<T: Copy> RingProducer<T> {
    /// Opens and validates an existing ring created by a consumer.
    pub fn open(names: &IpcNames) -> io::Result<Self> {
        let region = SharedRegion::open(&names.ring())?;
        if region.len() < size_of::<RingHeader>() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "shared region too small for a ring header",
            ));
        }

        // SAFETY: the region is at least header-sized; validate() rejects
        // anything that is not one of our rings.
        let header = unsafe { &*(region.as_ptr() as *const RingHeader) };
        header
            .validate::<T>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let capacity = header.capacity as usize;
        if region.len() != bytes_for_ring::<T>(capacity) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "shared region size does not match its header",
            ));
        }

        let mut region = region;
        let base = region.as_mut_ptr();
        let sems = SemaphoreTriple::open(names)?;
        debug!(ring = %names.ring(), capacity, "opened shared ring");

        Ok(Self {
            ring: RawRing {
                _region: region,
                base,
                mask: (capacity as u64) - 1,
                capacity: capacity as u64,
                _pd: PhantomData,
            },
            sems,
        })
    }

    /// Publishes one value, blocking while the ring is full.
    ///
    /// Returns [`PublishOutcome::Shutdown`] without writing if shutdown is
    /// observed at any of the checkpoints: before waiting, after an
    /// interrupted wait, after taking a `free` permit, or under the lock.
    pub fn publish(&mut self, value: T, token: &ShutdownToken) -> io::Result<PublishOutcome> {
        // Phase 1: take a free slot permit.
        loop {
            if token.is_set() || self.ring.shutdown_requested() {
                return Ok(PublishOutcome::Shutdown);
            }
            match self.sems.free.wait()? {
                WaitOutcome::Acquired => break,
                WaitOutcome::Interrupted => continue,
            }
        }

        // Holding a free permit. If shutdown won the race, hand the permit
        // on so any sibling blocked on `free` also wakes up.
        if token.is_set() || self.ring.shutdown_requested() {
            self.sems.free.post()?;
            return Ok(PublishOutcome::Shutdown);
        }

        // Phase 2: take the lock, still honoring interruptions.
        let guard = loop {
            match self.sems.mutex.wait()? {
                WaitOutcome::Acquired => break self.sems.mutex.guard(),
                WaitOutcome::Interrupted => {
                    if token.is_set() || self.ring.shutdown_requested() {
                        self.sems.free.post()?;
                        return Ok(PublishOutcome::Shutdown);
                    }
                }
            }
        };

        // Phase 3: under the lock.
        let header = self.ring.header();
        if header.shutdown.load(Ordering::Acquire) != 0 {
            drop(guard);
            self.sems.free.post()?;
            return Ok(PublishOutcome::Shutdown);
        }

        let w = header.write_pos.load(Ordering::Acquire);
        let r = header.read_pos.load(Ordering::Acquire);
        debug_assert!(w.wrapping_sub(r) < self.ring.capacity, "free permit on a full ring");
        // SAFETY: the mutex is held and the free permit guarantees the slot
        // at write_pos is not awaiting a read.
        unsafe { self.ring.slot_ptr(w).write(value) };
        header.write_pos.store(w + 1, Ordering::Release);
        drop(guard);

        self.sems.used.post()?;
        trace!("published one slot");
        Ok(PublishOutcome::Published)
    }

    /// Whether the consumer has requested shutdown. Readable without the
    /// lock so interrupted waits can bail out promptly.
    pub fn shutdown_requested(&self) -> bool {
        self.ring.shutdown_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn names(tag: &str) -> IpcNames {
        IpcNames::new(format!("/trichrome_buf_{tag}_{}", std::process::id())).unwrap()
    }

    fn idle() -> ShutdownToken {
        ShutdownToken::new()
    }

    /// Every published value is consumed exactly once, even with several
    /// producers contending for slots: the consumer must observe an exact
    /// permutation of the tagged publications.
    #[test]
    fn multi_producer_no_loss_no_duplication() {
        const PRODUCERS: u64 = 3;
        const PER_PRODUCER: u64 = 64;

        let names = names("spmc");
        let mut consumer = RingConsumer::<u64>::create(&names, RingConfig::new(8)).unwrap();

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let names = names.clone();
                thread::spawn(move || {
                    let mut producer = RingProducer::<u64>::open(&names).unwrap();
                    for i in 0..PER_PRODUCER {
                        let outcome = producer.publish((p << 32) | i, &idle()).unwrap();
                        assert_eq!(outcome, PublishOutcome::Published);
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        for _ in 0..PRODUCERS * PER_PRODUCER {
            match consumer.consume(&idle()).unwrap() {
                ConsumeOutcome::Received(v) => seen.push(v),
                ConsumeOutcome::Interrupted => panic!("no interruption was requested"),
            }
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let mut expected: Vec<u64> = (0..PRODUCERS)
            .flat_map(|p| (0..PER_PRODUCER).map(move |i| (p << 32) | i))
            .collect();
        seen.sort_unstable();
        expected.sort_unstable();
        assert_eq!(seen, expected);
        assert_eq!(consumer.pending(), 0);
    }

    /// Degenerate single-slot ring: exactly one write may be in flight, and
    /// a lone producer's values come out in publish order.
    #[test]
    fn capacity_one_ring_neither_overwrites_nor_deadlocks() {
        const COUNT: u64 = 50;

        let names = names("cap1");
        let mut consumer = RingConsumer::<u64>::create(&names, RingConfig::new(1)).unwrap();

        let producer = {
            let names = names.clone();
            thread::spawn(move || {
                let mut producer = RingProducer::<u64>::open(&names).unwrap();
                for i in 0..COUNT {
                    producer.publish(i, &idle()).unwrap();
                }
            })
        };

        for expected in 0..COUNT {
            match consumer.consume(&idle()).unwrap() {
                ConsumeOutcome::Received(v) => assert_eq!(v, expected),
                ConsumeOutcome::Interrupted => panic!("no interruption was requested"),
            }
            assert!(consumer.pending() <= 1);
        }
        producer.join().unwrap();
    }

    /// A producer blocked on `free` because the ring is full must wake up
    /// on shutdown and exit without writing.
    #[test]
    fn shutdown_unblocks_producer_on_full_ring() {
        let names = names("full");
        let mut consumer = RingConsumer::<u64>::create(&names, RingConfig::new(2)).unwrap();

        let producer = {
            let names = names.clone();
            thread::spawn(move || {
                let mut producer = RingProducer::<u64>::open(&names).unwrap();
                let mut published = 0u64;
                loop {
                    match producer.publish(published, &idle()).unwrap() {
                        PublishOutcome::Published => published += 1,
                        PublishOutcome::Shutdown => return published,
                    }
                }
            })
        };

        // Wait until the ring is full and the producer is parked on `free`.
        let deadline = Instant::now() + Duration::from_secs(5);
        while consumer.pending() < 2 {
            assert!(Instant::now() < deadline, "producer never filled the ring");
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(10));

        consumer.request_shutdown().unwrap();
        let published = producer.join().unwrap();

        // Both slots were written before the ring filled; the woken
        // producer observed shutdown and wrote nothing more.
        assert_eq!(published, 2);
        assert_eq!(consumer.pending(), 2);
    }

    /// The wake chain must reach every blocked producer, not just one.
    #[test]
    fn shutdown_drains_all_blocked_producers() {
        const PRODUCERS: usize = 3;

        let names = names("chain");
        let mut consumer = RingConsumer::<u64>::create(&names, RingConfig::new(1)).unwrap();

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let names = names.clone();
                thread::spawn(move || {
                    let mut producer = RingProducer::<u64>::open(&names).unwrap();
                    loop {
                        if let PublishOutcome::Shutdown = producer.publish(7, &idle()).unwrap() {
                            return;
                        }
                    }
                })
            })
            .collect();

        let deadline = Instant::now() + Duration::from_secs(5);
        while consumer.pending() < 1 {
            assert!(Instant::now() < deadline, "ring never filled");
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(10));

        consumer.request_shutdown().unwrap();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(consumer.pending(), 1);
    }

    /// Requesting shutdown twice must be observably identical to once.
    #[test]
    fn shutdown_is_idempotent() {
        let names = names("idem");
        let mut consumer = RingConsumer::<u64>::create(&names, RingConfig::new(4)).unwrap();
        consumer.request_shutdown().unwrap();
        consumer.request_shutdown().unwrap();

        let mut producer = RingProducer::<u64>::open(&names).unwrap();
        assert_eq!(
            producer.publish(1, &idle()).unwrap(),
            PublishOutcome::Shutdown
        );
        assert!(producer.shutdown_requested());
        assert_eq!(consumer.pending(), 0);
    }

    /// A set token short-circuits the consumer instead of blocking forever
    /// on an empty ring.
    #[test]
    fn consume_reports_interruption_when_token_set() {
        let names = names("tok");
        let mut consumer = RingConsumer::<u64>::create(&names, RingConfig::new(4)).unwrap();
        let token = ShutdownToken::new();
        token.set();
        assert!(matches!(
            consumer.consume(&token).unwrap(),
            ConsumeOutcome::Interrupted
        ));
    }

    /// A set token stops a producer before it takes any permit.
    #[test]
    fn publish_honors_local_token() {
        let names = names("ptok");
        let consumer = RingConsumer::<u64>::create(&names, RingConfig::new(4)).unwrap();
        let mut producer = RingProducer::<u64>::open(&names).unwrap();
        let token = ShutdownToken::new();
        token.set();
        assert_eq!(
            producer.publish(5, &token).unwrap(),
            PublishOutcome::Shutdown
        );
        assert_eq!(consumer.pending(), 0);
    }

    /// Opening with a mismatched element type must be rejected up front.
    #[test]
    fn open_rejects_wrong_element_type() {
        let names = names("mism");
        let _consumer = RingConsumer::<u64>::create(&names, RingConfig::new(4)).unwrap();
        let err = RingProducer::<u32>::open(&names).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    /// Opening without a consumer must fail cleanly (the supervisor owns
    /// resource creation).
    #[test]
    fn open_requires_existing_ring() {
        let names = names("none");
        assert!(RingProducer::<u64>::open(&names).is_err());
    }
}
