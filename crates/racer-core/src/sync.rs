use crate::command::SetpointKind;
use crate::hal::InFlightGuards;
use crate::state::RaceSnapshot;
use std::cell::UnsafeCell;
use std::sync::atomic::{fence, AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerSample {
    pub timestamp_ms: u64,
    pub watts: f64,
}

/// A validated command waiting for the bridge. `seq` 0 means empty.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PendingCommand {
    pub seq: u64,
    pub value: f64,
}

/// Single-writer, multi-reader slot rotation. A slot is only rewritten on
/// the third write after it was published, so a reader retries when two or
/// more writes completed while it was copying.
struct TripleBuffer<T: Copy + Default> {
    slots: [UnsafeCell<T>; 3],
    index: AtomicUsize,
    writes: AtomicU64,
}

unsafe impl<T: Copy + Default + Send> Send for TripleBuffer<T> {}
unsafe impl<T: Copy + Default + Sync> Sync for TripleBuffer<T> {}

impl<T: Copy + Default> TripleBuffer<T> {
    fn new() -> Self {
        let slots = std::array::from_fn(|_| UnsafeCell::new(T::default()));
        Self {
            slots,
            index: AtomicUsize::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Must only be called from one thread per buffer.
    fn write(&self, value: T) {
        let current = self.index.load(Ordering::Relaxed);
        let next = (current + 1) % 3;
        unsafe {
            *self.slots[next].get() = value;
        }
        self.index.store(next, Ordering::Release);
        self.writes.fetch_add(1, Ordering::Release);
    }

    fn read(&self) -> T {
        loop {
            let before = self.writes.load(Ordering::Acquire);
            let idx = self.index.load(Ordering::Acquire);
            let value = unsafe { std::ptr::read_volatile(self.slots[idx].get()) };
            fence(Ordering::Acquire);
            if self.writes.load(Ordering::Relaxed).wrapping_sub(before) < 2 {
                return value;
            }
            std::hint::spin_loop();
        }
    }
}

/// Lock-free hand-off between the race loop and the bridge thread.
pub struct StateExchange {
    snapshot: TripleBuffer<RaceSnapshot>,
    power: TripleBuffer<PowerSample>,
    grade_command: TripleBuffer<PendingCommand>,
    power_command: TripleBuffer<PendingCommand>,
    command_seq: AtomicU64,
    guards: InFlightGuards,
    client_connected: AtomicBool,
    max_power_age_ms: u64,
}

impl StateExchange {
    pub fn new(max_power_age_ms: u64) -> Self {
        Self {
            snapshot: TripleBuffer::new(),
            power: TripleBuffer::new(),
            grade_command: TripleBuffer::new(),
            power_command: TripleBuffer::new(),
            command_seq: AtomicU64::new(0),
            guards: InFlightGuards::new(),
            client_connected: AtomicBool::new(false),
            max_power_age_ms,
        }
    }

    /// Called by the race loop every frame (non-blocking)
    pub fn publish_snapshot(&self, snapshot: RaceSnapshot) {
        self.snapshot.write(snapshot);
    }

    /// Called by the bridge thread
    pub fn read_snapshot(&self) -> RaceSnapshot {
        self.snapshot.read()
    }

    /// Called by the bridge thread for each power notification
    pub fn submit_power(&self, sample: PowerSample) {
        self.power.write(sample);
    }

    /// Latest power sample, or `None` when none arrived or it went stale.
    pub fn latest_power(&self, now_ms: u64) -> Option<PowerSample> {
        let sample = self.power.read();
        let age = now_ms.saturating_sub(sample.timestamp_ms);
        if sample.timestamp_ms == 0 || age > self.max_power_age_ms {
            None
        } else {
            Some(sample)
        }
    }

    fn command_slot(&self, kind: SetpointKind) -> &TripleBuffer<PendingCommand> {
        match kind {
            SetpointKind::Grade => &self.grade_command,
            SetpointKind::TargetPower => &self.power_command,
        }
    }

    /// Queues a command for the bridge unless one of the same kind is still
    /// in flight. Returns the sequence number when accepted.
    pub fn submit_command(&self, kind: SetpointKind, value: f64) -> Option<u64> {
        if !self.guards.try_acquire(kind) {
            return None;
        }
        let seq = self.command_seq.fetch_add(1, Ordering::AcqRel) + 1;
        self.command_slot(kind).write(PendingCommand { seq, value });
        Some(seq)
    }

    /// Latest command of `kind`, for the bridge to forward once per `seq`.
    pub fn pending_command(&self, kind: SetpointKind) -> PendingCommand {
        self.command_slot(kind).read()
    }

    /// Called by the bridge when the companion acknowledges (or fails) a
    /// command.
    pub fn complete_command(&self, kind: SetpointKind) {
        self.guards.release(kind);
    }

    pub fn is_in_flight(&self, kind: SetpointKind) -> bool {
        self.guards.is_in_flight(kind)
    }

    pub fn set_client_connected(&self, connected: bool) {
        self.client_connected.store(connected, Ordering::Release);
        if !connected {
            // Outstanding commands will never be acknowledged.
            self.guards.release_all();
        }
    }

    pub fn client_connected(&self) -> bool {
        self.client_connected.load(Ordering::Acquire)
    }
}
