//! Wait-free per-thread change bitmap.
//!
//! Replaces the "concurrent registry of per-thread mutable buffers" pattern
//! with an explicit register-thread protocol plus a barrier-synchronized
//! drain, per the redesign mandated for this kind of structure: each writer
//! thread registers once at startup and receives a [`ThreadHandle`] it owns
//! for the rest of its life; [`ChangeTracker::drain_into`] is only ever
//! called by the single driver thread while every writer is quiesced. That
//! precondition is documented, not dynamically checked — checking it would
//! require exactly the cross-thread synchronization this design exists to
//! avoid.

use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::env::EnvironmentView;

/// A single thread's change bitmap: one bit per cell index.
struct ThreadBitmap {
    words: UnsafeCell<Vec<u64>>,
}

// SAFETY: `words` is mutated only through `ThreadHandle::mark`, which is
// only ever called from the thread that owns the handle wrapping this
// bitmap. `ChangeTracker::drain_into` reads and clears it from the driver
// thread, but only after the caller has upheld the barrier precondition
// (no writer thread is active).
unsafe impl Sync for ThreadBitmap {}

impl ThreadBitmap {
    fn new(cell_count: usize) -> Self {
        let word_count = cell_count.div_ceil(64);
        Self {
            words: UnsafeCell::new(vec![0u64; word_count]),
        }
    }

    #[inline]
    fn set(&self, index: u64) {
        // SAFETY: only the owning thread calls this.
        let words = unsafe { &mut *self.words.get() };
        let word = (index / 64) as usize;
        let bit = index % 64;
        if let Some(slot) = words.get_mut(word) {
            *slot |= 1 << bit;
        }
    }

    /// Merges this bitmap's set bits into `merged`, then clears the bitmap
    /// in place (retaining its backing storage).
    ///
    /// # Safety precondition
    /// Must only be called while the owning writer thread is quiesced.
    fn drain_merge(&self, merged: &mut [u64]) {
        // SAFETY: caller upholds the barrier precondition.
        let words = unsafe { &mut *self.words.get() };
        for (m, w) in merged.iter_mut().zip(words.iter()) {
            *m |= *w;
        }
        words.fill(0);
    }
}

/// A writer thread's handle onto its own bitmap. Obtained once via
/// [`ChangeTracker::register_thread`] and then reused for the thread's
/// entire lifetime; `mark` is wait-free: no atomics, no shared cache line.
#[derive(Clone)]
pub struct ThreadHandle {
    bitmap: Arc<ThreadBitmap>,
}

impl ThreadHandle {
    /// Records that `index` changed. Safe to call from many `ThreadHandle`s
    /// concurrently, each touching only its own bitmap. Marking the same
    /// index twice (even with no net value change) still counts as a
    /// change — the change set is a superset of actual value changes, which
    /// is fine since the delta always carries the final cell value.
    #[inline]
    pub fn mark(&self, index: u64) {
        self.bitmap.set(index);
    }
}

/// Registry of per-thread bitmaps plus the single-threaded drain operation.
pub struct ChangeTracker {
    cell_count: usize,
    bitmaps: parking_lot::Mutex<Vec<Arc<ThreadBitmap>>>,
}

impl ChangeTracker {
    pub fn new(cell_count: usize) -> Self {
        Self {
            cell_count,
            bitmaps: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Registers a new writer thread, returning the handle it should keep
    /// for its entire lifetime. Call once per writer thread at simulation
    /// startup, before the write phase begins.
    pub fn register_thread(&self) -> ThreadHandle {
        let bitmap = Arc::new(ThreadBitmap::new(self.cell_count));
        self.bitmaps.lock().push(Arc::clone(&bitmap));
        ThreadHandle { bitmap }
    }

    /// Merges every registered bitmap's set bits, emits each changed cell's
    /// current `(index, molecule, owner)` into the sinks exactly once, then
    /// clears every bitmap (retaining their backing storage for reuse).
    ///
    /// # Preconditions
    /// No writer thread may be in the mutation path for the duration of this
    /// call — callers must invoke this only at a global barrier, per
    /// spec §5's two-phase scheduling model.
    pub fn drain_into(
        &self,
        env: &dyn EnvironmentView,
        addr_sink: &mut Vec<u64>,
        data_sink: &mut Vec<i32>,
        owner_sink: &mut Vec<i32>,
    ) {
        let word_count = self.cell_count.div_ceil(64);
        let mut merged = vec![0u64; word_count];

        let bitmaps = self.bitmaps.lock();
        for bitmap in bitmaps.iter() {
            bitmap.drain_merge(&mut merged);
        }
        drop(bitmaps);

        for (word_index, &word) in merged.iter().enumerate() {
            let mut bits = word;
            while bits != 0 {
                let bit = bits.trailing_zeros();
                let index = (word_index as u64) * 64 + bit as u64;
                if (index as usize) < self.cell_count {
                    let (molecule, owner) = env.cell_at(index);
                    addr_sink.push(index);
                    data_sink.push(molecule);
                    owner_sink.push(owner);
                }
                bits &= bits - 1;
            }
        }
    }
}
