//! Replicated-value primitives: authority-owned values with change
//! tracking, and read-only views handed to everything that merely observes.

use serde::{Deserialize, Serialize};

/// A value whose authoritative copy lives on the server. Writes bump a
/// version and mark the value dirty; the network layer drains dirty flags
/// at the end of each tick and turns them into broadcasts.
///
/// Observers never hold a `Replicated<T>` at all - they receive plain
/// values via broadcasts. On the authority, code that should only read
/// takes a [`ReplicatedView`] so a write is a compile error, not a
/// runtime role check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replicated<T> {
    value: T,
    version: u32,
    dirty: bool,
}

impl<T> Replicated<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            version: 0,
            dirty: false,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn view(&self) -> ReplicatedView<'_, T> {
        ReplicatedView(&self.value)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Authority-only write. Bumps the version and marks the value for
    /// broadcast at the end of the current tick.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.version = self.version.wrapping_add(1);
        self.dirty = true;
    }

    /// Clears and returns the dirty flag. Called once per tick by the
    /// broadcast flush.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

/// Read-only borrow of a replicated value.
#[derive(Debug, Clone, Copy)]
pub struct ReplicatedView<'a, T>(&'a T);

impl<T> std::ops::Deref for ReplicatedView<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0
    }
}

/// Replicated health with clamped mutation. `current` never leaves
/// `[0, max]`, and a depleted pool stays depleted (no resurrection path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    current: Replicated<f32>,
    max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: Replicated::new(max),
            max,
        }
    }

    pub fn current(&self) -> f32 {
        *self.current.get()
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_depleted(&self) -> bool {
        *self.current.get() <= 0.0
    }

    /// Applies damage, clamping at zero. Returns true on the exact
    /// mutation that crossed from alive to depleted, so death effects
    /// fire once and only once.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        if self.is_depleted() {
            return false;
        }
        let next = (self.current() - amount.max(0.0)).clamp(0.0, self.max);
        self.current.set(next);
        next <= 0.0
    }

    /// Heals up to `max`. A depleted pool is not revivable.
    pub fn heal(&mut self, amount: f32) {
        if self.is_depleted() {
            return;
        }
        let next = (self.current() + amount.max(0.0)).clamp(0.0, self.max);
        self.current.set(next);
    }

    pub fn take_dirty(&mut self) -> bool {
        self.current.take_dirty()
    }
}
