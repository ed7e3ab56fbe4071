//! Compensated (Kahan) summation.
//!
//! [`Accumulator`] wraps any additive value together with a running
//! compensation term holding the low-order bits lost by previous additions.
//! The same generic type serves scalar sums (masses, volumes) and 3-vector
//! sums (positions, velocities, gravity).

use std::ops::{Add, Neg, Sub};

use num_traits::Zero;

/// A value plus the rounding error accumulated while producing it.
///
/// After any sequence of [`add`](Accumulator::add) calls, `value()` matches
/// the exact sum rounded once, with error bounded independently of the number
/// of updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator<V> {
    value: V,
    compensation: V,
}

impl<V> Accumulator<V>
where
    V: Copy + Zero + Sub<Output = V>,
{
    pub fn zero() -> Self {
        Self {
            value: V::zero(),
            compensation: V::zero(),
        }
    }

    /// Start from a known value with no accumulated error.
    pub fn new(value: V) -> Self {
        Self {
            value,
            compensation: V::zero(),
        }
    }

    /// Rebuild from serialized parts.
    pub fn from_parts(value: V, compensation: V) -> Self {
        Self {
            value,
            compensation,
        }
    }

    /// Compensated update: fold `input` into the running sum, recovering the
    /// bits the bare addition would round away.
    pub fn add(&mut self, input: V) {
        let y = input - self.compensation;
        let t = self.value + y;
        self.compensation = (t - self.value) - y;
        self.value = t;
    }

    /// Compensated subtraction, as addition of the negation.
    pub fn sub(&mut self, input: V)
    where
        V: Neg<Output = V>,
    {
        self.add(-input);
    }

    /// Plain update of the value, leaving the compensation term untouched.
    /// Used by the non-Kahan integrator variants.
    pub fn add_raw(&mut self, input: V)
    where
        V: Add<Output = V>,
    {
        self.value = self.value + input;
    }

    pub fn value(&self) -> V {
        self.value
    }

    pub fn compensation(&self) -> V {
        self.compensation
    }
}

impl<V> Default for Accumulator<V>
where
    V: Copy + Zero + Sub<Output = V>,
{
    fn default() -> Self {
        Self::zero()
    }
}
