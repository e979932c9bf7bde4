//! Growable containers for repeated fields.

use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use crate::message::ProtoEnum;

/// Backing storage of a `bytes` field.
pub type ProtoBytes = RepeatedField<u8>;

/// An owned, unboxed sequence of the values of one repeated field.
///
/// Capacity grows to the larger of what was requested and 1.5x the current
/// capacity, and is never released by [`RepeatedField::clear`]. Cleared
/// elements stay allocated past the logical length, so
/// [`RepeatedField::push_recycled`] can hand a string, byte buffer or
/// sub-message back out with its own allocations intact.
pub struct RepeatedField<T> {
    /// `items[..len]` are the values; `items[len..]` are retained for reuse.
    items: Vec<T>,
    len: usize,
}

/// Largest capacity a [`RepeatedField<T>`] may grow to.
#[allow(clippy::as_conversions)]
const fn max_capacity<T>() -> usize {
    let size = core::mem::size_of::<T>();
    let size = if size == 0 { 1 } else { size };
    // Allocations are limited to `isize::MAX` bytes.
    (isize::MAX as usize) / size
}

#[cold]
#[inline(never)]
fn capacity_overflow() -> ! {
    panic!("repeated field capacity overflow")
}

impl<T> RepeatedField<T> {
    pub const fn new() -> Self {
        RepeatedField {
            items: Vec::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        RepeatedField {
            items: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        self.items.capacity() - self.len
    }

    /// Make room for at least `additional` more values.
    ///
    /// # Panics
    /// If the required capacity exceeds what can be allocated.
    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        if additional > self.remaining_capacity() {
            let required = self
                .len
                .checked_add(additional)
                .unwrap_or_else(|| capacity_overflow());
            self.grow_to(required);
        }
    }

    fn grow_to(&mut self, required: usize) {
        let max = max_capacity::<T>();
        if required > max {
            capacity_overflow();
        }
        let current = self.items.capacity();
        let grown = current.saturating_add(current / 2).min(max);
        let new_capacity = required.max(grown);
        self.items.reserve_exact(new_capacity - self.items.len());
    }

    /// Drop the retained elements so `items` ends at the logical length.
    fn discard_retained(&mut self) {
        self.items.truncate(self.len);
    }

    #[inline]
    pub fn add(&mut self, value: T) {
        if self.len < self.items.len() {
            self.items[self.len] = value;
        } else {
            if self.remaining_capacity() == 0 {
                self.reserve(1);
            }
            self.items.push(value);
        }
        self.len += 1;
    }

    /// Append a default value and return it for in-place decoding.
    pub fn push_default(&mut self) -> &mut T
    where
        T: Default,
    {
        self.add(T::default());
        &mut self.items[self.len - 1]
    }

    /// Append an element for in-place decoding, reusing a retained one when
    /// available. A reused element is passed through `reset` first, which
    /// must leave it empty.
    pub fn push_recycled(&mut self, reset: impl FnOnce(&mut T)) -> &mut T
    where
        T: Default,
    {
        if self.len < self.items.len() {
            let slot = &mut self.items[self.len];
            reset(slot);
            self.len += 1;
            return &mut self.items[self.len - 1];
        }
        self.push_default()
    }

    /// Grow the length by `n` default values and return the new tail.
    pub fn add_length(&mut self, n: usize) -> &mut [T]
    where
        T: Default,
    {
        let start = self.len;
        self.discard_retained();
        self.reserve(n);
        self.items.resize_with(start + n, T::default);
        self.len = self.items.len();
        &mut self.items[start..]
    }

    pub fn add_all(&mut self, values: &[T])
    where
        T: Clone,
    {
        self.discard_retained();
        self.reserve(values.len());
        self.items.extend_from_slice(values);
        self.len = self.items.len();
    }

    /// Replace the contents with `values`.
    pub fn copy_from(&mut self, values: &[T])
    where
        T: Clone,
    {
        self.clear();
        self.add_all(values);
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// # Panics
    /// If `index` is out of bounds.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        self.as_mut_slice()[index] = value;
    }

    /// Copy the valid values out into a new `Vec`.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_slice().to_vec()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items[..self.len]
    }

    /// Remove all values, keeping the allocation and the elements themselves
    /// for [`RepeatedField::push_recycled`].
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn into_vec(mut self) -> Vec<T> {
        self.discard_retained();
        self.items
    }
}

impl<T> Default for RepeatedField<T> {
    fn default() -> Self {
        RepeatedField::new()
    }
}

impl<T: Clone> Clone for RepeatedField<T> {
    fn clone(&self) -> Self {
        RepeatedField::from(self.to_vec())
    }
}

impl<T: fmt::Debug> fmt::Debug for RepeatedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: PartialEq> PartialEq for RepeatedField<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for RepeatedField<T> {}

impl<T> Deref for RepeatedField<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for RepeatedField<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> From<Vec<T>> for RepeatedField<T> {
    fn from(items: Vec<T>) -> Self {
        let len = items.len();
        RepeatedField { items, len }
    }
}

impl From<&str> for RepeatedField<u8> {
    fn from(value: &str) -> Self {
        RepeatedField::from(value.as_bytes().to_vec())
    }
}

impl<T> FromIterator<T> for RepeatedField<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        RepeatedField::from(Vec::from_iter(iter))
    }
}

impl<'a, T> IntoIterator for &'a RepeatedField<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

/// Values of a repeated enum field.
///
/// Raw integers are stored as decoded so values unknown to this schema
/// survive a decode/encode cycle. Conversion to `E` happens on access, where
/// unknown values are skipped.
pub struct RepeatedEnum<E> {
    values: RepeatedField<i32>,
    _enum: PhantomData<fn() -> E>,
}

impl<E: ProtoEnum> RepeatedEnum<E> {
    pub const fn new() -> Self {
        RepeatedEnum {
            values: RepeatedField::new(),
            _enum: PhantomData,
        }
    }

    #[inline]
    pub fn add(&mut self, value: E) {
        self.values.add(value.value());
    }

    /// Append a raw value, recognized or not.
    #[inline]
    pub fn add_value(&mut self, value: i32) {
        self.values.add(value);
    }

    /// Returns the value at `index` if it exists and is recognized.
    pub fn get(&self, index: usize) -> Option<E> {
        self.values.get(index).copied().and_then(E::from_i32)
    }

    /// # Panics
    /// If `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: E) {
        self.values.set(index, value.value());
    }

    /// Iterate over the recognized values.
    pub fn iter(&self) -> impl Iterator<Item = E> + '_ {
        self.values.iter().copied().filter_map(E::from_i32)
    }

    /// Raw values, including ones this schema does not recognize.
    #[inline]
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut RepeatedField<i32> {
        &mut self.values
    }

    /// Number of raw values, including unrecognized ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        self.values.remaining_capacity()
    }

    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<E: ProtoEnum> Default for RepeatedEnum<E> {
    fn default() -> Self {
        RepeatedEnum::new()
    }
}

impl<E> Clone for RepeatedEnum<E> {
    fn clone(&self) -> Self {
        RepeatedEnum {
            values: self.values.clone(),
            _enum: PhantomData,
        }
    }
}

impl<E> PartialEq for RepeatedEnum<E> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<E> fmt::Debug for RepeatedEnum<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}
