//! # Signatures
//!
//! Growable packed bit vector. One signature per live entity records which
//! registered component types it owns; bit `p` belongs to the component
//! registered at position `p`.
//!
//! ## Layout
//!
//! ```text
//! bit index:  0 1 2 3 4 5 6 7 | 8 9 ...
//! byte 0:     MSB ------- LSB | byte 1
//! ```
//!
//! Bits are packed 8 per byte, most significant bit first. Bits of the last
//! byte beyond the logical length are padding and never observable through
//! the bounds-checked accessors.

use std::fmt;

use crate::error::{EcsError, EcsResult};

/// Top bit of a byte, bit offset 0.
const BIT_LEFT: u8 = 0b1000_0000;
/// Every bit clear.
const ALL0: u8 = 0b0000_0000;
/// Every bit set.
const ALL1: u8 = 0b1111_1111;

/// Number of bytes needed to hold `bits` bits.
#[inline]
const fn byte_count(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Mask selecting bit `index` within its byte.
#[inline]
const fn bit_mask(index: usize) -> u8 {
    BIT_LEFT >> (index % 8)
}

/// Packed, growable bit vector.
///
/// Equality compares the logical length and the raw backing bytes, so two
/// signatures with equal visible bits may still differ in stale padding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Logical length in bits.
    bit_size: usize,
    /// Backing bytes, `byte_count(bit_size)` long.
    data: Vec<u8>,
}

impl Signature {
    /// Creates a signature of `len` bits, all false.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self::with_value(len, false)
    }

    /// Creates a signature of `len` bits, all set to `value`.
    #[must_use]
    pub fn with_value(len: usize, value: bool) -> Self {
        let mut signature = Self::default();
        signature.resize(len, value);
        signature
    }

    /// Creates an all-false signature of `len` bits with room for
    /// `capacity` bits before reallocating.
    #[must_use]
    pub fn with_capacity(len: usize, capacity: usize) -> Self {
        let mut signature = Self::default();
        signature.reserve(capacity.max(len));
        signature.resize(len, false);
        signature
    }

    /// Returns the logical length in bits.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bit_size
    }

    /// Returns `true` if the logical length is zero.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bit_size == 0
    }

    /// Returns how many bits fit in the allocated backing storage.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity() * 8
    }

    /// Returns the raw backing bytes, padding included.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn check_index(&self, index: usize) -> EcsResult<()> {
        if index >= self.bit_size {
            return Err(EcsError::BitOutOfRange {
                index,
                len: self.bit_size,
            });
        }
        Ok(())
    }

    /// Sets bit `index` to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::BitOutOfRange`] if `index >= len()`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) -> EcsResult<()> {
        self.check_index(index)?;
        self.write_bit(index, value);
        Ok(())
    }

    /// Returns bit `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::BitOutOfRange`] if `index >= len()`.
    #[inline]
    pub fn get(&self, index: usize) -> EcsResult<bool> {
        self.check_index(index)?;
        Ok(self.read_bit(index))
    }

    #[inline]
    fn read_bit(&self, index: usize) -> bool {
        self.data[index / 8] & bit_mask(index) != 0
    }

    #[inline]
    fn write_bit(&mut self, index: usize, value: bool) {
        let byte = &mut self.data[index / 8];
        if value {
            *byte |= bit_mask(index);
        } else {
            *byte &= !bit_mask(index);
        }
    }

    /// Grows or truncates the logical length.
    ///
    /// On growth every bit in `[old_len, new_len)` takes `value`, including
    /// the bits inside the partially used boundary byte. Bits below the old
    /// length are preserved. On shrink the backing bytes beyond the new
    /// boundary are dropped, but padding bits of the new last byte keep
    /// whatever they held.
    pub fn resize(&mut self, new_len: usize, value: bool) {
        let old_len = self.bit_size;
        let fill = if value { ALL1 } else { ALL0 };

        self.data.resize(byte_count(new_len), fill);
        self.bit_size = new_len;

        if new_len > old_len {
            // Padding of the old boundary byte may hold stale bits.
            let boundary_end = (byte_count(old_len) * 8).min(new_len);
            for index in old_len..boundary_end {
                self.write_bit(index, value);
            }
        }
    }

    /// Preallocates storage for at least `capacity` bits without changing
    /// the logical length.
    pub fn reserve(&mut self, capacity: usize) {
        let wanted = byte_count(capacity);
        if wanted > self.data.len() {
            self.data.reserve(wanted - self.data.len());
        }
    }

    fn check_range(&self, start: usize, end: usize) -> EcsResult<()> {
        if start > end || end >= self.bit_size {
            return Err(EcsError::InvalidBitRange {
                start,
                end,
                len: self.bit_size,
            });
        }
        Ok(())
    }

    /// Reports whether any bit in `[start, end)` equals `target`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidBitRange`] if `start > end` or
    /// `end >= len()`.
    pub fn any(&self, start: usize, end: usize, target: bool) -> EcsResult<bool> {
        self.check_range(start, end)?;
        Ok((start..end).any(|index| self.read_bit(index) == target))
    }

    /// Reports whether every bit in `[start, end)` equals `target`.
    ///
    /// An empty range is vacuously true.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidBitRange`] if `start > end` or
    /// `end >= len()`.
    pub fn all(&self, start: usize, end: usize, target: bool) -> EcsResult<bool> {
        self.check_range(start, end)?;
        Ok((start..end).all(|index| self.read_bit(index) == target))
    }

    /// Sets every backing byte, padding included, to all-`value`.
    pub fn reset(&mut self, value: bool) {
        let fill = if value { ALL1 } else { ALL0 };
        self.data.fill(fill);
    }

    /// Drops every bit and frees the backing storage.
    pub fn clear(&mut self) {
        self.bit_size = 0;
        self.data = Vec::new();
    }

    /// Releases unused backing capacity.
    pub fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
    }

    /// Iterates over every bit in index order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bit_size).map(|index| self.read_bit(index))
    }

    /// Iterates over the indices of set bits in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bit_size).filter(|&index| self.read_bit(index))
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.ones().count()
    }

    /// Returns `true` if every bit set in `other` is also set in `self`.
    ///
    /// Bits of `other` beyond `self.len()` must be clear.
    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        other
            .ones()
            .all(|index| index < self.bit_size && self.read_bit(index))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first_layout() {
        let mut signature = Signature::new(10);
        signature.set(0, true).unwrap();
        signature.set(9, true).unwrap();

        assert_eq!(signature.as_bytes(), &[0b1000_0000, 0b0100_0000]);
        assert_eq!(signature.to_string(), "1000000001");
    }

    #[test]
    fn test_set_get_full_range() {
        let mut signature = Signature::new(0);
        signature.resize(37, false);

        for index in 0..37 {
            signature.set(index, index % 3 == 0).unwrap();
        }
        for index in 0..37 {
            assert_eq!(signature.get(index).unwrap(), index % 3 == 0);
        }
    }

    #[test]
    fn test_out_of_range() {
        let mut signature = Signature::new(8);
        assert_eq!(
            signature.get(8),
            Err(EcsError::BitOutOfRange { index: 8, len: 8 })
        );
        assert!(signature.set(100, true).is_err());
    }

    #[test]
    fn test_grow_preserves_and_fills() {
        let mut signature = Signature::new(10);
        signature.set(9, true).unwrap();
        signature.resize(20, false);

        assert!(signature.get(9).unwrap());
        assert!(signature.all(10, 19, false).unwrap());
        assert!(!signature.get(19).unwrap());
    }

    #[test]
    fn test_grow_with_true_fills_boundary_byte() {
        let mut signature = Signature::new(3);
        signature.set(1, true).unwrap();
        signature.resize(12, true);

        let bits: Vec<bool> = signature.iter().collect();
        assert_eq!(&bits[..3], &[false, true, false]);
        assert!(bits[3..].iter().all(|&bit| bit));
    }

    #[test]
    fn test_grow_overwrites_stale_padding() {
        let mut signature = Signature::new(4);
        signature.reset(true);
        signature.resize(2, false);
        signature.resize(8, false);

        assert!(signature.get(0).unwrap());
        assert!(signature.get(1).unwrap());
        for index in 2..8 {
            assert!(!signature.get(index).unwrap());
        }
    }

    #[test]
    fn test_any_all_ranges() {
        let mut signature = Signature::new(16);
        signature.set(5, true).unwrap();

        assert!(signature.any(0, 8, true).unwrap());
        assert!(!signature.any(6, 15, true).unwrap());
        assert!(signature.all(0, 5, false).unwrap());
        assert!(signature.all(3, 3, true).unwrap());

        assert!(matches!(
            signature.any(9, 4, true),
            Err(EcsError::InvalidBitRange { .. })
        ));
        assert!(signature.all(0, 16, false).is_err());
    }

    #[test]
    fn test_reset_clear_reserve() {
        let mut signature = Signature::new(5);
        signature.reset(true);
        assert_eq!(signature.as_bytes(), &[ALL1]);
        assert_eq!(signature.count_ones(), 5);

        signature.reserve(128);
        assert_eq!(signature.len(), 5);
        assert!(signature.capacity() >= 128);

        signature.clear();
        assert!(signature.is_empty());
        assert!(signature.as_bytes().is_empty());
    }

    #[test]
    fn test_equality_uses_raw_bytes() {
        let a = Signature::new(4);
        let mut b = Signature::new(4);
        assert_eq!(a, b);

        b.set(3, true).unwrap();
        assert_ne!(a, b);
        b.set(3, false).unwrap();
        assert_eq!(a, b);

        assert_ne!(Signature::new(4), Signature::new(5));
    }

    #[test]
    fn test_superset() {
        let mut owner = Signature::new(6);
        owner.set(1, true).unwrap();
        owner.set(4, true).unwrap();

        let mut mask = Signature::new(6);
        mask.set(4, true).unwrap();
        assert!(owner.is_superset_of(&mask));

        mask.set(2, true).unwrap();
        assert!(!owner.is_superset_of(&mask));

        let mut wider = Signature::new(10);
        wider.set(8, true).unwrap();
        assert!(!owner.is_superset_of(&wider));
        assert!(owner.is_superset_of(&Signature::new(10)));
    }
}
