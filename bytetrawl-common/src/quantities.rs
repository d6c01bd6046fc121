//! Implements newtypes for byte quantities within the searched content.

use std::ops::{Add, AddAssign, Sub};

/// An absolute byte position within the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AbsoluteOffset(u64);

impl AbsoluteOffset {
    /// The offset of the first byte.
    pub const ZERO: AbsoluteOffset = AbsoluteOffset(0);

    /// The offset as a plain number of bytes.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Determines if this offset points at the start of the content.
    pub fn is_start_of_content(self) -> bool {
        self.0 == 0
    }

    /// Moves the offset by a signed byte delta, clamping at the content start.
    pub fn saturating_add_signed(self, delta: i64) -> AbsoluteOffset {
        AbsoluteOffset(self.0.saturating_add_signed(delta))
    }
}

impl From<u64> for AbsoluteOffset {
    fn from(value: u64) -> AbsoluteOffset {
        AbsoluteOffset(value)
    }
}

impl Add<Len> for AbsoluteOffset {
    type Output = AbsoluteOffset;

    fn add(self, rhs: Len) -> AbsoluteOffset {
        AbsoluteOffset(self.0 + rhs.0)
    }
}

impl AddAssign<Len> for AbsoluteOffset {
    fn add_assign(&mut self, rhs: Len) {
        self.0 += rhs.0;
    }
}

impl Sub<AbsoluteOffset> for AbsoluteOffset {
    type Output = Len;

    fn sub(self, rhs: AbsoluteOffset) -> Len {
        debug_assert!(rhs.0 <= self.0);

        Len(self.0 - rhs.0)
    }
}

impl Sub<Len> for AbsoluteOffset {
    type Output = AbsoluteOffset;

    fn sub(self, rhs: Len) -> AbsoluteOffset {
        debug_assert!(rhs.0 <= self.0);

        AbsoluteOffset(self.0 - rhs.0)
    }
}

/// A length in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Len(u64);

impl Len {
    /// The empty length.
    pub const ZERO: Len = Len(0);

    /// The length as a plain number of bytes.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Determines if the length is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Len {
    fn from(value: u64) -> Len {
        Len(value)
    }
}

impl Add<Len> for Len {
    type Output = Len;

    fn add(self, rhs: Len) -> Len {
        Len(self.0 + rhs.0)
    }
}

impl Sub<Len> for Len {
    type Output = Len;

    fn sub(self, rhs: Len) -> Len {
        debug_assert!(rhs.0 <= self.0);

        Len(self.0 - rhs.0)
    }
}
