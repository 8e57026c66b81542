//! Pointer encodings for fields that multiplex flags into address bits.
//!
//! Balanced trees and lock-free lists steal the low bits of an aligned pointer
//! for colour or state flags. Flattening such a field needs the address alone,
//! and the emitted value must carry the flags again. A codec is the pair of
//! pure functions doing that split and join.

/// Split a raw field value into `(address, tag_bits)`.
pub type StripFn = fn(u64) -> (u64, u64);

/// Join an address with previously stripped tag bits.
pub type RestoreFn = fn(u64, u64) -> u64;

/// Strip/restore pair attached to a tagged pointer field.
///
/// Both functions must be total and side-effect-free, and inverse with
/// respect to the tag: `restore(strip(p).0, strip(p).1) == p`.
#[derive(Clone, Copy, Debug)]
pub struct PointerCodec {
    strip: StripFn,
    restore: RestoreFn,
}

impl PointerCodec {
    /// Untagged pointer: the whole value is the address.
    pub const PLAIN: Self = Self {
        strip: strip_plain,
        restore: restore_or,
    };

    /// Tags live in the bits of `MASK` (kernel rb-tree colour uses `0b11`).
    pub const fn low_bits<const MASK: u64>() -> Self {
        Self {
            strip: strip_low::<MASK>,
            restore: restore_low::<MASK>,
        }
    }

    /// Build a codec from arbitrary functions.
    pub const fn new(strip: StripFn, restore: RestoreFn) -> Self {
        Self { strip, restore }
    }

    /// Split `raw` into address and tag bits.
    #[inline]
    pub fn strip(&self, raw: u64) -> (u64, u64) {
        (self.strip)(raw)
    }

    /// Re-encode `tag` onto `address`.
    #[inline]
    pub fn restore(&self, address: u64, tag: u64) -> u64 {
        (self.restore)(address, tag)
    }

    /// The restore half, for callers that relocate images themselves.
    pub fn restore_fn(&self) -> RestoreFn {
        self.restore
    }
}

impl Default for PointerCodec {
    fn default() -> Self {
        Self::PLAIN
    }
}

fn strip_plain(raw: u64) -> (u64, u64) {
    (raw, 0)
}

fn restore_or(address: u64, tag: u64) -> u64 {
    address | tag
}

fn strip_low<const MASK: u64>(raw: u64) -> (u64, u64) {
    (raw & !MASK, raw & MASK)
}

fn restore_low<const MASK: u64>(address: u64, tag: u64) -> u64 {
    address | (tag & MASK)
}
