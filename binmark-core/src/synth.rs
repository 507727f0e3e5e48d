//! Dynamic structure synthesis.
//!
//! Some records carry no fixed layout: their field sizes depend on the bytes
//! themselves (a NUL-terminated name followed by an aligned checksum, say).
//! A [`LayoutRule`] computes such a layout from a window and the size the
//! container declares for it; [`DynamicStructureSynthesizer`] runs a rule at
//! most once per window and hands out the cached result afterwards.
//!
//! Layout failures are soft. A rule that runs off the end of its window or
//! exceeds the declared size produces no structure at all, never a partial
//! one, and the caller simply skips markup for that record.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DecodeError, Result};
use crate::structure::StructureDescriptor;
use crate::window::{ByteWindow, WindowId};

/// Round `value` up to the next multiple of `alignment`.
///
/// An alignment of 0 or 1 leaves the value unchanged.
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    match value % alignment {
        0 => value,
        rem => value + (alignment - rem),
    }
}

/// Computes a field layout for a variable-length record.
pub trait LayoutRule {
    /// Short name used in logs and in [`DecodeError::MalformedLayout`].
    fn name(&self) -> &'static str;

    /// Lay out the record held in `window`, which the container says is
    /// `declared_size` bytes long.
    fn layout(&self, window: &ByteWindow, declared_size: u64) -> Result<StructureDescriptor>;
}

type CacheKey = (WindowId, u64);

/// Memoizing driver for a [`LayoutRule`].
pub struct DynamicStructureSynthesizer<R> {
    rule: R,
    cache: Mutex<HashMap<CacheKey, Option<Arc<StructureDescriptor>>>>,
}

impl<R: LayoutRule> DynamicStructureSynthesizer<R> {
    pub fn new(rule: R) -> Self {
        Self {
            rule,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    /// Synthesize the structure for `window`, or return the cached result of
    /// an earlier call for the same window. `None` is the absent sentinel.
    pub fn synthesize(
        &self,
        window: &ByteWindow,
        declared_size: u64,
    ) -> Option<Arc<StructureDescriptor>> {
        let key = (window.id(), declared_size);
        let mut cache = self.cache.lock();
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }

        let synthesized = match self.rule.layout(window, declared_size) {
            Ok(structure) => Some(Arc::new(structure)),
            Err(e @ (DecodeError::BoundsViolation { .. } | DecodeError::MalformedLayout { .. })) => {
                log::debug!(
                    "no {} structure at 0x{:X}: {}",
                    self.rule.name(),
                    window.offset(),
                    e
                );
                None
            }
            Err(e) => {
                log::warn!("{} layout failed at 0x{:X}: {}", self.rule.name(), window.offset(), e);
                None
            }
        };
        cache.insert(key, synthesized.clone());
        synthesized
    }

    /// Number of windows laid out so far.
    pub fn cached_windows(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::structure::DataKind;
    use crate::window::Endianness;

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(13, 4), 16);
        assert_eq!(align_up(7, 1), 7);
        assert_eq!(align_up(7, 0), 7);
    }

    #[test]
    fn align_up_is_idempotent() {
        for x in 0..4096u64 {
            let once = align_up(x, 4);
            assert_eq!(align_up(once, 4), once, "x={x}");
            assert!(once >= x && once - x < 4);
        }
    }

    /// Lays out the whole window as one byte field and counts invocations.
    struct CountingRule {
        calls: Cell<usize>,
    }

    impl LayoutRule for CountingRule {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn layout(&self, window: &ByteWindow, declared_size: u64) -> Result<StructureDescriptor> {
            self.calls.set(self.calls.get() + 1);
            if window.len() > declared_size {
                return Err(DecodeError::malformed("counting", window.len(), declared_size));
            }
            Ok(StructureDescriptor::builder("blob")
                .field("data", DataKind::Bytes, window.len())
                .build())
        }
    }

    #[test]
    fn synthesizes_once_per_window() {
        let synth = DynamicStructureSynthesizer::new(CountingRule { calls: Cell::new(0) });
        let w = ByteWindow::new(vec![0u8; 8], Endianness::Little);

        let first = synth.synthesize(&w, 8).unwrap();
        let second = synth.synthesize(&w.clone(), 8).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(synth.rule().calls.get(), 1);

        let other = ByteWindow::new(vec![0u8; 8], Endianness::Little);
        let third = synth.synthesize(&other, 8).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(synth.rule().calls.get(), 2);
        assert_eq!(synth.cached_windows(), 2);
    }

    #[test]
    fn absence_is_cached_too() {
        let synth = DynamicStructureSynthesizer::new(CountingRule { calls: Cell::new(0) });
        let w = ByteWindow::new(vec![0u8; 8], Endianness::Little);
        assert!(synth.synthesize(&w, 4).is_none());
        assert!(synth.synthesize(&w, 4).is_none());
        assert_eq!(synth.rule().calls.get(), 1);
    }
}
