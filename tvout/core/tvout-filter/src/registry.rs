//! Shared filter coefficient storage.
//!
//! Every display pipe on the chip reads its coefficients from the same
//! table, so the table is reference counted: the first controller to
//! [`acquire`](CoefficientRegistry::acquire) it allocates it, and the last
//! [`CoefficientTableRef`] to be dropped frees it again.

use alloc::boxed::Box;
use alloc::vec;
use log::{debug, error};
use spin::Mutex;
use thiserror::Error;

use crate::{ScalerFilter, RANGE_MAP_PROFILES};

/// 8 phases x 5 taps, rounded up to a cache line of words.
pub const SLOT_WORDS: usize = 48;

const BASE_SLOTS: usize = ScalerFilter::COUNT;
const MAPPED_SLOTS: usize = ScalerFilter::COUNT * RANGE_MAP_PROFILES as usize;
pub const TABLE_SLOTS: usize = BASE_SLOTS + MAPPED_SLOTS;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TableSlot {
    Base(ScalerFilter),
    RangeMapped { filter: ScalerFilter, profile: u8 },
}

impl TableSlot {
    pub const fn index(&self) -> usize {
        match *self {
            TableSlot::Base(filter) => filter.index(),
            TableSlot::RangeMapped { filter, profile } => {
                BASE_SLOTS + profile as usize * ScalerFilter::COUNT + filter.index()
            }
        }
    }

    /// Byte offset of the slot from the table base, as programmed into the
    /// pipe's coefficient pointer registers.
    pub const fn byte_offset(&self) -> usize {
        self.index() * SLOT_WORDS * core::mem::size_of::<u32>()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{given} coefficients do not fit a {max} word slot", max = SLOT_WORDS)]
    TooManyCoefficients { given: usize },
    #[error("range mapping profile {0} does not exist")]
    BadProfile(u8),
}

pub struct CoefficientTable {
    words: Box<[u32]>,
}

impl CoefficientTable {
    fn new() -> Self {
        Self {
            words: vec![0u32; TABLE_SLOTS * SLOT_WORDS].into_boxed_slice(),
        }
    }

    fn check(slot: TableSlot) -> Result<usize, RegistryError> {
        match slot {
            TableSlot::RangeMapped { profile, .. } if u32::from(profile) >= RANGE_MAP_PROFILES => {
                Err(RegistryError::BadProfile(profile))
            }
            _ => Ok(slot.index() * SLOT_WORDS),
        }
    }

    /// Writes a slot. Words past `coeffs.len()` are zeroed.
    pub fn load(&mut self, slot: TableSlot, coeffs: &[u32]) -> Result<(), RegistryError> {
        if coeffs.len() > SLOT_WORDS {
            return Err(RegistryError::TooManyCoefficients { given: coeffs.len() });
        }
        let start = Self::check(slot)?;
        let dest = &mut self.words[start..start + SLOT_WORDS];
        dest[..coeffs.len()].copy_from_slice(coeffs);
        dest[coeffs.len()..].fill(0);
        Ok(())
    }

    pub fn slot(&self, slot: TableSlot) -> Result<&[u32], RegistryError> {
        let start = Self::check(slot)?;
        Ok(&self.words[start..start + SLOT_WORDS])
    }

    pub fn as_words(&self) -> &[u32] {
        &self.words
    }
}

struct Shared {
    users: usize,
    table: Option<CoefficientTable>,
}

pub struct CoefficientRegistry {
    shared: Mutex<Shared>,
}

/// The table every output controller on the chip shares.
pub static SHARED_COEFFICIENTS: CoefficientRegistry = CoefficientRegistry::new();

impl CoefficientRegistry {
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(Shared { users: 0, table: None }),
        }
    }

    pub fn acquire(&self) -> CoefficientTableRef<'_> {
        let mut shared = self.shared.lock();
        if shared.users == 0 {
            shared.table = Some(CoefficientTable::new());
            debug!(target: "filter", "allocated coefficient table ({} slots)", TABLE_SLOTS);
        }
        shared.users += 1;
        CoefficientTableRef { registry: self }
    }

    pub fn users(&self) -> usize {
        self.shared.lock().users
    }

    pub fn is_allocated(&self) -> bool {
        self.shared.lock().table.is_some()
    }

    fn release(&self) {
        let mut shared = self.shared.lock();
        if shared.users == 0 {
            error!(target: "filter", "coefficient table released more times than acquired");
            return;
        }
        shared.users -= 1;
        if shared.users == 0 {
            shared.table = None;
            debug!(target: "filter", "freed coefficient table");
        }
    }
}

impl Default for CoefficientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A live reference on the shared table. Dropping it releases the reference.
pub struct CoefficientTableRef<'a> {
    registry: &'a CoefficientRegistry,
}

impl CoefficientTableRef<'_> {
    /// Runs `f` with the table locked.
    pub fn with_table<R>(&self, f: impl FnOnce(&mut CoefficientTable) -> R) -> R {
        let mut shared = self.registry.shared.lock();
        // users > 0 while a ref exists, so the table is already there
        let table = shared.table.get_or_insert_with(CoefficientTable::new);
        f(table)
    }

    pub fn load(&self, slot: TableSlot, coeffs: &[u32]) -> Result<(), RegistryError> {
        self.with_table(|table| table.load(slot, coeffs))
    }
}

impl Drop for CoefficientTableRef<'_> {
    fn drop(&mut self) {
        self.registry.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_acquire_allocates_last_release_frees() {
        let registry = CoefficientRegistry::new();
        assert!(!registry.is_allocated());

        let a = registry.acquire();
        assert!(registry.is_allocated());
        let b = registry.acquire();
        assert_eq!(registry.users(), 2);

        drop(a);
        assert!(registry.is_allocated());
        drop(b);
        assert_eq!(registry.users(), 0);
        assert!(!registry.is_allocated());
    }

    #[test]
    fn references_see_each_others_loads() {
        let registry = CoefficientRegistry::new();
        let a = registry.acquire();
        let b = registry.acquire();

        a.load(TableSlot::Base(ScalerFilter::LumaD), &[1, 2, 3]).unwrap();
        b.with_table(|table| {
            let words = table.slot(TableSlot::Base(ScalerFilter::LumaD)).unwrap();
            assert_eq!(&words[..4], &[1, 2, 3, 0]);
        });
    }

    #[test]
    fn table_is_zeroed_after_reallocation() {
        let registry = CoefficientRegistry::new();
        {
            let r = registry.acquire();
            r.load(TableSlot::Base(ScalerFilter::A), &[0xFFFF; SLOT_WORDS]).unwrap();
        }
        let r = registry.acquire();
        r.with_table(|table| assert!(table.as_words().iter().all(|&w| w == 0)));
    }

    #[test]
    fn slots_do_not_overlap() {
        let mut seen = [false; TABLE_SLOTS];
        for filter in ScalerFilter::ALL {
            seen[TableSlot::Base(filter).index()] = true;
            for profile in 0..RANGE_MAP_PROFILES as u8 {
                let idx = TableSlot::RangeMapped { filter, profile }.index();
                assert!(!seen[idx], "slot {idx} reused");
                seen[idx] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(TableSlot::Base(ScalerFilter::B).byte_offset(), SLOT_WORDS * 4);
    }

    #[test]
    fn load_rejects_bad_input() {
        let registry = CoefficientRegistry::new();
        let r = registry.acquire();
        assert_eq!(
            r.load(TableSlot::Base(ScalerFilter::A), &[0; SLOT_WORDS + 1]),
            Err(RegistryError::TooManyCoefficients { given: SLOT_WORDS + 1 })
        );
        assert_eq!(
            r.load(TableSlot::RangeMapped { filter: ScalerFilter::A, profile: 8 }, &[1]),
            Err(RegistryError::BadProfile(8))
        );
    }
}
