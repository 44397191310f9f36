//! LRU victim selection
//!
//! Replacement is scoped to the faulting workload's own page table. A
//! workload never loses a frame because another workload faulted.

use crate::page_store::PageTableEntry;
use core_types::PageNumber;

/// Picks the resident page with the smallest `last_used`
///
/// Ties go to the lowest page number. Returns `None` when no page in the
/// table is resident.
pub fn select_lru_victim(entries: &[PageTableEntry]) -> Option<PageNumber> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.is_valid())
        // min_by_key keeps the first minimum, which is the lowest page.
        .min_by_key(|(_, entry)| entry.last_used())
        .map(|(page, _)| page as PageNumber)
}
