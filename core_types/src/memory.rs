//! Virtual memory vocabulary shared by every component
//!
//! A workload addresses memory by virtual page number. Each request it sends
//! to the memory manager is a [`PageAccess`]: either a reference to a page or
//! the terminate sentinel that ends its reference string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual page number
pub type PageNumber = u32;

/// One access issued by a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageAccess {
    /// Reference to a virtual page (may be out of range)
    Reference(PageNumber),
    /// The workload's reference string is exhausted
    Terminate,
}

impl PageAccess {
    /// Returns the referenced page, if this is not the sentinel
    pub fn page(&self) -> Option<PageNumber> {
        match self {
            PageAccess::Reference(page) => Some(*page),
            PageAccess::Terminate => None,
        }
    }

    /// Checks if this is the terminate sentinel
    pub fn is_terminate(&self) -> bool {
        matches!(self, PageAccess::Terminate)
    }
}

impl fmt::Display for PageAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageAccess::Reference(page) => write!(f, "page {}", page),
            PageAccess::Terminate => write!(f, "terminate"),
        }
    }
}

/// A workload's immutable reference string
///
/// Entries at or above `required_pages` are deliberately illegal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceString {
    required_pages: u32,
    pages: Vec<PageNumber>,
}

impl ReferenceString {
    /// Creates a reference string for a workload needing `required_pages`
    pub fn new(required_pages: u32, pages: Vec<PageNumber>) -> Self {
        Self {
            required_pages,
            pages,
        }
    }

    /// Number of pages the workload declares (its `mi`)
    pub fn required_pages(&self) -> u32 {
        self.required_pages
    }

    /// The page references in order
    pub fn pages(&self) -> &[PageNumber] {
        &self.pages
    }

    /// Number of references
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Checks if there are no references
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Counts references outside the declared range
    pub fn illegal_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| **page >= self.required_pages)
            .count()
    }
}

impl fmt::Display for ReferenceString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, page) in self.pages.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", page)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_access_page() {
        assert_eq!(PageAccess::Reference(4).page(), Some(4));
        assert_eq!(PageAccess::Terminate.page(), None);
        assert!(PageAccess::Terminate.is_terminate());
        assert!(!PageAccess::Reference(0).is_terminate());
    }

    #[test]
    fn test_reference_string_illegal_count() {
        let refs = ReferenceString::new(2, vec![0, 1, 5, 1, 2]);
        assert_eq!(refs.len(), 5);
        assert_eq!(refs.illegal_count(), 2);
    }

    #[test]
    fn test_reference_string_display() {
        let refs = ReferenceString::new(3, vec![0, 1, 2, 0]);
        assert_eq!(format!("{}", refs), "0.1.2.0");
    }

    #[test]
    fn test_reference_string_serde() {
        let refs = ReferenceString::new(3, vec![2, 0]);
        let json = serde_json::to_string(&refs).unwrap();
        let back: ReferenceString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, refs);
    }
}
