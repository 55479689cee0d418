//! Paging criteria and paged result sets for listing operations.

use serde::{Deserialize, Serialize};

/// Requested page of a listing. Page numbers start at 1.
///
/// A `page_size` of 0 means "no limit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub page_number: usize,
    pub page_size: usize,
}

impl SearchCriteria {
    #[must_use]
    pub fn new(page_number: usize, page_size: usize) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    /// Criteria matching every record.
    #[must_use]
    pub fn all() -> Self {
        Self::new(1, 0)
    }

    /// Apply these criteria to an ordered collection.
    ///
    /// `num_results` is always the size of the full collection. A page whose
    /// offset does not fit in `usize` is past the end and comes back empty.
    #[must_use]
    pub fn paginate<T: Clone>(&self, items: &[T]) -> SearchResults<T> {
        let results = if self.page_size == 0 {
            items.to_vec()
        } else {
            match self.page_number.saturating_sub(1).checked_mul(self.page_size) {
                Some(offset) => items
                    .iter()
                    .skip(offset)
                    .take(self.page_size)
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };
        SearchResults {
            num_results: items.len(),
            results,
        }
    }
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self::all()
    }
}

/// One page of results plus the total number of matching records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults<T> {
    pub num_results: usize,
    pub results: Vec<T>,
}

impl<T> SearchResults<T> {
    /// Whether this page holds no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
