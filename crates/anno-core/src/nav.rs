//! Navigation index
//!
//! A page → annotation-ids projection derived on demand from the store's
//! cached collection, with cyclic prev/next traversal. The cursor is an
//! explicit value owned by the session, never by the store: callers pass
//! the current cursor in and get the new one back.

use std::collections::BTreeMap;

use crate::models::Annotation;

/// Position of the "current annotation" within a traversal session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page: u32,
    pub id: i64,
}

/// Page-indexed projection of annotation ids
#[derive(Debug, Default)]
pub struct NavIndex {
    pages: BTreeMap<u32, Vec<i64>>,
}

impl NavIndex {
    /// Build the projection from a collection ordered by page then id
    pub fn build(annotations: &[Annotation]) -> Self {
        let mut pages: BTreeMap<u32, Vec<i64>> = BTreeMap::new();
        for annotation in annotations {
            pages.entry(annotation.page).or_default().push(annotation.id);
        }
        Self { pages }
    }

    /// True when the document has no annotations anywhere
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Annotation ids on one page, in collection order
    pub fn ids_on_page(&self, page: u32) -> &[i64] {
        self.pages.get(&page).map_or(&[], Vec::as_slice)
    }

    /// Advance the cursor forward
    ///
    /// With no cursor, seeds to the first annotation on `page` (or the
    /// nearest later page with annotations, wrapping to the first page)
    /// and returns the seed. With a cursor, steps to the next id on the
    /// same page, or wraps to the first id of the next page group.
    pub fn next(&self, page: u32, cursor: Option<Cursor>) -> Option<Cursor> {
        if self.pages.is_empty() {
            return None;
        }

        let cursor = match cursor.filter(|c| self.contains(c)) {
            Some(c) => c,
            None => return self.seed_forward(page),
        };

        let ids = &self.pages[&cursor.page];
        let index = ids.iter().position(|&id| id == cursor.id)?;
        if index + 1 < ids.len() {
            return Some(Cursor {
                page: cursor.page,
                id: ids[index + 1],
            });
        }

        // Wrap to the first id of the next page group, cyclically
        let next_page = self
            .pages
            .range(cursor.page + 1..)
            .next()
            .or_else(|| self.pages.iter().next())
            .map(|(&p, _)| p)?;
        Some(Cursor {
            page: next_page,
            id: self.pages[&next_page][0],
        })
    }

    /// Advance the cursor backward
    ///
    /// Mirror of [`next`](NavIndex::next): seeds to the first annotation
    /// on `page` or the nearest earlier page (wrapping to the last page);
    /// with a cursor, steps back within the page or wraps to the last id
    /// of the previous page group.
    pub fn prev(&self, page: u32, cursor: Option<Cursor>) -> Option<Cursor> {
        if self.pages.is_empty() {
            return None;
        }

        let cursor = match cursor.filter(|c| self.contains(c)) {
            Some(c) => c,
            None => return self.seed_backward(page),
        };

        let ids = &self.pages[&cursor.page];
        let index = ids.iter().position(|&id| id == cursor.id)?;
        if index > 0 {
            return Some(Cursor {
                page: cursor.page,
                id: ids[index - 1],
            });
        }

        // Wrap to the last id of the previous page group, cyclically
        let prev_page = self
            .pages
            .range(..cursor.page)
            .next_back()
            .or_else(|| self.pages.iter().next_back())
            .map(|(&p, _)| p)?;
        let prev_ids = &self.pages[&prev_page];
        Some(Cursor {
            page: prev_page,
            id: prev_ids[prev_ids.len() - 1],
        })
    }

    fn contains(&self, cursor: &Cursor) -> bool {
        self.pages
            .get(&cursor.page)
            .is_some_and(|ids| ids.contains(&cursor.id))
    }

    fn seed_forward(&self, page: u32) -> Option<Cursor> {
        let (&seed_page, ids) = self
            .pages
            .range(page..)
            .next()
            .or_else(|| self.pages.iter().next())?;
        Some(Cursor {
            page: seed_page,
            id: ids[0],
        })
    }

    fn seed_backward(&self, page: u32) -> Option<Cursor> {
        let (&seed_page, ids) = self
            .pages
            .range(..=page)
            .next_back()
            .or_else(|| self.pages.iter().next_back())?;
        Some(Cursor {
            page: seed_page,
            id: ids[0],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(id: i64, page: u32) -> Annotation {
        Annotation {
            id,
            filehash: "doc".to_string(),
            page,
            title: String::new(),
            body: String::new(),
            body_url: String::new(),
            text_title: String::new(),
            text_creator: String::new(),
            created: 0.0,
            modified: 0.0,
            creator: String::new(),
            annotates: String::new(),
            color: String::new(),
            local: true,
            mimetype: String::new(),
            uuid: String::new(),
            annotation_url: String::new(),
        }
    }

    /// Pages {2, 5, 9}; page 5 has two annotations
    fn index() -> NavIndex {
        NavIndex::build(&[
            annotation(0, 2),
            annotation(1, 5),
            annotation(2, 5),
            annotation(3, 9),
        ])
    }

    #[test]
    fn test_empty_index_navigates_nowhere() {
        let index = NavIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.next(0, None), None);
        assert_eq!(index.prev(7, None), None);
    }

    #[test]
    fn test_seed_on_annotated_page() {
        let index = index();
        assert_eq!(index.next(5, None), Some(Cursor { page: 5, id: 1 }));
        assert_eq!(index.prev(5, None), Some(Cursor { page: 5, id: 1 }));
    }

    #[test]
    fn test_seed_nearest_page() {
        let index = index();
        // Forward from a bare page: nearest later
        assert_eq!(index.next(3, None), Some(Cursor { page: 5, id: 1 }));
        // Backward from a bare page: nearest earlier
        assert_eq!(index.prev(7, None), Some(Cursor { page: 5, id: 1 }));
    }

    #[test]
    fn test_seed_wraps_cyclically() {
        let index = index();
        // No later page: wrap to the first
        assert_eq!(index.next(10, None), Some(Cursor { page: 2, id: 0 }));
        // No earlier page: wrap to the last
        assert_eq!(index.prev(1, None), Some(Cursor { page: 9, id: 3 }));
    }

    #[test]
    fn test_next_within_page_then_across_groups() {
        let index = index();
        let c = index.next(5, None).unwrap();
        let c = index.next(5, Some(c)).unwrap();
        assert_eq!(c, Cursor { page: 5, id: 2 });
        let c = index.next(5, Some(c)).unwrap();
        assert_eq!(c, Cursor { page: 9, id: 3 });
    }

    #[test]
    fn test_next_wraps_from_last_page_to_first() {
        let index = index();
        let last = Cursor { page: 9, id: 3 };
        assert_eq!(index.next(9, Some(last)), Some(Cursor { page: 2, id: 0 }));
    }

    #[test]
    fn test_prev_wraps_to_last_id_of_previous_group() {
        let index = index();
        let first_on_nine = Cursor { page: 9, id: 3 };
        assert_eq!(
            index.prev(9, Some(first_on_nine)),
            Some(Cursor { page: 5, id: 2 })
        );

        let first_anywhere = Cursor { page: 2, id: 0 };
        assert_eq!(
            index.prev(2, Some(first_anywhere)),
            Some(Cursor { page: 9, id: 3 })
        );
    }

    #[test]
    fn test_stale_cursor_reseeds() {
        let index = index();
        // Cursor pointing at a deleted annotation
        let stale = Cursor { page: 5, id: 99 };
        assert_eq!(index.next(5, Some(stale)), Some(Cursor { page: 5, id: 1 }));
    }

    #[test]
    fn test_single_page_wraps_onto_itself() {
        let index = NavIndex::build(&[annotation(4, 3), annotation(5, 3)]);
        let c = Cursor { page: 3, id: 5 };
        assert_eq!(index.next(3, Some(c)), Some(Cursor { page: 3, id: 4 }));
        let c = Cursor { page: 3, id: 4 };
        assert_eq!(index.prev(3, Some(c)), Some(Cursor { page: 3, id: 5 }));
    }
}
