use serde::Serialize;

/// Page size shared by every post feed.
pub const POSTS_PER_PAGE: i64 = 10;

/// Slices a collection of `count` items into pages of `per_page` items.
/// There is always at least one page, even for an empty collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn num_pages(&self) -> i64 {
        ((self.count + self.per_page - 1) / self.per_page).max(1)
    }

    /// Resolves a raw `?page=` value: anything that is not an integer means
    /// the first page, an integer outside `1..=num_pages` means the last one.
    pub fn page_number(&self, raw: Option<&str>) -> i64 {
        let Some(number) = raw.and_then(|value| value.trim().parse::<i64>().ok()) else {
            return 1;
        };
        if (1..=self.num_pages()).contains(&number) {
            number
        } else {
            self.num_pages()
        }
    }

    /// Row offset and limit for the given (already resolved) page number.
    pub fn bounds(&self, number: i64) -> (i64, i64) {
        ((number - 1) * self.per_page, self.per_page)
    }

    pub fn page<T>(&self, number: i64, items: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        Page {
            items,
            number,
            num_pages,
            count: self.count,
            has_next: number < num_pages,
            has_previous: number > 1,
            next_page_number: (number < num_pages).then_some(number + 1),
            previous_page_number: (number > 1).then_some(number - 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_has_one_page() {
        let paginator = Paginator::new(0, 10);
        assert_eq!(paginator.num_pages(), 1);
        assert_eq!(paginator.page_number(None), 1);
        assert_eq!(paginator.page_number(Some("5")), 1);
    }

    #[test]
    fn twelve_items_make_two_pages() {
        let paginator = Paginator::new(12, POSTS_PER_PAGE);
        assert_eq!(paginator.num_pages(), 2);
        assert_eq!(paginator.bounds(1), (0, 10));
        assert_eq!(paginator.bounds(2), (10, 10));
    }

    #[test]
    fn exact_multiple_does_not_add_a_page() {
        assert_eq!(Paginator::new(20, 10).num_pages(), 2);
        assert_eq!(Paginator::new(21, 10).num_pages(), 3);
    }

    #[test]
    fn unparsable_page_falls_back_to_first() {
        let paginator = Paginator::new(35, 10);
        assert_eq!(paginator.page_number(None), 1);
        assert_eq!(paginator.page_number(Some("")), 1);
        assert_eq!(paginator.page_number(Some("abc")), 1);
        assert_eq!(paginator.page_number(Some("2.5")), 1);
    }

    #[test]
    fn out_of_range_page_clamps_to_last() {
        let paginator = Paginator::new(35, 10);
        assert_eq!(paginator.page_number(Some("3")), 3);
        assert_eq!(paginator.page_number(Some("99")), 4);
        assert_eq!(paginator.page_number(Some("0")), 4);
        assert_eq!(paginator.page_number(Some("-1")), 4);
    }

    #[test]
    fn page_metadata() {
        let paginator = Paginator::new(25, 10);

        let first = paginator.page(1, vec![(); 10]);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.next_page_number, Some(2));
        assert_eq!(first.previous_page_number, None);

        let middle = paginator.page(2, vec![(); 10]);
        assert!(middle.has_next && middle.has_previous);

        let last = paginator.page(3, vec![(); 5]);
        assert!(!last.has_next);
        assert_eq!(last.previous_page_number, Some(2));
        assert_eq!(last.len(), 5);
        assert_eq!(last.num_pages, 3);
        assert_eq!(last.count, 25);
    }
}
