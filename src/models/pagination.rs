//! Page-number pagination
//!
//! `Paginator` turns a total count and a page size into page numbers the way
//! classic server-rendered listings expect: page 1 always exists (even for an
//! empty list), and a requested page is either valid, not an integer, or
//! empty (out of range).

use serde::Serialize;

/// Why a requested page number could not be served
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPage {
    #[error("That page number is not an integer")]
    NotAnInteger,
    #[error("That page contains no results")]
    Empty,
}

/// Splits `count` items into pages of `per_page`
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: u32) -> Self {
        Self {
            count: count.max(0),
            per_page: i64::from(per_page.max(1)),
        }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    /// Number of pages, never less than one
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Validate a raw `page` query value. A missing value means page 1.
    pub fn validate_number(&self, raw: Option<&str>) -> Result<i64, InvalidPage> {
        let number = match raw {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| InvalidPage::NotAnInteger)?,
        };
        if number < 1 || number > self.num_pages() {
            return Err(InvalidPage::Empty);
        }
        Ok(number)
    }

    /// Lenient variant: a non-integer falls back to the first page and an
    /// out-of-range number to the last.
    pub fn clamp_number(&self, raw: Option<&str>) -> i64 {
        match self.validate_number(raw) {
            Ok(number) => number,
            Err(InvalidPage::NotAnInteger) => 1,
            Err(InvalidPage::Empty) => self.num_pages(),
        }
    }

    /// Row offset of the first item on `number`
    pub fn offset(&self, number: i64) -> i64 {
        (number.max(1) - 1) * self.per_page
    }

    /// Wrap the items fetched for `number` into a `Page`
    pub fn page<T>(&self, number: i64, items: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        let has_next = number < num_pages;
        let has_previous = number > 1;
        let (start_index, end_index) = if self.count == 0 {
            (0, 0)
        } else if number == num_pages {
            (self.offset(number) + 1, self.count)
        } else {
            (self.offset(number) + 1, number * self.per_page)
        };

        Page {
            items,
            number,
            num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next,
            has_previous,
            has_other_pages: has_next || has_previous,
            next_page_number: has_next.then_some(number + 1),
            previous_page_number: has_previous.then_some(number - 1),
            start_index,
            end_index,
        }
    }
}

/// One page of results plus the navigation facts templates need
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub has_other_pages: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
    /// 1-based index of the first item on this page, 0 when empty
    pub start_index: i64,
    pub end_index: i64,
}
