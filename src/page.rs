//! Pagination of listings.
use gotham::state::{FromState, State};
use gotham_derive::{StateData, StaticResponseExtender};

/// The `?page=N` query string of a listing. Pages are numbered from 1.
#[derive(Deserialize, StateData, StaticResponseExtender, Clone, Copy, Debug, Default)]
pub struct PageQuery {
    pub page: Option<i64>,
}

impl PageQuery {
    pub fn number(&self) -> i64 {
        self.page.unwrap_or(1)
    }
}

/// The page number asked for by the request, 1 if none was.
pub fn requested(state: &State) -> i64 {
    PageQuery::try_borrow_from(state)
        .map(PageQuery::number)
        .unwrap_or(1)
}

/// One page of a listing.
#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// The current page number, starting at 1
    pub number: i64,
    /// Total number of pages, at least 1
    pub pages: i64,
    /// Total number of items across all pages
    pub total: i64,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.pages
    }

    pub fn previous(&self) -> i64 {
        self.number - 1
    }

    pub fn next(&self) -> i64 {
        self.number + 1
    }
}

/// Limit and offset of a page in a listing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub number: i64,
    pub pages: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Window {
    /// Locates page `number` of a listing with `total` items. Returns `None` if the page doesn't
    /// exist. The first page always exists, even when the listing is empty.
    pub fn new(number: i64, per_page: i64, total: i64) -> Option<Window> {
        let per_page = per_page.max(1);
        let pages = ((total + per_page - 1) / per_page).max(1);
        if number < 1 || number > pages {
            return None;
        }
        Some(Window {
            number,
            pages,
            limit: per_page,
            offset: (number - 1) * per_page,
        })
    }

    pub fn page<T>(&self, items: Vec<T>, total: i64) -> Page<T> {
        Page {
            items,
            number: self.number,
            pages: self.pages,
            total,
        }
    }
}
