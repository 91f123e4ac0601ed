/// One window of a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// An entry of the page-number strip; `num == None` renders as an ellipsis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLink {
    pub num: Option<i64>,
    pub current: bool,
}

const LEFT_EDGE: i64 = 2;
const LEFT_CURRENT: i64 = 2;
const RIGHT_CURRENT: i64 = 4;
const RIGHT_EDGE: i64 = 2;

impl Pagination {
    /// `None` when `page` lies outside the listing. Page 1 always exists, even
    /// for an empty listing.
    pub fn new(page: i64, per_page: i64, total: i64) -> Option<Self> {
        if page < 1 || per_page < 1 || total < 0 {
            return None;
        }
        let p = Self {
            page,
            per_page,
            total,
        };
        if page > 1 && page > p.pages() {
            return None;
        }
        Some(p)
    }

    /// Lenient `?page=` parsing: anything that is not an integer means page 1.
    pub fn parse_page(raw: Option<&str>) -> i64 {
        raw.and_then(|s| s.trim().parse().ok()).unwrap_or(1)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn pages(&self) -> i64 {
        (self.total + self.per_page - 1) / self.per_page
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    pub fn prev_num(&self) -> Option<i64> {
        self.has_prev().then_some(self.page - 1)
    }

    pub fn next_num(&self) -> Option<i64> {
        self.has_next().then_some(self.page + 1)
    }

    /// Page numbers to show: both edges, a window around the current page,
    /// and gaps in between.
    pub fn iter_pages(&self) -> Vec<PageLink> {
        let pages_end = self.pages() + 1;
        let mut out = Vec::new();
        if pages_end == 1 {
            return out;
        }
        let push_range = |out: &mut Vec<PageLink>, from: i64, to: i64| {
            for n in from..to {
                out.push(PageLink {
                    num: Some(n),
                    current: n == self.page,
                });
            }
        };
        let gap = PageLink {
            num: None,
            current: false,
        };

        let left_end = (1 + LEFT_EDGE).min(pages_end);
        push_range(&mut out, 1, left_end);
        if left_end == pages_end {
            return out;
        }

        let mid_start = left_end.max(self.page - LEFT_CURRENT);
        let mid_end = (self.page + RIGHT_CURRENT + 1).min(pages_end);
        if mid_start > left_end {
            out.push(gap);
        }
        push_range(&mut out, mid_start, mid_end);
        if mid_end == pages_end {
            return out;
        }

        let right_start = mid_end.max(pages_end - RIGHT_EDGE);
        if right_start > mid_end {
            out.push(gap);
        }
        push_range(&mut out, right_start, pages_end);
        out
    }
}
