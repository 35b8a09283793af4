//! Browse state and pagination shared by the CLI views.
use serde::{Deserialize, Serialize};

use crate::model::{ListId, Membership};

pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Pages always shown at the start and at the end of the pager.
pub const EDGE_PAGES: usize = 5;
/// Pages shown on each side of the current one.
pub const AROUND_CURRENT: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Search,
    Categories,
    Favorites,
    About,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseState {
    pub view: View,
    pub search_term: String,
    pub category: Option<String>,
    pub list: Option<Membership>,
    /// Journal whose detail is open, by name.
    pub journal: Option<String>,
    /// 1-based.
    pub page: usize,
}

impl Default for BrowseState {
    fn default() -> Self {
        Self {
            view: View::default(),
            search_term: String::new(),
            category: None,
            list: None,
            journal: None,
            page: 1,
        }
    }
}

impl BrowseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switching views drops every selection and the preserved search term.
    pub fn switch_view(&mut self, view: View) {
        *self = Self {
            view,
            ..Self::default()
        };
    }

    pub fn search(&mut self, term: &str) {
        self.view = View::Search;
        self.search_term = term.to_string();
        self.journal = None;
        self.page = 1;
    }

    pub fn select_category(&mut self, category: &str) {
        self.category = Some(category.to_string());
        self.list = None;
        self.journal = None;
        self.page = 1;
    }

    pub fn select_list(&mut self, id: ListId) {
        self.select_membership(Membership::InList(id));
    }

    pub fn select_uncategorized(&mut self) {
        self.select_membership(Membership::Uncategorized);
    }

    fn select_membership(&mut self, membership: Membership) {
        self.view = View::Favorites;
        self.list = Some(membership);
        self.category = None;
        self.journal = None;
        self.page = 1;
    }

    pub fn open_journal(&mut self, name: &str) {
        self.journal = Some(name.to_string());
    }

    /// Leave the detail view, keeping the list and page underneath.
    pub fn close_journal(&mut self) {
        self.journal = None;
    }

    /// Back to the category or list index of the current view.
    pub fn back_to_index(&mut self) {
        self.category = None;
        self.list = None;
        self.journal = None;
    }

    /// Out-of-range pages are ignored; returns whether the page changed.
    pub fn go_to_page(&mut self, page: usize, total_pages: usize) -> bool {
        if page == 0 || page > total_pages || page == self.page {
            return false;
        }
        self.page = page;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Slice out one page; `page` is clamped into range and a zero `per_page`
/// falls back to [`DEFAULT_PAGE_SIZE`].
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = if per_page == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        per_page
    };
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page);
    let page = page.clamp(1, total_pages.max(1));
    let start = (page - 1) * per_page;
    Page {
        items: items.iter().skip(start).take(per_page).cloned().collect(),
        page,
        per_page,
        total_items,
        total_pages,
    }
}

/// Page numbers to render; `None` marks an ellipsis.
pub fn page_window(current: usize, total: usize) -> Vec<Option<usize>> {
    if total <= EDGE_PAGES * 2 + 1 {
        return (1..=total).map(Some).collect();
    }
    let current = current.clamp(1, total);
    let mut pages: Vec<usize> = (1..=EDGE_PAGES).collect();
    pages.extend(current.saturating_sub(AROUND_CURRENT).max(1)..=(current + AROUND_CURRENT).min(total));
    pages.extend(total + 1 - EDGE_PAGES..=total);
    pages.sort_unstable();
    pages.dedup();

    let mut out = Vec::with_capacity(pages.len() + 2);
    let mut prev = 0;
    for p in pages {
        if p > prev + 1 {
            out.push(None);
        }
        out.push(Some(p));
        prev = p;
    }
    out
}
