//! Incremental renderer: a bounded window over the result buffer.
//!
//! [`IncrementalView`] decides how many buffered items are visible, whether
//! "Load More" is enabled, and whether pressing it reveals buffered items
//! or needs another fetch.

use crate::pipeline::fetcher::FetchStatus;

/// What pressing "Load More" should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// `count` already-buffered items were revealed.
    Revealed {
        /// Number of newly visible items.
        count: usize,
    },
    /// Every buffered item is visible; the next chunk must be fetched.
    NeedsFetch,
    /// A fetch is in flight; the press is ignored.
    Busy,
    /// Everything the backend will hand out is already shown.
    Exhausted,
}

/// Which single state the results region shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    /// No query issued yet.
    Idle,
    /// First chunk of a query is loading.
    Loading,
    /// Inline error panel with a "Try Again" action. `retained` items stay
    /// listed underneath.
    Error {
        /// User-facing message.
        message: String,
        /// Number of visible items kept under the panel.
        retained: usize,
    },
    /// The query matched nothing.
    Empty,
    /// Results are listed.
    Items,
}

/// Window of visible items over the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalView {
    page_size: usize,
    visible: usize,
}

impl IncrementalView {
    /// Creates a view revealing `page_size` items at a time.
    #[must_use]
    pub const fn new(page_size: usize) -> Self {
        Self {
            page_size,
            visible: 0,
        }
    }

    /// Items revealed per step.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of items currently shown, never more than `buffer_len`.
    #[must_use]
    pub fn visible_count(&self, buffer_len: usize) -> usize {
        self.visible.min(buffer_len)
    }

    /// Visible prefix of `buffer`.
    #[must_use]
    pub fn visible<'a, T>(&self, buffer: &'a [T]) -> &'a [T] {
        buffer.get(..self.visible_count(buffer.len())).unwrap_or(buffer)
    }

    /// Resets to the first page after the buffer was replaced.
    pub fn reset(&mut self, buffer_len: usize) {
        self.visible = self.page_size.min(buffer_len);
    }

    /// Shows items that were just appended by a fetch.
    pub fn show_appended(&mut self, added: usize, buffer_len: usize) {
        self.visible = self.visible.saturating_add(added).min(buffer_len);
    }

    /// Returns `true` when "Load More" should be enabled.
    ///
    /// Requires that no fetch is in flight and that more items exist than
    /// are displayed: either hidden buffered items or a backend that
    /// reported more data (`has_more` already accounts for the remote
    /// total when the backend sends one).
    #[must_use]
    pub fn can_load_more(&self, buffer_len: usize, has_more: bool, loading: bool) -> bool {
        matches!(
            self.next_step(buffer_len, has_more, loading),
            LoadMore::Revealed { .. } | LoadMore::NeedsFetch
        )
    }

    /// Decides what a "Load More" press would do, without changing the
    /// view.
    #[must_use]
    pub fn next_step(&self, buffer_len: usize, has_more: bool, loading: bool) -> LoadMore {
        if loading {
            return LoadMore::Busy;
        }
        let shown = self.visible_count(buffer_len);
        if shown < buffer_len {
            return LoadMore::Revealed {
                count: self.page_size.min(buffer_len - shown),
            };
        }
        if has_more {
            LoadMore::NeedsFetch
        } else {
            LoadMore::Exhausted
        }
    }

    /// Handles a "Load More" press.
    pub fn load_more(&mut self, buffer_len: usize, has_more: bool, loading: bool) -> LoadMore {
        let step = self.next_step(buffer_len, has_more, loading);
        if let LoadMore::Revealed { count } = step {
            self.visible = self.visible_count(buffer_len) + count;
        }
        step
    }

    /// Chooses the region state. Error and empty are mutually exclusive.
    #[must_use]
    pub fn region(&self, status: &FetchStatus, buffer_len: usize) -> Region {
        match status {
            FetchStatus::Idle => Region::Idle,
            FetchStatus::Error(message) => Region::Error {
                message: message.clone(),
                retained: self.visible_count(buffer_len),
            },
            FetchStatus::Loading if buffer_len == 0 => Region::Loading,
            FetchStatus::Success if buffer_len == 0 => Region::Empty,
            FetchStatus::Loading | FetchStatus::Success => Region::Items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_shows_first_page() {
        let mut view = IncrementalView::new(12);
        view.reset(40);
        assert_eq!(view.visible_count(40), 12);
        view.reset(5);
        assert_eq!(view.visible_count(5), 5);
    }

    #[test]
    fn buffered_items_are_revealed_before_fetching() {
        let mut view = IncrementalView::new(12);
        view.reset(30);
        assert_eq!(view.load_more(30, false, false), LoadMore::Revealed { count: 12 });
        assert_eq!(view.load_more(30, false, false), LoadMore::Revealed { count: 6 });
        assert_eq!(view.visible_count(30), 30);
        assert_eq!(view.load_more(30, false, false), LoadMore::Exhausted);
    }

    #[test]
    fn fully_shown_buffer_needs_fetch_when_remote_has_more() {
        let mut view = IncrementalView::new(20);
        view.reset(20);
        assert!(view.can_load_more(20, true, false));
        assert_eq!(view.load_more(20, true, false), LoadMore::NeedsFetch);
        view.show_appended(10, 30);
        assert_eq!(view.visible_count(30), 30);
    }

    #[test]
    fn disabled_while_loading_or_exhausted() {
        let mut view = IncrementalView::new(20);
        view.reset(5);
        assert!(!view.can_load_more(5, false, false));
        assert!(!view.can_load_more(5, true, true));
        assert_eq!(view.load_more(5, true, true), LoadMore::Busy);
        assert_eq!(view.load_more(5, false, false), LoadMore::Exhausted);
    }

    #[test]
    fn visible_slice_is_a_prefix() {
        let mut view = IncrementalView::new(2);
        let buffer = [1, 2, 3];
        assert!(view.visible(&buffer).is_empty());
        view.reset(buffer.len());
        assert_eq!(view.visible(&buffer), &[1, 2]);
    }

    #[test]
    fn regions_are_exclusive() {
        let view = IncrementalView::new(10);
        assert_eq!(view.region(&FetchStatus::Idle, 0), Region::Idle);
        assert_eq!(view.region(&FetchStatus::Loading, 0), Region::Loading);
        assert_eq!(view.region(&FetchStatus::Loading, 3), Region::Items);
        assert_eq!(view.region(&FetchStatus::Success, 0), Region::Empty);
        assert_eq!(view.region(&FetchStatus::Success, 3), Region::Items);
        assert_eq!(
            view.region(&FetchStatus::Error("boom".to_string()), 0),
            Region::Error {
                message: "boom".to_string(),
                retained: 0
            }
        );
    }
}
