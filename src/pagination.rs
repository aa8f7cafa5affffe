//! Cursor-following pagination.
//!
//! [`PaginationWalker`] turns a `fetch(cursor) -> Page` function into a lazy,
//! ordered stream of items. It starts with no cursor, follows `next` until the
//! service stops returning one, and refuses to fetch more than `max_pages`
//! pages so a backend that keeps handing out cursors cannot hang the caller.
//! Retrying failed fetches is the fetch function's business; the walker
//! reports the first failure together with how far it got.

use std::{collections::VecDeque, future::Future};

use futures::{Stream, TryStreamExt, stream};

use crate::{
    config::DEFAULT_MAX_PAGES,
    error::{BoxError, PaginationError},
};

/// One page of results and the cursor of the page after it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    pub next: Option<C>,
}

impl<T, C> Page<T, C> {
    pub fn new(items: Vec<T>, next: Option<C>) -> Self {
        Self { items, next }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationWalker {
    max_pages: usize,
}

impl Default for PaginationWalker {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

enum Cursor<C> {
    Start,
    Next(C),
    Done,
}

struct WalkState<T, C, F> {
    fetch: F,
    cursor: Cursor<C>,
    buffered: VecDeque<T>,
    pages: usize,
    yielded: usize,
}

impl PaginationWalker {
    /// Creates a walker that fetches at most `max_pages` pages per walk.
    /// A bound of zero is raised to one.
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
        }
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Walks the pages produced by `fetch`, yielding items in page order.
    ///
    /// The stream ends after the first page without a next cursor. It yields a
    /// single error and then ends when a fetch fails or when `max_pages` pages
    /// have been fetched and the last one still had a next cursor. Pages are
    /// only fetched as the stream is polled.
    pub fn walk<T, C, E, F, Fut>(self, fetch: F) -> impl Stream<Item = Result<T, PaginationError>>
    where
        F: FnMut(Option<C>) -> Fut,
        Fut: Future<Output = Result<Page<T, C>, E>>,
        E: Into<BoxError>,
    {
        let max_pages = self.max_pages;
        let state = WalkState {
            fetch,
            cursor: Cursor::Start,
            buffered: VecDeque::new(),
            pages: 0,
            yielded: 0,
        };

        stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(item) = state.buffered.pop_front() {
                    state.yielded += 1;
                    return Some((Ok(item), state));
                }

                let cursor = match std::mem::replace(&mut state.cursor, Cursor::Done) {
                    Cursor::Done => return None,
                    Cursor::Start => None,
                    Cursor::Next(cursor) => Some(cursor),
                };

                if state.pages >= max_pages {
                    tracing::warn!(
                        max_pages,
                        items = state.yielded,
                        "pagination bound reached with a next cursor pending"
                    );
                    let err = PaginationError::BoundExceeded {
                        max_pages,
                        items_accumulated: state.yielded,
                    };
                    return Some((Err(err), state));
                }

                match (state.fetch)(cursor).await {
                    Ok(page) => {
                        state.pages += 1;
                        tracing::debug!(
                            page = state.pages,
                            items = page.items.len(),
                            has_next = page.next.is_some(),
                            "fetched page"
                        );
                        state.buffered.extend(page.items);
                        state.cursor = match page.next {
                            Some(next) => Cursor::Next(next),
                            None => Cursor::Done,
                        };
                    }
                    Err(source) => {
                        let err = PaginationError::Fetch {
                            page: state.pages + 1,
                            items_accumulated: state.yielded,
                            source: source.into(),
                        };
                        return Some((Err(err), state));
                    }
                }
            }
        })
    }

    /// Walks all pages and collects the items in order.
    pub async fn collect<T, C, E, F, Fut>(self, fetch: F) -> Result<Vec<T>, PaginationError>
    where
        F: FnMut(Option<C>) -> Fut,
        Fut: Future<Output = Result<Page<T, C>, E>>,
        E: Into<BoxError>,
    {
        self.walk(fetch).try_collect().await
    }
}
