//! Infinite-scroll accumulation over a [`RequestCache`].
//!
//! Each page lives under its own cache key. The list tracks how many pages
//! have been requested and merges their items in page order, keeping the
//! first occurrence of every id.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::{RequestCache, Snapshot};
use crate::error::FetchError;

pub trait Identified {
    fn id(&self) -> &str;
}

pub trait Page: Clone + Send + 'static {
    type Item: Identified + Clone;

    fn items(&self) -> &[Self::Item];

    /// `None` when the page carries no pagination metadata.
    fn has_more(&self) -> Option<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Paged,
    /// Fixed listing (e.g. a top-N chart); never more than one page.
    Single,
}

pub type PageFetcher<P> = Arc<dyn Fn(u32) -> Result<P, FetchError> + Send + Sync>;

/// Concatenates pages in order, dropping any item whose id was already seen.
pub fn merge_unique<'a, I, It>(pages: It) -> Vec<I>
where
    I: Identified + Clone + 'a,
    It: IntoIterator<Item = &'a [I]>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for page in pages {
        for item in page {
            if seen.insert(item.id().to_string()) {
                merged.push(item.clone());
            }
        }
    }
    merged
}

pub struct InfiniteList<P: Page> {
    cache: RequestCache<P>,
    prefix: String,
    mode: PageMode,
    size: u32,
    fetch: PageFetcher<P>,
}

impl<P: Page> InfiniteList<P> {
    pub fn new(
        cache: RequestCache<P>,
        prefix: impl Into<String>,
        mode: PageMode,
        fetch: PageFetcher<P>,
    ) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
            mode,
            size: 1,
            fetch,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Cache key for the zero-based page `index`, or `None` when that page
    /// must not be requested.
    pub fn page_key(&self, index: u32, previous: Option<&P>) -> Option<String> {
        if self.mode == PageMode::Single && index > 0 {
            return None;
        }
        if let Some(previous) = previous {
            if self.mode == PageMode::Paged && !previous.has_more().unwrap_or(false) {
                return None;
            }
        }
        Some(format!("{}-page-{}", self.prefix, index + 1))
    }

    /// Requests the pages up to the cursor that have no data yet. A page is
    /// only requested once the page before it has arrived; pages already
    /// loaded are left alone.
    pub fn sync(&self) {
        self.walk(|key, page| {
            let snapshot = self.cache.snapshot(key);
            if snapshot.data.is_some() {
                return snapshot;
            }
            let fetch = self.fetch.clone();
            let number = page + 1;
            self.cache.get_or_fetch(key, move |_| fetch(number))
        });
    }

    pub fn pages(&self) -> Vec<P> {
        let mut pages = Vec::new();
        self.walk(|key, _| {
            let snapshot = self.cache.snapshot(key);
            if let Some(data) = &snapshot.data {
                pages.push(data.clone());
            }
            snapshot
        });
        pages
    }

    pub fn items(&self) -> Vec<P::Item> {
        let pages = self.pages();
        merge_unique(pages.iter().map(Page::items))
    }

    pub fn has_more(&self) -> bool {
        if self.mode == PageMode::Single {
            return false;
        }
        match self.pages().last() {
            None => true,
            Some(last) => last.has_more().unwrap_or(false),
        }
    }

    pub fn is_validating(&self) -> bool {
        self.snapshots().iter().any(|snap| snap.validating)
    }

    pub fn is_loading(&self) -> bool {
        self.is_validating() && self.pages().is_empty()
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_validating() && !self.pages().is_empty()
    }

    pub fn error(&self) -> Option<FetchError> {
        self.snapshots().into_iter().rev().find_map(|snap| snap.error)
    }

    /// Advances the cursor by one page. Ignored while any page is in flight
    /// or when the last page reported no more data.
    pub fn load_more(&mut self) -> bool {
        if self.is_validating() || !self.has_more() {
            return false;
        }
        self.size += 1;
        self.sync();
        true
    }

    /// Revalidates the first page only; pages already shown stay visible.
    pub fn refetch(&self) -> bool {
        match self.page_key(0, None) {
            Some(key) => self.cache.revalidate(&key),
            None => false,
        }
    }

    fn snapshots(&self) -> Vec<Snapshot<P>> {
        let mut snapshots = Vec::new();
        self.walk(|key, _| {
            let snapshot = self.cache.snapshot(key);
            snapshots.push(snapshot.clone());
            snapshot
        });
        snapshots
    }

    fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&str, u32) -> Snapshot<P>,
    {
        let mut previous: Option<P> = None;
        for index in 0..self.size {
            let Some(key) = self.page_key(index, previous.as_ref()) else {
                break;
            };
            let snapshot = visit(&key, index);
            match snapshot.data {
                Some(data) => previous = Some(data),
                None => break,
            }
        }
    }
}
