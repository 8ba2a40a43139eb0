//! Page-level composition: which channel and page are shown, which video is
//! open, and how selections are reflected in the query string.

use chrono::{DateTime, Utc};
use url::form_urlencoded;

use crate::models::{Channel, Video};
use crate::resources::{CategoryListing, CategoryView, ChannelConfigResource, ChannelVideosResource};
use crate::scroll::{RestoreOptions, ScrollRestoration, ScrollStore, ScrollTarget};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load channel data";

/// The `channel` / `page` query parameters of the channel page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub channel: Option<String>,
    pub page: Option<u32>,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        let mut query = Query::default();
        let raw = raw.trim_start_matches('?');
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "channel" if !value.is_empty() => query.channel = Some(value.into_owned()),
                "page" => query.page = value.trim().parse().ok(),
                _ => {}
            }
        }
        query
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(channel) = &self.channel {
            serializer.append_pair("channel", channel);
        }
        if let Some(page) = self.page {
            serializer.append_pair("page", &page.to_string());
        }
        serializer.finish()
    }
}

/// Receives navigation side effects. Updates happen in place, without a
/// reload.
pub trait Navigator {
    fn push(&mut self, query: &Query);
    fn scroll_to_top(&mut self) {}
}

/// Records navigation instead of performing it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct History {
    pub entries: Vec<String>,
    pub scrolled_to_top: usize,
}

impl Navigator for History {
    fn push(&mut self, query: &Query) {
        self.entries.push(format!("?{}", query.to_query_string()));
    }

    fn scroll_to_top(&mut self) {
        self.scrolled_to_top += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowserState {
    Loading,
    Failed(String),
    Ready {
        channels: Vec<Channel>,
        active_channel_id: Option<String>,
        page: u32,
        videos: Vec<Video>,
        has_more: bool,
    },
}

pub struct ChannelBrowser {
    config: ChannelConfigResource,
    videos: ChannelVideosResource,
    query: Query,
    channels: Vec<Channel>,
    active_channel_id: Option<String>,
    current_page: u32,
    selected_video: Option<Video>,
    video_error: bool,
}

impl ChannelBrowser {
    pub fn new(config: ChannelConfigResource, videos: ChannelVideosResource, query: Query) -> Self {
        Self {
            config,
            videos,
            query,
            channels: Vec::new(),
            active_channel_id: None,
            current_page: 1,
            selected_video: None,
            video_error: false,
        }
    }

    pub fn active_channel(&self) -> Option<&Channel> {
        let id = self.active_channel_id.as_deref()?;
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn selected_video(&self) -> Option<&Video> {
        self.selected_video.as_ref()
    }

    pub fn video_error(&self) -> bool {
        self.video_error
    }

    /// Re-reads both resources and derives the page state. The first call
    /// that sees channels picks the initial channel from the query.
    pub fn refresh(&mut self) -> BrowserState {
        let config = self.config.load();
        self.channels = config.channels.clone();
        if self.active_channel_id.is_none() && !self.channels.is_empty() {
            self.current_page = self.query.page.filter(|p| *p > 0).unwrap_or(1);
            let from_query = self
                .query
                .channel
                .as_deref()
                .and_then(|name| self.channels.iter().find(|c| c.username == name));
            self.active_channel_id = match from_query {
                Some(channel) => Some(channel.id.clone()),
                None => config
                    .default_channel_id
                    .clone()
                    .or_else(|| self.channels.first().map(|c| c.id.clone())),
            };
        }

        let username = self.active_channel().map(|c| c.username.clone());
        let videos = self.videos.load(username.as_deref(), self.current_page);

        if config.loading || videos.loading {
            return BrowserState::Loading;
        }
        if let Some(error) = videos.error {
            return BrowserState::Failed(error);
        }
        match videos.page {
            Some(page) => BrowserState::Ready {
                channels: self.channels.clone(),
                active_channel_id: self.active_channel_id.clone(),
                page: self.current_page,
                videos: page.videos,
                has_more: videos.has_more,
            },
            None => BrowserState::Failed(LOAD_FAILED_MESSAGE.to_string()),
        }
    }

    /// Unknown ids are ignored.
    pub fn switch_channel(&mut self, channel_id: &str, nav: &mut dyn Navigator) -> bool {
        let Some(channel) = self.channels.iter().find(|c| c.id == channel_id) else {
            return false;
        };
        let query = Query {
            channel: Some(channel.username.clone()),
            page: Some(1),
        };
        self.active_channel_id = Some(channel.id.clone());
        self.current_page = 1;
        nav.push(&query);
        self.query = query;
        true
    }

    pub fn change_page(&mut self, page: u32, nav: &mut dyn Navigator) -> bool {
        let Some(channel) = self.active_channel() else {
            return false;
        };
        let query = Query {
            channel: Some(channel.username.clone()),
            page: Some(page.max(1)),
        };
        self.current_page = page.max(1);
        nav.push(&query);
        nav.scroll_to_top();
        self.query = query;
        true
    }

    pub fn select_video(&mut self, video: Video) {
        self.selected_video = Some(video);
        self.video_error = false;
    }

    pub fn close_video(&mut self) {
        self.selected_video = None;
    }

    pub fn mark_video_error(&mut self) {
        self.video_error = true;
    }

    pub fn refetch(&self) -> bool {
        let username = self.active_channel().map(|c| c.username.as_str());
        self.videos.refetch(username, self.current_page)
    }
}

/// Distance from the bottom, in pixels, at which the next page is requested.
pub const LOAD_MORE_THRESHOLD: u32 = 600;

/// Category page: an infinite listing plus scroll restoration keyed by the
/// category route.
pub struct CategoryBrowser {
    listing: CategoryListing,
    scroll: ScrollRestoration,
    store: ScrollStore,
}

impl CategoryBrowser {
    pub fn new(listing: CategoryListing, store: ScrollStore) -> Self {
        let scroll = ScrollRestoration::new(
            store.clone(),
            Self::route(listing.kind()),
            RestoreOptions::default(),
        );
        Self {
            listing,
            scroll,
            store,
        }
    }

    pub fn route(kind: &str) -> String {
        format!("/category/{kind}")
    }

    /// Loads the listing and, once it has content, hands back the pending
    /// scroll restoration (at most once per mount).
    pub fn refresh(&mut self) -> (CategoryView, Option<ScrollTarget>) {
        let view = self.listing.load();
        let ready = !view.loading && !view.movies.is_empty();
        let target = self.scroll.restore(ready);
        (view, target)
    }

    /// Records the offset and requests the next page near the bottom.
    pub fn on_scroll(&mut self, offset: u32, viewport: u32, content_height: u32) -> bool {
        self.scroll.save(offset);
        let bottom = offset.saturating_add(viewport);
        if bottom.saturating_add(LOAD_MORE_THRESHOLD) >= content_height {
            return self.listing.load_more();
        }
        false
    }

    /// Switches category; the new route starts from the top.
    pub fn switch_category(&mut self, listing: CategoryListing) {
        self.scroll.clear();
        self.scroll = ScrollRestoration::new(
            self.store.clone(),
            Self::route(listing.kind()),
            RestoreOptions::default(),
        );
        self.scroll.clear();
        self.listing = listing;
    }

    pub fn listing_mut(&mut self) -> &mut CategoryListing {
        &mut self.listing
    }

    /// Saves the final offset when the page goes away.
    pub fn close(self, offset: u32) {
        self.scroll.finish(offset);
    }
}

pub fn format_views(views: u64) -> String {
    if views >= 1_000_000 {
        format!("{:.1}M", views as f64 / 1_000_000.0)
    } else if views >= 1_000 {
        format!("{:.1}K", views as f64 / 1_000.0)
    } else {
        views.to_string()
    }
}

/// Relative age of a unix timestamp (seconds).
pub fn format_time_ago(timestamp: i64, now: DateTime<Utc>) -> String {
    let diff = (now.timestamp_millis() - timestamp.saturating_mul(1000)).max(0);
    let minutes = diff / 60_000;
    let hours = diff / 3_600_000;
    let days = diff / 86_400_000;
    let months = diff / 2_592_000_000;
    let years = diff / 31_536_000_000;

    let (count, unit) = if years > 0 {
        (years, "year")
    } else if months > 0 {
        (months, "month")
    } else if days > 0 {
        (days, "day")
    } else if hours > 0 {
        (hours, "hour")
    } else if minutes > 0 {
        (minutes, "minute")
    } else {
        return "just now".to_string();
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{plural} ago")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use crate::clock::ManualClock;
    use crate::data::{CatalogService, MockCatalogService};
    use crate::executor::DeferredExecutor;
    use crate::resources::{Caches, DEFAULT_PAGE_SIZE};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn setup() -> (Caches, DeferredExecutor, Arc<dyn CatalogService>) {
        let executor = DeferredExecutor::new();
        let caches = Caches::new(
            CacheOptions::default(),
            Arc::new(ManualClock::new()),
            Arc::new(executor.clone()),
        );
        (caches, executor, Arc::new(MockCatalogService))
    }

    fn browser(caches: &Caches, service: &Arc<dyn CatalogService>, query: &str) -> ChannelBrowser {
        ChannelBrowser::new(
            ChannelConfigResource::new(caches.config.clone(), service.clone()),
            ChannelVideosResource::new(caches.videos.clone(), service.clone()),
            Query::parse(query),
        )
    }

    fn settle_browser(
        browser: &mut ChannelBrowser,
        caches: &Caches,
        executor: &DeferredExecutor,
    ) -> BrowserState {
        for _ in 0..4 {
            browser.refresh();
            executor.run_all();
            caches.poll();
        }
        browser.refresh()
    }

    #[test]
    fn query_round_trip_and_defaults() {
        let query = Query::parse("?channel=dramabox&page=3&x=1");
        assert_eq!(query.channel.as_deref(), Some("dramabox"));
        assert_eq!(query.page, Some(3));
        assert_eq!(query.to_query_string(), "channel=dramabox&page=3");
        assert_eq!(Query::parse("page=abc"), Query::default());
    }

    #[test]
    fn initial_channel_comes_from_query() {
        let (caches, executor, service) = setup();
        let mut browser = browser(&caches, &service, "channel=dramabox&page=2");
        assert_eq!(browser.refresh(), BrowserState::Loading);
        match settle_browser(&mut browser, &caches, &executor) {
            BrowserState::Ready {
                active_channel_id,
                page,
                videos,
                channels,
                ..
            } => {
                assert_eq!(active_channel_id.as_deref(), Some("drama"));
                assert_eq!(page, 2);
                assert_eq!(videos[0].id, "dramabox-2-1");
                assert_eq!(channels.len(), 2, "inactive channel hidden");
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn unknown_query_channel_uses_default() {
        let (caches, executor, service) = setup();
        let mut browser = browser(&caches, &service, "channel=nobody");
        settle_browser(&mut browser, &caches, &executor);
        assert_eq!(browser.active_channel().map(|c| c.id.as_str()), Some("shorts"));
        assert_eq!(browser.current_page(), 1);
    }

    #[test]
    fn switching_channel_resets_page_and_pushes_query() {
        let (caches, executor, service) = setup();
        let mut browser = browser(&caches, &service, "page=3");
        settle_browser(&mut browser, &caches, &executor);
        let mut history = History::default();

        assert!(!browser.switch_channel("archive", &mut history), "inactive channel");
        assert!(browser.switch_channel("drama", &mut history));
        assert_eq!(browser.current_page(), 1);
        assert_eq!(history.entries, vec!["?channel=dramabox&page=1".to_string()]);

        assert!(browser.change_page(2, &mut history));
        assert_eq!(history.entries[1], "?channel=dramabox&page=2");
        assert_eq!(history.scrolled_to_top, 1);
        match settle_browser(&mut browser, &caches, &executor) {
            BrowserState::Ready { videos, has_more, .. } => {
                assert_eq!(videos[0].id, "dramabox-2-1");
                assert!(has_more);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn page_change_without_channel_is_ignored() {
        let (caches, _executor, service) = setup();
        let mut browser = browser(&caches, &service, "");
        let mut history = History::default();
        assert!(!browser.change_page(2, &mut history));
        assert!(history.entries.is_empty());
    }

    #[test]
    fn missing_page_is_reported() {
        let (caches, executor, service) = setup();
        let mut browser = browser(&caches, &service, "channel=reelshorts&page=9");
        match settle_browser(&mut browser, &caches, &executor) {
            BrowserState::Failed(message) => assert!(message.starts_with("not found")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn video_selection_clears_error() {
        let (caches, _executor, service) = setup();
        let mut browser = browser(&caches, &service, "");
        let video = MockCatalogService.channel_videos("reelshorts", 1).unwrap().videos[0].clone();
        browser.select_video(video.clone());
        browser.mark_video_error();
        assert!(browser.video_error());
        browser.select_video(video);
        assert!(!browser.video_error());
        browser.close_video();
        assert!(browser.selected_video().is_none());
    }

    #[test]
    fn category_browser_restores_once_after_content() {
        let (caches, executor, service) = setup();
        let store = ScrollStore::new();
        store.save(&CategoryBrowser::route("tv"), 1_200);
        let listing = CategoryListing::new(
            caches.categories.clone(),
            service.clone(),
            "tv",
            DEFAULT_PAGE_SIZE,
        );
        let mut page = CategoryBrowser::new(listing, store.clone());

        let (view, target) = page.refresh();
        assert!(view.loading);
        assert_eq!(target, None);
        executor.run_all();
        caches.poll();

        let (view, target) = page.refresh();
        assert_eq!(view.movies.len(), 5);
        assert_eq!(target.map(|t| t.offset), Some(1_200));
        assert_eq!(page.refresh().1, None);

        assert!(page.on_scroll(1_500, 800, 2_000));
        assert!(!page.on_scroll(1_500, 800, 2_000), "page in flight");
        executor.run_all();
        caches.poll();
        let (view, _) = page.refresh();
        assert_eq!(view.movies.len(), 10, "overlapping subject dropped");
        assert_eq!(store.get("/category/tv"), Some(1_500));

        let other =
            CategoryListing::new(caches.categories.clone(), service, "movie", DEFAULT_PAGE_SIZE);
        page.switch_category(other);
        assert_eq!(store.get("/category/tv"), None);
        page.close(40);
        assert_eq!(store.get("/category/movie"), Some(40));
    }

    #[test]
    fn formats_counts_and_ages() {
        assert_eq!(format_views(950), "950");
        assert_eq!(format_views(12_300), "12.3K");
        assert_eq!(format_views(2_500_000), "2.5M");

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ts = now.timestamp();
        assert_eq!(format_time_ago(ts - 10, now), "just now");
        assert_eq!(format_time_ago(ts - 120, now), "2 minutes ago");
        assert_eq!(format_time_ago(ts - 3_600, now), "1 hour ago");
        assert_eq!(format_time_ago(ts - 3 * 86_400, now), "3 days ago");
        assert_eq!(format_time_ago(ts - 400 * 86_400, now), "1 year ago");
    }
}
