//! Resource adapters over the request cache.
//!
//! Each adapter turns its parameters into a cache key, supplies the fetcher
//! for that key and projects the cache entry into a view-friendly shape.
//! Configuration resources fall back to a built-in value when the backend
//! misbehaves; listing resources report the failure.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Select;
use tracing::warn;

use crate::cache::{CacheOptions, RequestCache, Snapshot};
use crate::clock::Clock;
use crate::data::CatalogService;
use crate::executor::Executor;
use crate::models::{
    CategoryRow, Channel, ChannelConfig, ChannelVideoPage, HeroDetails, HeroMovie, Movie,
    SubjectPage, VodSource, VodSources,
};
use crate::pagination::{InfiniteList, PageFetcher, PageMode};

pub const CONFIG_KEY: &str = "dailymotion-config";
pub const SOURCES_KEY: &str = "vod-sources";
pub const HERO_KEY: &str = "home-hero";
pub const HOME_CATEGORIES_KEY: &str = "home-categories";
pub const TOP250_CATEGORY: &str = "top250";
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// `{data, loading, error}` as every view consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Loadable<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> From<Snapshot<T>> for Loadable<T> {
    fn from(snapshot: Snapshot<T>) -> Self {
        Loadable {
            data: snapshot.data,
            loading: snapshot.loading,
            error: snapshot.error.map(|err| err.to_string()),
        }
    }
}

/// One cache per resource type, shared by every view of the application.
#[derive(Debug, Clone)]
pub struct Caches {
    pub config: RequestCache<ChannelConfig>,
    pub videos: RequestCache<ChannelVideoPage>,
    pub sources: RequestCache<VodSources>,
    pub hero: RequestCache<Vec<HeroMovie>>,
    pub home_rows: RequestCache<Vec<CategoryRow>>,
    pub categories: RequestCache<SubjectPage>,
}

impl Caches {
    pub fn new(options: CacheOptions, clock: Arc<dyn Clock>, executor: Arc<dyn Executor>) -> Self {
        Self {
            config: RequestCache::new(options.clone(), clock.clone(), executor.clone()),
            videos: RequestCache::new(options.clone(), clock.clone(), executor.clone()),
            sources: RequestCache::new(options.clone(), clock.clone(), executor.clone()),
            hero: RequestCache::new(options.clone(), clock.clone(), executor.clone()),
            home_rows: RequestCache::new(options.clone(), clock.clone(), executor.clone()),
            categories: RequestCache::new(options, clock, executor),
        }
    }

    /// Applies completions on every cache. Returns true if anything changed.
    pub fn poll(&self) -> bool {
        // no short-circuit: every cache must drain
        self.config.poll()
            | self.videos.poll()
            | self.sources.poll()
            | self.hero.poll()
            | self.home_rows.poll()
            | self.categories.poll()
    }

    /// Polls, and when nothing has arrived blocks up to `timeout` for the
    /// next completion on any cache.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.poll() {
            return true;
        }
        let mut select = Select::new();
        self.config.watch(&mut select);
        self.videos.watch(&mut select);
        self.sources.watch(&mut select);
        self.hero.watch(&mut select);
        self.home_rows.watch(&mut select);
        self.categories.watch(&mut select);
        // timing out is fine: due retries are fired by the poll below
        let _ = select.ready_timeout(timeout);
        self.poll()
    }

    /// Anything in flight or waiting to retry.
    pub fn is_busy(&self) -> bool {
        self.config.is_busy()
            || self.videos.is_busy()
            || self.sources.is_busy()
            || self.hero.is_busy()
            || self.home_rows.is_busy()
            || self.categories.is_busy()
    }

    pub fn on_focus(&self) -> usize {
        self.config.on_focus()
            + self.videos.on_focus()
            + self.sources.on_focus()
            + self.hero.on_focus()
            + self.home_rows.on_focus()
            + self.categories.on_focus()
    }

    pub fn on_reconnect(&self) -> usize {
        self.config.on_reconnect()
            + self.videos.on_reconnect()
            + self.sources.on_reconnect()
            + self.hero.on_reconnect()
            + self.home_rows.on_reconnect()
            + self.categories.on_reconnect()
    }
}

pub fn default_channel_config() -> ChannelConfig {
    ChannelConfig {
        channels: vec![Channel {
            id: "default".into(),
            username: "kchow125".into(),
            display_name: "KChow125".into(),
            is_active: true,
            created_at: Utc::now().to_rfc3339(),
        }],
        default_channel_id: Some("default".into()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfigView {
    /// Active channels only.
    pub channels: Vec<Channel>,
    pub default_channel_id: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct ChannelConfigResource {
    cache: RequestCache<ChannelConfig>,
    service: Arc<dyn CatalogService>,
}

impl ChannelConfigResource {
    pub fn new(cache: RequestCache<ChannelConfig>, service: Arc<dyn CatalogService>) -> Self {
        Self { cache, service }
    }

    pub fn load(&self) -> ChannelConfigView {
        let service = self.service.clone();
        let snapshot = self
            .cache
            .get_or_fetch(CONFIG_KEY, move |_| Ok(fetch_channel_config(service.as_ref())));
        let loading = snapshot.loading;
        let error = snapshot.error.map(|err| err.to_string());
        let channels: Vec<Channel> = snapshot
            .data
            .as_ref()
            .map(|cfg| cfg.channels.iter().filter(|c| c.is_active).cloned().collect())
            .unwrap_or_default();
        let default_channel_id = snapshot
            .data
            .as_ref()
            .and_then(|cfg| cfg.default_channel_id.clone())
            .filter(|id| !id.is_empty())
            .or_else(|| channels.first().map(|c| c.id.clone()));
        ChannelConfigView {
            channels,
            default_channel_id,
            loading,
            error,
        }
    }

    pub fn refetch(&self) -> bool {
        self.cache.revalidate(CONFIG_KEY)
    }
}

fn fetch_channel_config(service: &dyn CatalogService) -> ChannelConfig {
    match service.channel_config() {
        Ok(envelope) => {
            let code = envelope.code;
            match envelope.into_ok() {
                Some(config) => config,
                None => {
                    warn!(code, "channel config unavailable, using default channel");
                    default_channel_config()
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "channel config request failed, using default channel");
            default_channel_config()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelVideosView {
    pub page: Option<ChannelVideoPage>,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct ChannelVideosResource {
    cache: RequestCache<ChannelVideoPage>,
    service: Arc<dyn CatalogService>,
}

impl ChannelVideosResource {
    pub fn new(cache: RequestCache<ChannelVideoPage>, service: Arc<dyn CatalogService>) -> Self {
        Self { cache, service }
    }

    /// `None` until a channel is known.
    pub fn key(username: Option<&str>, page: u32) -> Option<String> {
        username.map(|name| format!("dailymotion-videos-{name}-{page}"))
    }

    pub fn load(&self, username: Option<&str>, page: u32) -> ChannelVideosView {
        let key = Self::key(username, page);
        let service = self.service.clone();
        let name = username.unwrap_or_default().to_string();
        let snapshot = self
            .cache
            .get_or_fetch_opt(key.as_deref(), move |_| service.channel_videos(&name, page));
        let loadable = Loadable::from(snapshot);
        ChannelVideosView {
            has_more: loadable.data.as_ref().is_some_and(|page| page.has_more),
            page: loadable.data,
            loading: loadable.loading,
            error: loadable.error,
        }
    }

    pub fn refetch(&self, username: Option<&str>, page: u32) -> bool {
        match Self::key(username, page) {
            Some(key) => self.cache.revalidate(&key),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VodSourcesView {
    pub sources: Vec<VodSource>,
    pub selected: Option<VodSource>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct VodSourcesResource {
    cache: RequestCache<VodSources>,
    service: Arc<dyn CatalogService>,
}

impl VodSourcesResource {
    pub fn new(cache: RequestCache<VodSources>, service: Arc<dyn CatalogService>) -> Self {
        Self { cache, service }
    }

    pub fn load(&self) -> VodSourcesView {
        let service = self.service.clone();
        let snapshot = self.cache.get_or_fetch(SOURCES_KEY, move |_| {
            let envelope = service.vod_sources()?;
            Ok(envelope.into_ok().unwrap_or_default())
        });
        let loadable = Loadable::from(snapshot);
        let data = loadable.data.unwrap_or_default();
        VodSourcesView {
            sources: data.sources,
            selected: data.selected,
            loading: loadable.loading,
            error: loadable.error,
        }
    }

    pub fn refetch(&self) -> bool {
        self.cache.revalidate(SOURCES_KEY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HomeView {
    pub categories: Vec<CategoryRow>,
    pub hero_movies: Vec<Movie>,
    pub hero_details: Vec<HeroDetails>,
    /// Tracks the hero banner only; rows may keep loading in the background.
    pub loading: bool,
    pub error: Option<String>,
}

pub struct HomeResource {
    hero: RequestCache<Vec<HeroMovie>>,
    rows: RequestCache<Vec<CategoryRow>>,
    service: Arc<dyn CatalogService>,
}

impl HomeResource {
    pub fn new(
        hero: RequestCache<Vec<HeroMovie>>,
        rows: RequestCache<Vec<CategoryRow>>,
        service: Arc<dyn CatalogService>,
    ) -> Self {
        Self { hero, rows, service }
    }

    pub fn load(&self) -> HomeView {
        let service = self.service.clone();
        let hero = Loadable::from(self.hero.get_or_fetch(HERO_KEY, move |_| service.hero()));
        let service = self.service.clone();
        let rows = Loadable::from(
            self.rows
                .get_or_fetch(HOME_CATEGORIES_KEY, move |_| service.new_content()),
        );

        let heroes = hero.data.unwrap_or_default();
        HomeView {
            categories: rows.data.unwrap_or_default(),
            hero_movies: heroes.iter().map(HeroMovie::to_movie).collect(),
            hero_details: heroes.iter().map(HeroMovie::to_details).collect(),
            loading: hero.loading,
            error: hero.error.or(rows.error),
        }
    }

    pub fn refetch(&self) -> bool {
        let hero = self.hero.revalidate(HERO_KEY);
        let rows = self.rows.revalidate(HOME_CATEGORIES_KEY);
        hero || rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryView {
    pub movies: Vec<Movie>,
    pub loading: bool,
    pub loading_more: bool,
    pub error: Option<String>,
    pub has_more: bool,
}

/// Infinite-scroll listing for one category. `top250` is a single fixed
/// page; every other category pages through the category endpoint.
pub struct CategoryListing {
    kind: String,
    list: InfiniteList<SubjectPage>,
}

impl CategoryListing {
    pub fn new(
        cache: RequestCache<SubjectPage>,
        service: Arc<dyn CatalogService>,
        kind: &str,
        page_size: u32,
    ) -> Self {
        let single = kind == TOP250_CATEGORY;
        let mode = if single { PageMode::Single } else { PageMode::Paged };
        let category = kind.to_string();
        let fetch: PageFetcher<SubjectPage> = Arc::new(move |page| {
            if single {
                service.top250()
            } else {
                service.category(&category, page, page_size)
            }
        });
        Self {
            kind: kind.to_string(),
            list: InfiniteList::new(cache, format!("category-{kind}"), mode, fetch),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn load(&self) -> CategoryView {
        self.list.sync();
        self.view()
    }

    pub fn view(&self) -> CategoryView {
        CategoryView {
            movies: self.list.items().iter().map(Movie::from).collect(),
            loading: self.list.is_loading(),
            loading_more: self.list.is_loading_more(),
            error: self.list.error().map(|err| err.to_string()),
            has_more: self.list.has_more(),
        }
    }

    pub fn load_more(&mut self) -> bool {
        self.list.load_more()
    }

    pub fn refetch(&self) -> bool {
        self.list.refetch()
    }

    pub fn pages_requested(&self) -> u32 {
        self.list.size()
    }
}
