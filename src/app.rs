use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use crate::api;
use crate::clock::SystemClock;
use crate::config::{self, Config};
use crate::data::{CatalogService, MockCatalogService};
use crate::executor::ThreadExecutor;
use crate::logging;
use crate::resources::{
    Caches, CategoryListing, ChannelConfigResource, ChannelVideosResource, HomeResource,
    VodSourcesResource,
};
use crate::scroll::ScrollStore;
use crate::view::{
    format_time_ago, format_views, BrowserState, CategoryBrowser, ChannelBrowser, Query,
};

const IDLE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub config_file: Option<PathBuf>,
    pub offline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Channels,
    Videos { channel: Option<String>, page: Option<u32> },
    Category { kind: String, pages: u32 },
    Sources,
    Home,
}

/// Splits arguments into global options and the command.
pub fn parse_args<I>(args: I) -> Result<(Options, Command)>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut positional = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--offline" => options.offline = true,
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                options.config_file = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            _ => positional.push(arg),
        }
    }
    let command = Command::parse(&positional)?;
    Ok((options, command))
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            bail!("missing command; try --help");
        };
        let command = match name.as_str() {
            "channels" => Command::Channels,
            "videos" => Command::Videos {
                channel: rest.first().cloned(),
                page: rest
                    .get(1)
                    .map(|raw| parse_number(raw, "page"))
                    .transpose()?,
            },
            "category" => {
                let kind = rest.first().context("category requires a type")?.clone();
                let pages = rest
                    .get(1)
                    .map(|raw| parse_number(raw, "pages"))
                    .transpose()?
                    .unwrap_or(1);
                Command::Category { kind, pages }
            }
            "sources" => Command::Sources,
            "home" => Command::Home,
            other => bail!("unknown command {other}"),
        };
        Ok(command)
    }
}

fn parse_number(raw: &str, what: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(0) | Err(_) => bail!("{what} must be a positive number, got {raw:?}"),
        Ok(n) => Ok(n),
    }
}

pub fn run<I>(args: I) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    let (options, command) = parse_args(args)?;
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    logging::init(&cfg.log.level);

    let app = App::new(cfg, options.offline)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    app.execute(&command, &mut out)
}

/// Application root: owns the caches and the scroll store that every view
/// shares.
pub struct App {
    config: Config,
    service: Arc<dyn CatalogService>,
    caches: Caches,
    scroll: ScrollStore,
}

impl App {
    pub fn new(config: Config, offline: bool) -> Result<Self> {
        let service: Arc<dyn CatalogService> = if offline {
            info!("using built-in offline catalog");
            Arc::new(MockCatalogService)
        } else {
            let client = api::Client::new(api::ClientConfig {
                base_url: config.api.base_url.clone(),
                user_agent: config.api.user_agent.clone(),
                timeout: config.api.timeout,
                http_client: None,
            })?;
            info!(base_url = client.base_url(), "using catalog backend");
            Arc::new(client)
        };
        Ok(Self::with_service(config, service))
    }

    pub fn with_service(config: Config, service: Arc<dyn CatalogService>) -> Self {
        let caches = Caches::new(
            config.cache.to_options(),
            Arc::new(SystemClock),
            Arc::new(ThreadExecutor),
        );
        Self {
            config,
            service,
            caches,
            scroll: ScrollStore::new(),
        }
    }

    pub fn execute<W: Write>(&self, command: &Command, out: &mut W) -> Result<()> {
        debug!(?command, "executing");
        match command {
            Command::Channels => self.channels(out),
            Command::Videos { channel, page } => self.videos(channel.clone(), *page, out),
            Command::Category { kind, pages } => self.category(kind, *pages, out),
            Command::Sources => self.sources(out),
            Command::Home => self.home(out),
        }
    }

    fn channels<W: Write>(&self, out: &mut W) -> Result<()> {
        let resource = ChannelConfigResource::new(self.caches.config.clone(), self.service.clone());
        let view = self.settle(|| resource.load(), |view| !view.loading)?;
        for channel in &view.channels {
            let marker = if view.default_channel_id.as_deref() == Some(channel.id.as_str()) {
                '*'
            } else {
                ' '
            };
            writeln!(out, "{marker} {}\t{}", channel.username, channel.display_name)?;
        }
        Ok(())
    }

    fn videos<W: Write>(
        &self,
        channel: Option<String>,
        page: Option<u32>,
        out: &mut W,
    ) -> Result<()> {
        let mut browser = ChannelBrowser::new(
            ChannelConfigResource::new(self.caches.config.clone(), self.service.clone()),
            ChannelVideosResource::new(self.caches.videos.clone(), self.service.clone()),
            Query { channel, page },
        );
        let state = self.settle(|| browser.refresh(), |state| *state != BrowserState::Loading)?;
        match state {
            BrowserState::Ready {
                channels,
                active_channel_id,
                page,
                videos,
                has_more,
            } => {
                if let Some(channel) = channels
                    .iter()
                    .find(|c| Some(c.id.as_str()) == active_channel_id.as_deref())
                {
                    writeln!(out, "{} (@{}) page {page}", channel.display_name, channel.username)?;
                }
                let now = Utc::now();
                for video in &videos {
                    writeln!(
                        out,
                        "{}\t{}\t{} views\t{}",
                        video.id,
                        video.title,
                        format_views(video.view_count),
                        format_time_ago(video.created_timestamp, now)
                    )?;
                }
                if has_more {
                    writeln!(out, "more: page {}", page + 1)?;
                }
                Ok(())
            }
            BrowserState::Failed(message) => bail!("{message}"),
            BrowserState::Loading => bail!("timed out loading videos"),
        }
    }

    fn category<W: Write>(&self, kind: &str, pages: u32, out: &mut W) -> Result<()> {
        let listing = CategoryListing::new(
            self.caches.categories.clone(),
            self.service.clone(),
            kind,
            self.config.category.page_size,
        );
        let mut browser = CategoryBrowser::new(listing, self.scroll.clone());
        let mut view = self.settle(|| browser.refresh().0, |view| !view.loading)?;
        for _ in 1..pages {
            if !browser.listing_mut().load_more() {
                break;
            }
            view = self.settle(|| browser.refresh().0, |view| !view.loading_more)?;
        }
        if view.movies.is_empty() {
            if let Some(error) = view.error {
                bail!("{error}");
            }
        }
        for movie in &view.movies {
            let rate = if movie.rate.is_empty() { "-" } else { movie.rate.as_str() };
            writeln!(out, "{}\t{}\t{rate}", movie.id, movie.title)?;
        }
        Ok(())
    }

    fn sources<W: Write>(&self, out: &mut W) -> Result<()> {
        let resource = VodSourcesResource::new(self.caches.sources.clone(), self.service.clone());
        let view = self.settle(|| resource.load(), |view| !view.loading)?;
        if view.sources.is_empty() {
            if let Some(error) = view.error {
                bail!("{error}");
            }
        }
        let selected = view.selected.as_ref().map(|s| s.key.as_str());
        for source in &view.sources {
            let marker = if Some(source.key.as_str()) == selected { '*' } else { ' ' };
            writeln!(out, "{marker} {}\t{}\t{}", source.key, source.name, source.api)?;
        }
        Ok(())
    }

    fn home<W: Write>(&self, out: &mut W) -> Result<()> {
        let home = HomeResource::new(
            self.caches.hero.clone(),
            self.caches.home_rows.clone(),
            self.service.clone(),
        );
        let view = self.settle(|| home.load(), |view| !view.loading)?;
        if view.hero_movies.is_empty() && view.categories.is_empty() {
            if let Some(error) = view.error {
                bail!("{error}");
            }
        }
        for (movie, details) in view.hero_movies.iter().zip(&view.hero_details) {
            writeln!(out, "* {}\t{}\t{}", movie.title, movie.rate, details.genres.join(", "))?;
        }
        for row in &view.categories {
            writeln!(out, "[{}]", row.name)?;
            for subject in &row.data {
                writeln!(out, "  {}\t{}", subject.id, subject.title)?;
            }
        }
        Ok(())
    }

    /// Re-reads a view until it is ready and no fetch or retry is
    /// outstanding.
    fn settle<V>(&self, mut load: impl FnMut() -> V, ready: impl Fn(&V) -> bool) -> Result<V> {
        let deadline = Instant::now() + self.budget();
        loop {
            let view = load();
            if ready(&view) && !self.caches.is_busy() {
                return Ok(view);
            }
            if Instant::now() >= deadline {
                bail!("timed out waiting for {}", self.config.api.base_url);
            }
            self.caches.wait(IDLE);
        }
    }

    /// Upper bound for one resource: every attempt timing out plus the
    /// delays between them.
    fn budget(&self) -> Duration {
        let cache = &self.config.cache;
        let attempts = cache.max_retries.saturating_add(1);
        self.config.api.timeout.saturating_mul(attempts)
            + cache.retry_delay.saturating_mul(cache.max_retries)
            + Duration::from_secs(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::{
        CategoryRow, ChannelConfig, ChannelVideoPage, Envelope, HeroMovie, SubjectPage, VodSources,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn offline() -> App {
        App::with_service(Config::default(), Arc::new(MockCatalogService))
    }

    fn output(app: &App, command: Command) -> String {
        let mut buf = Vec::new();
        app.execute(&command, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn parses_commands_and_flags() {
        let (options, command) = parse_args(args(&[
            "--offline",
            "--config",
            "/tmp/r.yaml",
            "videos",
            "dramabox",
            "2",
        ]))
        .unwrap();
        assert!(options.offline);
        assert_eq!(options.config_file, Some(PathBuf::from("/tmp/r.yaml")));
        assert_eq!(
            command,
            Command::Videos {
                channel: Some("dramabox".into()),
                page: Some(2)
            }
        );
        assert_eq!(
            Command::parse(&args(&["category", "tv"])).unwrap(),
            Command::Category {
                kind: "tv".into(),
                pages: 1
            }
        );
        assert!(Command::parse(&args(&["category"])).is_err());
        assert!(Command::parse(&args(&["videos", "x", "0"])).is_err());
        assert!(Command::parse(&[]).is_err());
        assert!(parse_args(args(&["--bogus", "home"])).is_err());
    }

    #[test]
    fn lists_active_channels_with_default_marked() {
        let out = output(&offline(), Command::Channels);
        assert_eq!(out, "* reelshorts\tReel Shorts\n  dramabox\tDrama Box\n");
    }

    #[test]
    fn prints_requested_video_page() {
        let out = output(
            &offline(),
            Command::Videos {
                channel: Some("dramabox".into()),
                page: Some(3),
            },
        );
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("Drama Box (@dramabox) page 3"));
        assert!(lines.next().unwrap().starts_with("dramabox-3-1\tdramabox episode 9\t1.5K views"));
        assert!(!out.contains("more:"));
    }

    #[test]
    fn category_walks_requested_pages() {
        let out = output(
            &offline(),
            Command::Category {
                kind: "tv".into(),
                pages: 2,
            },
        );
        assert_eq!(out.lines().count(), 10);
        assert!(out.starts_with("tv-0\ttv title 1\t6.0\n"));
    }

    #[test]
    fn sources_and_home_render() {
        let app = offline();
        assert!(output(&app, Command::Sources).starts_with("* primary\tPrimary\t"));
        let home = output(&app, Command::Home);
        assert!(home.starts_with("* Featured drama 1\t8.5\tdrama\n"));
        assert!(home.contains("[movie]\n  movie-0\tmovie title 1\n"));
    }

    /// Backend whose video endpoint fails once with a server error.
    #[derive(Default)]
    struct Flaky {
        video_calls: AtomicUsize,
    }

    impl CatalogService for Flaky {
        fn channel_config(&self) -> Result<Envelope<ChannelConfig>, FetchError> {
            MockCatalogService.channel_config()
        }

        fn channel_videos(
            &self,
            username: &str,
            page: u32,
        ) -> Result<ChannelVideoPage, FetchError> {
            if self.video_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(FetchError::status(503, "warming up"));
            }
            MockCatalogService.channel_videos(username, page)
        }

        fn category(&self, kind: &str, page: u32, limit: u32) -> Result<SubjectPage, FetchError> {
            MockCatalogService.category(kind, page, limit)
        }

        fn top250(&self) -> Result<SubjectPage, FetchError> {
            MockCatalogService.top250()
        }

        fn vod_sources(&self) -> Result<Envelope<VodSources>, FetchError> {
            MockCatalogService.vod_sources()
        }

        fn hero(&self) -> Result<Vec<HeroMovie>, FetchError> {
            MockCatalogService.hero()
        }

        fn new_content(&self) -> Result<Vec<CategoryRow>, FetchError> {
            MockCatalogService.new_content()
        }
    }

    #[test]
    fn videos_wait_out_a_retry() {
        let mut config = Config::default();
        config.cache.retry_delay = Duration::from_millis(20);
        let service = Arc::new(Flaky::default());
        let app = App::with_service(config, service.clone());
        let out = output(
            &app,
            Command::Videos {
                channel: None,
                page: None,
            },
        );
        assert!(out.starts_with("Reel Shorts (@reelshorts) page 1\n"));
        assert!(out.contains("more: page 2"));
        assert_eq!(service.video_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_video_page_is_an_error() {
        let mut buf = Vec::new();
        let err = offline()
            .execute(
                &Command::Videos {
                    channel: Some("reelshorts".into()),
                    page: Some(7),
                },
                &mut buf,
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("not found"));
    }
}
