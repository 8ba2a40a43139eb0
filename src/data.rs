use crate::api;
use crate::error::FetchError;
use crate::models::{
    CategoryRow, Channel, ChannelConfig, ChannelVideoPage, Envelope, HeroMovie, Pagination,
    Subject, SubjectPage, Video, VodSource, VodSources,
};

/// Backend surface the resources are written against.
pub trait CatalogService: Send + Sync {
    fn channel_config(&self) -> Result<Envelope<ChannelConfig>, FetchError>;
    fn channel_videos(&self, username: &str, page: u32) -> Result<ChannelVideoPage, FetchError>;
    fn category(&self, kind: &str, page: u32, limit: u32) -> Result<SubjectPage, FetchError>;
    fn top250(&self) -> Result<SubjectPage, FetchError>;
    fn vod_sources(&self) -> Result<Envelope<VodSources>, FetchError>;
    fn hero(&self) -> Result<Vec<HeroMovie>, FetchError>;
    fn new_content(&self) -> Result<Vec<CategoryRow>, FetchError>;
}

impl CatalogService for api::Client {
    fn channel_config(&self) -> Result<Envelope<ChannelConfig>, FetchError> {
        api::Client::channel_config(self)
    }

    fn channel_videos(&self, username: &str, page: u32) -> Result<ChannelVideoPage, FetchError> {
        api::Client::channel_videos(self, username, page)
    }

    fn category(&self, kind: &str, page: u32, limit: u32) -> Result<SubjectPage, FetchError> {
        api::Client::category(self, kind, page, limit)
    }

    fn top250(&self) -> Result<SubjectPage, FetchError> {
        api::Client::top250(self)
    }

    fn vod_sources(&self) -> Result<Envelope<VodSources>, FetchError> {
        api::Client::vod_sources(self)
    }

    fn hero(&self) -> Result<Vec<HeroMovie>, FetchError> {
        api::Client::hero(self)
    }

    fn new_content(&self) -> Result<Vec<CategoryRow>, FetchError> {
        api::Client::new_content(self)
    }
}

const MOCK_PAGES: u32 = 3;
const MOCK_CREATED: i64 = 1_700_000_000;

/// Canned catalog for offline browsing.
#[derive(Default)]
pub struct MockCatalogService;

impl CatalogService for MockCatalogService {
    fn channel_config(&self) -> Result<Envelope<ChannelConfig>, FetchError> {
        Ok(Envelope {
            code: 200,
            data: Some(ChannelConfig {
                channels: vec![
                    mock_channel("shorts", "reelshorts", "Reel Shorts", true),
                    mock_channel("archive", "reelarchive", "Reel Archive", false),
                    mock_channel("drama", "dramabox", "Drama Box", true),
                ],
                default_channel_id: Some("shorts".into()),
            }),
            message: None,
        })
    }

    fn channel_videos(&self, username: &str, page: u32) -> Result<ChannelVideoPage, FetchError> {
        if page == 0 || page > MOCK_PAGES {
            return Err(FetchError::NotFound(format!("{username} page {page}")));
        }
        let videos = (1..=4)
            .map(|n| Video {
                id: format!("{username}-{page}-{n}"),
                title: format!("{username} episode {}", (page - 1) * 4 + n),
                cover: String::new(),
                view_count: u64::from(n) * 1_500,
                created_timestamp: MOCK_CREATED,
                extra: Default::default(),
            })
            .collect();
        Ok(ChannelVideoPage {
            videos,
            has_more: page < MOCK_PAGES,
        })
    }

    fn category(&self, kind: &str, page: u32, limit: u32) -> Result<SubjectPage, FetchError> {
        if page == 0 || page > MOCK_PAGES {
            return Ok(SubjectPage::default());
        }
        let per_page = limit.clamp(1, 5);
        // pages after the first repeat the previous page's last subject
        let start = (page - 1) * per_page;
        let subjects = (start.saturating_sub(1)..start + per_page)
            .map(|n| mock_subject(kind, n))
            .collect();
        Ok(SubjectPage {
            subjects,
            pagination: Some(Pagination {
                has_more: Some(page < MOCK_PAGES),
            }),
        })
    }

    fn top250(&self) -> Result<SubjectPage, FetchError> {
        Ok(SubjectPage {
            subjects: (0..10).map(|n| mock_subject("top250", n)).collect(),
            pagination: None,
        })
    }

    fn vod_sources(&self) -> Result<Envelope<VodSources>, FetchError> {
        let sources = vec![mock_source("primary", "Primary"), mock_source("backup", "Backup")];
        Ok(Envelope {
            code: 200,
            data: Some(VodSources {
                selected: sources.first().cloned(),
                sources,
            }),
            message: None,
        })
    }

    fn hero(&self) -> Result<Vec<HeroMovie>, FetchError> {
        Ok((0..3)
            .map(|n| HeroMovie {
                id: format!("hero-{n}"),
                title: format!("Featured drama {}", n + 1),
                cover: None,
                url: None,
                rate: Some("8.5".into()),
                episode_info: Some("24 episodes".into()),
                poster_horizontal: String::new(),
                poster_vertical: String::new(),
                description: "Sample featured title.".into(),
                genres: vec!["drama".into()],
            })
            .collect())
    }

    fn new_content(&self) -> Result<Vec<CategoryRow>, FetchError> {
        Ok(["movie", "tv"]
            .into_iter()
            .map(|kind| CategoryRow {
                name: kind.to_string(),
                data: (0..4).map(|n| mock_subject(kind, n)).collect(),
            })
            .collect())
    }
}

fn mock_channel(id: &str, username: &str, display_name: &str, is_active: bool) -> Channel {
    Channel {
        id: id.into(),
        username: username.into(),
        display_name: display_name.into(),
        is_active,
        created_at: "2024-01-01T00:00:00Z".into(),
    }
}

fn mock_subject(kind: &str, n: u32) -> Subject {
    Subject {
        id: format!("{kind}-{n}"),
        title: format!("{kind} title {}", n + 1),
        cover: None,
        url: None,
        rate: Some(format!("{:.1}", 6.0 + f64::from(n % 4))),
        episode_info: None,
    }
}

fn mock_source(key: &str, name: &str) -> VodSource {
    VodSource {
        key: key.into(),
        name: name.into(),
        api: format!("https://vod.invalid/{key}"),
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_category_pages_overlap() {
        let service = MockCatalogService;
        let first = service.category("tv", 1, 20).unwrap();
        let second = service.category("tv", 2, 20).unwrap();
        let last_of_first = first.subjects.last().unwrap();
        assert_eq!(second.subjects.first(), Some(last_of_first));
        assert_eq!(
            service.category("tv", 3, 20).unwrap().pagination,
            Some(Pagination {
                has_more: Some(false)
            })
        );
    }

    #[test]
    fn mock_videos_run_out() {
        let service = MockCatalogService;
        assert!(service.channel_videos("reelshorts", 1).unwrap().has_more);
        assert!(!service.channel_videos("reelshorts", 3).unwrap().has_more);
        assert!(matches!(
            service.channel_videos("reelshorts", 4),
            Err(FetchError::NotFound(_))
        ));
    }
}
