use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::pagination::{Identified, Page};

/// `{code, data}` wrapper used by the configuration endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_ok(self) -> Option<T> {
        if self.code == 200 {
            self.data
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub default_channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "thumbnail_url", alias = "thumbnail")]
    pub cover: String,
    #[serde(default, alias = "views_total")]
    pub view_count: u64,
    #[serde(default, alias = "created_time", deserialize_with = "timestamp")]
    pub created_timestamp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideoPage {
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub episode_info: Option<String>,
}

impl Identified for Subject {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// One page of the category listing. The top-250 endpoint returns the same
/// shape without `pagination`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPage {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl Page for SubjectPage {
    type Item = Subject;

    fn items(&self) -> &[Subject] {
        &self.subjects
    }

    fn has_more(&self) -> Option<bool> {
        self.pagination.and_then(|p| p.has_more)
    }
}

/// Card-ready projection of a [`Subject`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub cover: String,
    pub url: String,
    pub rate: String,
    pub episode_info: String,
    pub cover_x: i32,
    pub cover_y: i32,
    pub playable: bool,
    pub is_new: bool,
}

impl From<&Subject> for Movie {
    fn from(subject: &Subject) -> Self {
        Movie {
            id: subject.id.clone(),
            title: subject.title.clone(),
            cover: subject.cover.clone().unwrap_or_default(),
            url: subject.url.clone().unwrap_or_default(),
            rate: subject.rate.clone().unwrap_or_default(),
            episode_info: subject.episode_info.clone().unwrap_or_default(),
            cover_x: 0,
            cover_y: 0,
            playable: false,
            is_new: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VodSource {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub api: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VodSources {
    #[serde(default)]
    pub sources: Vec<VodSource>,
    #[serde(default)]
    pub selected: Option<VodSource>,
}

/// Hero banner entry as the metadata provider returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroMovie {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub episode_info: Option<String>,
    #[serde(default)]
    pub poster_horizontal: String,
    #[serde(default)]
    pub poster_vertical: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl HeroMovie {
    pub fn to_movie(&self) -> Movie {
        Movie {
            id: self.id.clone(),
            title: self.title.clone(),
            cover: self.cover.clone().unwrap_or_default(),
            url: self.url.clone().unwrap_or_default(),
            rate: self.rate.clone().unwrap_or_default(),
            episode_info: self.episode_info.clone().unwrap_or_default(),
            cover_x: 0,
            cover_y: 0,
            playable: false,
            is_new: false,
        }
    }

    pub fn to_details(&self) -> HeroDetails {
        HeroDetails {
            poster_horizontal: self.poster_horizontal.clone(),
            poster_vertical: self.poster_vertical.clone(),
            description: self.description.clone(),
            genres: self.genres.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroDetails {
    pub poster_horizontal: String,
    pub poster_vertical: String,
    pub description: String,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub name: String,
    #[serde(default)]
    pub data: Vec<Subject>,
}

fn timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(value)) => value,
        Some(Raw::Float(value)) => value as i64,
        Some(Raw::Text(text)) => text.trim().parse().unwrap_or(0),
        None => 0,
    })
}
