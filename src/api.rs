use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::models::{
    CategoryRow, ChannelConfig, ChannelVideoPage, Envelope, HeroMovie, SubjectPage, VodSources,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

pub const CONFIG_PATH: &str = "/api/dailymotion-config";
pub const VIDEOS_PATH: &str = "/api/dailymotion";
pub const CATEGORY_PATH: &str = "/api/douban/category";
pub const TOP250_PATH: &str = "/api/douban/top250";
pub const SOURCES_PATH: &str = "/api/vod-sources";
pub const HERO_PATH: &str = "/api/douban/hero";
pub const NEW_CONTENT_PATH: &str = "/api/douban/new-content";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("reelview/{}", crate::VERSION),
            timeout: Duration::from_secs(20),
            http_client: None,
        }
    }
}

/// Blocking client for the catalog backend. Every call maps to one endpoint
/// and returns the decoded body; status codes are classified into
/// [`FetchError`].
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("api: user agent required");
        }
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("api: invalid base url {base_url:?}"))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout)
                .build()
                .context("api: build http client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn channel_config(&self) -> Result<Envelope<ChannelConfig>, FetchError> {
        self.get_json(CONFIG_PATH, &[])
    }

    pub fn channel_videos(
        &self,
        username: &str,
        page: u32,
    ) -> Result<ChannelVideoPage, FetchError> {
        self.get_json(
            VIDEOS_PATH,
            &[("username", username.to_string()), ("page", page.to_string())],
        )
    }

    pub fn category(&self, kind: &str, page: u32, limit: u32) -> Result<SubjectPage, FetchError> {
        self.get_json(
            CATEGORY_PATH,
            &[
                ("type", kind.to_string()),
                ("page", page.to_string()),
                ("limit", limit.to_string()),
            ],
        )
    }

    pub fn top250(&self) -> Result<SubjectPage, FetchError> {
        self.get_json(TOP250_PATH, &[])
    }

    pub fn vod_sources(&self) -> Result<Envelope<VodSources>, FetchError> {
        self.get_json(SOURCES_PATH, &[])
    }

    pub fn hero(&self) -> Result<Vec<HeroMovie>, FetchError> {
        self.get_json(HERO_PATH, &[])
    }

    pub fn new_content(&self) -> Result<Vec<CategoryRow>, FetchError> {
        self.get_json(NEW_CONTENT_PATH, &[])
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let raw = format!("{}{}", self.base_url, path);
        let url = Url::parse_with_params(&raw, query)
            .map_err(|err| FetchError::network(format!("invalid url {raw}: {err}")))?;
        debug!(%url, "api: GET");

        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let body = body.trim();
            let message = if body.is_empty() {
                format!("{path}: {status}")
            } else {
                format!("{path}: {status} - {body}")
            };
            return Err(FetchError::status(status.as_u16(), message));
        }

        let bytes = response.bytes()?;
        serde_json::from_slice(&bytes)
            .map_err(|err| FetchError::Malformed(format!("{path}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tiny_http::{Header, Response, Server};

    /// Serves `responses` in order, one per request, and returns the
    /// request URLs it saw.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = format!("http://{}", server.server_addr().to_ip().unwrap());
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let request = server.recv().unwrap();
                seen.push(request.url().to_string());
                let header = Header::from_bytes("Content-Type", "application/json").unwrap();
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                request.respond(response).unwrap();
            }
            seen
        });
        (addr, handle)
    }

    fn client(base_url: String) -> Client {
        Client::new(ClientConfig {
            base_url,
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn rejects_blank_user_agent() {
        let err = Client::new(ClientConfig {
            user_agent: "  ".into(),
            ..ClientConfig::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn decodes_videos_and_encodes_query() {
        let (addr, server) = serve(vec![(
            200,
            r#"{"videos":[{"id":"v1","title":"Pilot"}],"hasMore":true}"#,
        )]);
        let page = client(addr).channel_videos("k chow", 2).unwrap();
        assert_eq!(page.videos.len(), 1);
        assert!(page.has_more);
        let seen = server.join().unwrap();
        assert_eq!(seen, vec!["/api/dailymotion?username=k+chow&page=2".to_string()]);
    }

    #[test]
    fn classifies_status_codes() {
        let (addr, server) = serve(vec![
            (404, r#"{"error":"missing"}"#),
            (502, ""),
            (200, "not json"),
        ]);
        let api = client(addr);
        assert!(matches!(api.top250(), Err(FetchError::NotFound(_))));
        assert!(matches!(
            api.top250(),
            Err(FetchError::Network {
                status: Some(502),
                ..
            })
        ));
        assert!(matches!(api.top250(), Err(FetchError::Malformed(_))));
        server.join().unwrap();
    }

    #[test]
    fn category_sends_paging_parameters() {
        let (addr, server) = serve(vec![(
            200,
            r#"{"subjects":[{"id":"a","title":"A"}],"pagination":{"hasMore":false}}"#,
        )]);
        let page = client(addr).category("tv", 3, 20).unwrap();
        assert_eq!(page.subjects[0].id, "a");
        let seen = server.join().unwrap();
        assert_eq!(seen, vec!["/api/douban/category?type=tv&page=3&limit=20".to_string()]);
    }
}
