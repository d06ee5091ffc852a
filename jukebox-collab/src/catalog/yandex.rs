use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use reqwest::{header, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use url::Url;

use crate::{CatalogSettings, TrackId};

use super::{Catalog, CatalogError, TrackMetadata};

pub const API_BASE: &str = "https://api.music.yandex.net/";

/// Mixed into every stream link signature
const SIGN_SALT: &str = "XGRlBW9FXlekgbPrRHuSiA";
const COVER_SIZE: &str = "400x400";

/// Resolves tracks through the Yandex Music API
pub struct YandexCatalog {
    client: Client,
    base: Url,
    settings: RwLock<Option<CatalogSettings>>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Track {
    title: String,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<Artist>,
    #[serde(default)]
    albums: Vec<Album>,
    cover_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Album {
    cover_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadInfo {
    codec: String,
    bitrate_in_kbps: u32,
    download_info_url: String,
}

/// The XML document behind a download info url
#[derive(Debug, Deserialize)]
struct DownloadLocation {
    host: String,
    path: String,
    ts: String,
    s: String,
}

impl YandexCatalog {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };

        let base = Url::parse(&base).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::FetchError(e.to_string()))?;

        Ok(Self {
            client,
            base,
            settings: Default::default(),
        })
    }

    fn token(&self) -> Result<String, CatalogError> {
        self.settings
            .read()
            .as_ref()
            .map(|s| s.access_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(CatalogError::NotConfigured)
    }

    async fn get<T>(&self, url: Url, token: &str) -> Result<T, CatalogError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("OAuth {}", token))
            .send()
            .await
            .map_err(|e| CatalogError::FetchError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Ok(envelope.result)
    }

    async fn fetch_track(&self, track_id: TrackId, token: &str) -> Result<Track, CatalogError> {
        let url = self.endpoint(&format!("tracks/{}", track_id))?;
        let tracks: Vec<Track> = self.get(url, token).await?;

        tracks
            .into_iter()
            .next()
            .ok_or(CatalogError::NotFound(track_id))
    }

    async fn fetch_stream_url(
        &self,
        track_id: TrackId,
        token: &str,
    ) -> Result<String, CatalogError> {
        let url = self.endpoint(&format!("tracks/{}/download-info", track_id))?;
        let infos: Vec<DownloadInfo> = self.get(url, token).await?;

        let best = best_download(infos).ok_or(CatalogError::NotFound(track_id))?;
        debug!(
            "Using {} kbps {} for track {}",
            best.bitrate_in_kbps, best.codec, track_id
        );

        let response = self
            .client
            .get(&best.download_info_url)
            .send()
            .await
            .map_err(|e| CatalogError::FetchError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::FetchError(e.to_string()))?;

        let location: DownloadLocation = quick_xml::de::from_str(&body)
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Ok(location.to_url())
    }

    fn endpoint(&self, path: &str) -> Result<Url, CatalogError> {
        self.base
            .join(path)
            .map_err(|e| CatalogError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl Catalog for YandexCatalog {
    async fn resolve(&self, track_id: TrackId) -> Result<TrackMetadata, CatalogError> {
        let token = self.token()?;

        let track = self.fetch_track(track_id, &token).await?;
        let stream_url = self.fetch_stream_url(track_id, &token).await?;

        let cover = track
            .albums
            .iter()
            .find_map(|a| a.cover_uri.as_deref())
            .or(track.cover_uri.as_deref())
            .map(cover_url)
            .unwrap_or_default();

        let artist = track
            .artists
            .into_iter()
            .next()
            .map(|a| a.name)
            .unwrap_or_else(|| "Unknown artist".to_string());

        Ok(TrackMetadata {
            title: track.title,
            artist,
            cover_url: cover,
            duration_ms: track.duration_ms,
            stream_url,
        })
    }

    fn configure(&self, settings: &CatalogSettings) {
        *self.settings.write() = Some(settings.clone());
    }
}

impl DownloadLocation {
    fn to_url(&self) -> String {
        let mut hasher = Md5::new();

        hasher.update(SIGN_SALT.as_bytes());
        hasher.update(self.path.trim_start_matches('/').as_bytes());
        hasher.update(self.s.as_bytes());

        format!(
            "https://{}/get-mp3/{:x}/{}{}",
            self.host,
            hasher.finalize(),
            self.ts,
            self.path
        )
    }
}

/// Picks the highest bitrate mp3
fn best_download(infos: Vec<DownloadInfo>) -> Option<DownloadInfo> {
    infos
        .into_iter()
        .filter(|i| i.codec == "mp3")
        .max_by_key(|i| i.bitrate_in_kbps)
}

/// Cover uris come as templates like `avatars.yandex.net/get-music-content/x/y/%%`
fn cover_url(template: &str) -> String {
    let uri = template
        .replace("%25%25", COVER_SIZE)
        .replace("%%", COVER_SIZE)
        .replace('%', "");

    if uri.starts_with("http://") || uri.starts_with("https://") {
        uri
    } else {
        format!("https://{}", uri)
    }
}

async fn handle_unsuccessful_request(response: Response, status: StatusCode) -> CatalogError {
    let result = response.text().await;

    match result {
        Ok(text) => CatalogError::FetchError(format!("{}: {}", status, text)),
        Err(e) => CatalogError::FetchError(format!("{}: {}", status, e)),
    }
}
