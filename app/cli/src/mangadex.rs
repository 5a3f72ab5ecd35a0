//! MangaDex chapter and page provider.

use std::collections::HashMap;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use manga_reader_core::{Chapter, ChapterProvider, MangaRecord, PageManifest};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://api.mangadex.org";
const COVER_URL: &str = "https://uploads.mangadex.org/covers";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
    #[serde(rename = "altTitles", default)]
    alt_titles: Vec<HashMap<String, String>>,
    description: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
struct RelationshipAttributes {
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Debug, Deserialize)]
struct ChapterAttributes {
    chapter: Option<String>,
    volume: Option<String>,
    title: Option<String>,
    #[serde(default)]
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct AtHomeResponse {
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
    chapter: Option<AtHomeChapter>,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    hash: Option<String>,
    #[serde(default)]
    data: Vec<String>,
}

/// English title first, then any romanised title, then whatever is there.
fn pick_localized(map: &HashMap<String, String>) -> Option<String> {
    ["en", "ja-ro", "en-us"]
        .iter()
        .find_map(|lang| map.get(*lang))
        .or_else(|| map.values().next())
        .cloned()
}

fn to_record(manga: MangaData) -> MangaRecord {
    let title = pick_localized(&manga.attributes.title)
        .or_else(|| manga.attributes.alt_titles.iter().find_map(pick_localized))
        .unwrap_or_else(|| "Unknown".to_string());
    let description = manga.attributes.description.as_ref().and_then(pick_localized);
    let cover_url = manga
        .relationships
        .iter()
        .filter(|rel| rel.rel_type == "cover_art")
        .find_map(|rel| rel.attributes.as_ref()?.file_name.as_deref())
        .map(|file| format!("{COVER_URL}/{}/{file}", manga.id));

    MangaRecord { id: manga.id, title, cover_url, description }
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|value| value.trim().parse::<f64>().ok()).filter(|value| value.is_finite())
}

fn to_chapter(chapter: ChapterData) -> Chapter {
    let attributes = chapter.attributes;
    Chapter {
        id: chapter.id,
        chapter_number: parse_number(attributes.chapter.as_deref()),
        volume_number: parse_number(attributes.volume.as_deref()),
        title: attributes.title.filter(|title| !title.trim().is_empty()),
        page_count: attributes.pages,
    }
}

fn to_manifest(response: AtHomeResponse) -> PageManifest {
    let (chapter_hash, page_filenames) = match response.chapter {
        Some(chapter) => (chapter.hash, chapter.data),
        None => (None, Vec::new()),
    };
    PageManifest { base_url: response.base_url, chapter_hash, page_filenames }
}

#[derive(Debug, Clone)]
pub struct MangaDexClient {
    client: reqwest::Client,
    base_url: String,
    language: String,
}

impl MangaDexClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, base_url: BASE_URL.to_string(), language: "en".to_string() }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(target: "mangadex", %url, "request");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{url} returned {status}"));
        }
        response.json::<T>().await.with_context(|| format!("decoding {url}"))
    }
}

#[async_trait]
impl ChapterProvider for MangaDexClient {
    async fn search_manga(&self, query: &str, limit: u32) -> anyhow::Result<Vec<MangaRecord>> {
        let path = format!(
            "/manga?title={}&limit={limit}&includes[]=cover_art&order[relevance]=desc",
            urlencoding::encode(query)
        );
        let response: Envelope<Vec<MangaData>> = self.get_json(&path).await?;
        Ok(response.data.into_iter().map(to_record).collect())
    }

    async fn get_manga(&self, id: &str) -> anyhow::Result<MangaRecord> {
        let path = format!("/manga/{}?includes[]=cover_art", urlencoding::encode(id));
        let response: Envelope<MangaData> = self.get_json(&path).await?;
        Ok(to_record(response.data))
    }

    async fn get_chapters(&self, manga_id: &str, limit: u32) -> anyhow::Result<Vec<Chapter>> {
        let path = format!(
            "/manga/{}/feed?translatedLanguage[]={}&order[volume]=asc&order[chapter]=asc&limit={limit}",
            urlencoding::encode(manga_id),
            urlencoding::encode(&self.language)
        );
        let response: Envelope<Vec<ChapterData>> = self.get_json(&path).await?;
        Ok(response.data.into_iter().map(to_chapter).collect())
    }

    async fn get_chapter_detail(&self, chapter_id: &str) -> anyhow::Result<Chapter> {
        let path = format!("/chapter/{}", urlencoding::encode(chapter_id));
        let response: Envelope<ChapterData> = self.get_json(&path).await?;
        Ok(to_chapter(response.data))
    }

    async fn get_chapter_pages(&self, chapter_id: &str) -> anyhow::Result<PageManifest> {
        let path = format!("/at-home/server/{}", urlencoding::encode(chapter_id));
        let response: AtHomeResponse = self.get_json(&path).await?;
        Ok(to_manifest(response))
    }
}
