//! Kitsu supplementary metadata: posters, synopsis, rating.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use manga_reader_core::{MetadataProvider, SupplementaryMetadata};
use serde::Deserialize;

const BASE_URL: &str = "https://kitsu.io/api/edge";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<KitsuManga>,
}

#[derive(Debug, Deserialize)]
struct KitsuManga {
    attributes: KitsuAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KitsuAttributes {
    canonical_title: Option<String>,
    synopsis: Option<String>,
    /// Percentage encoded as a string, e.g. `"82.14"`.
    average_rating: Option<String>,
    status: Option<String>,
    poster_image: Option<ImageSet>,
    cover_image: Option<ImageSet>,
}

#[derive(Debug, Deserialize)]
struct ImageSet {
    large: Option<String>,
    original: Option<String>,
}

impl ImageSet {
    fn best(self) -> Option<String> {
        self.large.or(self.original)
    }
}

fn to_metadata(manga: KitsuManga) -> SupplementaryMetadata {
    let attributes = manga.attributes;
    SupplementaryMetadata {
        title: attributes.canonical_title,
        poster_image: attributes.poster_image.and_then(ImageSet::best),
        cover_image: attributes.cover_image.and_then(ImageSet::best),
        description: attributes.synopsis,
        genres: Vec::new(),
        // Out of ten, one decimal.
        rating: attributes
            .average_rating
            .and_then(|raw| raw.parse::<f32>().ok())
            .map(|percent| percent.round() / 10.0),
        status: attributes.status,
    }
}

#[derive(Debug, Clone)]
pub struct KitsuClient {
    client: reqwest::Client,
}

impl KitsuClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataProvider for KitsuClient {
    async fn search(&self, title: &str, limit: u32) -> anyhow::Result<Vec<SupplementaryMetadata>> {
        let url = format!(
            "{BASE_URL}/manga?filter[text]={}&page[limit]={}",
            urlencoding::encode(title),
            limit.max(1)
        );
        tracing::debug!(target: "kitsu", %url, "request");
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.api+json")
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{url} returned {status}"));
        }
        let body: SearchResponse = response.json().await.context("decoding kitsu search")?;
        Ok(body.data.into_iter().map(to_metadata).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_maps_images_and_rating() {
        let json = r#"{ "data": [ {
            "id": "1",
            "type": "manga",
            "attributes": {
                "canonicalTitle": "One Piece",
                "synopsis": "Pirates.",
                "averageRating": "82.14",
                "status": "current",
                "posterImage": { "small": "s.jpg", "large": "l.jpg", "original": "o.jpg" },
                "coverImage": { "original": "cover.jpg" }
            }
        } ] }"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let metadata = to_metadata(response.data.into_iter().next().unwrap());

        assert_eq!(metadata.title.as_deref(), Some("One Piece"));
        assert_eq!(metadata.poster_image.as_deref(), Some("l.jpg"));
        assert_eq!(metadata.cover_image.as_deref(), Some("cover.jpg"));
        assert_eq!(metadata.rating, Some(8.2));
    }

    #[test]
    fn missing_fields_are_tolerated() {
        let response: SearchResponse =
            serde_json::from_str(r#"{ "data": [ { "attributes": {} } ] }"#).unwrap();
        let metadata = to_metadata(response.data.into_iter().next().unwrap());
        assert_eq!(metadata, SupplementaryMetadata::default());
    }
}
