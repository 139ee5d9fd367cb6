use std::{collections::HashMap, num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

use crate::error::CatalogError;

/// The slice of the external catalog the engine depends on. The synchronizer
/// and the group service consume the catalog through this trait so tests can
/// substitute a stub.
pub trait CatalogApi {
    async fn get_movie(&self, movie_id: i32) -> Result<MovieDetails, CatalogError>;
    async fn get_trailer(&self, movie_id: i32) -> Result<String, CatalogError>;
    async fn get_watch_providers(
        &self,
        movie_id: i32,
    ) -> Result<HashMap<String, CountryOffers>, CatalogError>;
    async fn get_watchlist_movies(
        &self,
        account_id: i64,
        session_id: &str,
    ) -> Result<Vec<i32>, CatalogError>;
    async fn set_watchlist_state(
        &self,
        account_id: i64,
        session_id: &str,
        movie_id: i32,
        on_list: bool,
    ) -> Result<(), CatalogError>;
}

#[derive(Clone)]
pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, access_token: String, base_url: String, rps: u32) -> Self {
        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Self { client, access_token, base_url, limiter }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        self.limiter.until_ready().await;
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;
        decode(resp).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        payload: &serde_json::Value,
    ) -> Result<T, CatalogError> {
        self.limiter.until_ready().await;
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .json(payload)
            .send()
            .await?;
        decode(resp).await
    }
}

/// Maps non-2xx statuses onto the closed error taxonomy; 2xx bodies must
/// decode as `T`.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, CatalogError> {
    match resp.status().as_u16() {
        200..=299 => {
            resp.json().await.map_err(|err| CatalogError::InvalidResponse(err.to_string()))
        }
        400 => Err(CatalogError::BadRequest),
        401 => Err(CatalogError::Unauthorized),
        404 => Err(CatalogError::NotFound),
        500..=599 => Err(CatalogError::ServerError),
        other => Err(CatalogError::Status(other)),
    }
}

impl CatalogApi for TmdbClient {
    async fn get_movie(&self, movie_id: i32) -> Result<MovieDetails, CatalogError> {
        self.get_json(
            &format!("/movie/{movie_id}"),
            &[("language", "en-US".to_string())],
        )
        .await
    }

    async fn get_trailer(&self, movie_id: i32) -> Result<String, CatalogError> {
        let resp: VideosResponse = self
            .get_json(
                &format!("/movie/{movie_id}/videos"),
                &[("language", "en-US".to_string())],
            )
            .await?;
        select_trailer(&resp.results)
    }

    async fn get_watch_providers(
        &self,
        movie_id: i32,
    ) -> Result<HashMap<String, CountryOffers>, CatalogError> {
        let resp: WatchProvidersResponse =
            self.get_json(&format!("/movie/{movie_id}/watch/providers"), &[]).await?;
        Ok(resp.results)
    }

    async fn get_watchlist_movies(
        &self,
        account_id: i64,
        session_id: &str,
    ) -> Result<Vec<i32>, CatalogError> {
        let mut ids = Vec::new();
        let mut page = 1;
        loop {
            let resp: WatchlistPage = self
                .get_json(
                    &format!("/account/{account_id}/watchlist/movies"),
                    &[
                        ("session_id", session_id.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            ids.extend(resp.results.into_iter().map(|m| m.id));
            if page >= resp.total_pages {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }

    async fn set_watchlist_state(
        &self,
        account_id: i64,
        session_id: &str,
        movie_id: i32,
        on_list: bool,
    ) -> Result<(), CatalogError> {
        let payload = json!({
            "media_type": "movie",
            "media_id": movie_id,
            "watchlist": on_list,
        });
        let _: serde_json::Value = self
            .post_json(
                &format!("/account/{account_id}/watchlist"),
                &[("session_id", session_id.to_string())],
                &payload,
            )
            .await?;
        Ok(())
    }
}

/// Prefers an official trailer, falls back to the first-seen unofficial
/// trailer, then to the first video of any kind.
fn select_trailer(videos: &[VideoEntry]) -> Result<String, CatalogError> {
    if videos.is_empty() {
        return Err(CatalogError::NoTrailer);
    }
    let mut best: Option<&VideoEntry> = None;
    for video in videos {
        if video.kind == "Trailer" {
            if video.official {
                best = Some(video);
                break;
            }
            if best.is_none() {
                best = Some(video);
            }
        }
    }
    let chosen = best.unwrap_or(&videos[0]);
    Ok(format!("https://www.youtube.com/watch?v={}", chosen.key))
}

#[derive(Clone, Debug, Deserialize)]
pub struct MovieDetails {
    pub id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub status: Option<String>,
    pub original_language: Option<String>,
    #[serde(default)]
    pub genres: Vec<GenreEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenreEntry {
    pub id: i32,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CountryOffers {
    #[serde(default)]
    pub flatrate: Vec<ProviderEntry>,
    #[serde(default)]
    pub rent: Vec<ProviderEntry>,
    #[serde(default)]
    pub buy: Vec<ProviderEntry>,
    #[serde(default)]
    pub ads: Vec<ProviderEntry>,
    #[serde(default)]
    pub free: Vec<ProviderEntry>,
}

impl CountryOffers {
    /// Offers cell-by-cell, paired with the watch type of each cell.
    pub fn cells(&self) -> impl Iterator<Item = (crate::models::WatchType, &[ProviderEntry])> {
        use crate::models::WatchType;
        [
            (WatchType::Stream, self.flatrate.as_slice()),
            (WatchType::Rent, self.rent.as_slice()),
            (WatchType::Buy, self.buy.as_slice()),
            (WatchType::Ads, self.ads.as_slice()),
            (WatchType::Free, self.free.as_slice()),
        ]
        .into_iter()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderEntry {
    pub provider_id: i32,
    pub provider_name: String,
    pub logo_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    results: Vec<VideoEntry>,
}

#[derive(Debug, Deserialize)]
struct VideoEntry {
    key: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    official: bool,
}

#[derive(Debug, Deserialize)]
struct WatchProvidersResponse {
    #[serde(default)]
    results: HashMap<String, CountryOffers>,
}

#[derive(Debug, Deserialize)]
struct WatchlistPage {
    total_pages: u32,
    results: Vec<WatchlistEntry>,
}

#[derive(Debug, Deserialize)]
struct WatchlistEntry {
    id: i32,
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn client(base_url: String) -> TmdbClient {
        TmdbClient::new(reqwest::Client::new(), "token".to_string(), base_url, 100)
    }

    #[tokio::test]
    async fn parses_movie_details() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "id": 550,
            "title": "Fight Club",
            "overview": "An insomniac office worker...",
            "poster_path": "/poster.jpg",
            "release_date": "1999-10-15",
            "runtime": 139,
            "status": "Released",
            "original_language": "en",
            "genres": [{"id": 18, "name": "Drama"}]
        });
        server
            .mock("GET", "/movie/550")
            .match_query(Matcher::UrlEncoded("language".into(), "en-US".into()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let details = client(server.url()).get_movie(550).await.unwrap();
        assert_eq!(details.title, "Fight Club");
        assert_eq!(details.runtime, Some(139));
        assert_eq!(details.genres.len(), 1);
        assert_eq!(details.genres[0].name, "Drama");
    }

    #[tokio::test]
    async fn prefers_official_trailer() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "results": [
                {"key": "teaser1", "type": "Teaser", "official": true},
                {"key": "fanmade", "type": "Trailer", "official": false},
                {"key": "official1", "type": "Trailer", "official": true}
            ]
        });
        server
            .mock("GET", "/movie/550/videos")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let url = client(server.url()).get_trailer(550).await.unwrap();
        assert_eq!(url, "https://www.youtube.com/watch?v=official1");
    }

    #[tokio::test]
    async fn falls_back_to_first_video_without_trailers() {
        let videos = vec![
            VideoEntry { key: "clip1".into(), kind: "Clip".into(), official: false },
            VideoEntry { key: "clip2".into(), kind: "Featurette".into(), official: true },
        ];
        let url = select_trailer(&videos).unwrap();
        assert_eq!(url, "https://www.youtube.com/watch?v=clip1");
    }

    #[tokio::test]
    async fn no_videos_is_a_distinct_error() {
        assert!(matches!(select_trailer(&[]), Err(CatalogError::NoTrailer)));
    }

    #[tokio::test]
    async fn maps_status_codes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/movie/1")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = client(server.url()).get_movie(1).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }

    #[tokio::test]
    async fn merges_watchlist_pages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/account/7/watchlist/movies")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("session_id".into(), "sess".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"page": 1, "total_pages": 2, "results": [{"id": 1}, {"id": 2}]})
                    .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/account/7/watchlist/movies")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("session_id".into(), "sess".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"page": 2, "total_pages": 2, "results": [{"id": 3}]}).to_string(),
            )
            .create_async()
            .await;

        let ids = client(server.url()).get_watchlist_movies(7, "sess").await.unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unknown_watch_type_keys_are_dropped() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "results": {
                "DE": {
                    "flatrate": [{"provider_id": 8, "provider_name": "Netflix", "logo_path": "/n.png"}],
                    "cinema": [{"provider_id": 99, "provider_name": "UCI", "logo_path": "/u.png"}]
                }
            }
        });
        server
            .mock("GET", "/movie/550/watch/providers")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let table = client(server.url()).get_watch_providers(550).await.unwrap();
        let de = table.get("DE").unwrap();
        assert_eq!(de.flatrate.len(), 1);
        assert!(de.rent.is_empty() && de.buy.is_empty());
    }
}
