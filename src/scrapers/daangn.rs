use crate::config::HttpConfig;
use crate::error::ScoutError;
use crate::models::{parse_price, parse_timestamp, Listing, Region};
use crate::scrapers::traits::ListingSource;
use crate::scrapers::types::SearchParams;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, REFERER};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// Listings client for the marketplace's internal buy-sell data route
pub struct DaangnClient {
    client: Client,
    http: HttpConfig,
}

impl DaangnClient {
    pub fn new(http: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(http.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, http })
    }
}

#[async_trait]
impl ListingSource for DaangnClient {
    async fn fetch_page(&self, region: &Region, params: &SearchParams) -> Result<Vec<Listing>, ScoutError> {
        let tag = region.tag();
        debug!("Fetching {} page {} for {}", self.http.endpoint, params.page, tag);

        let response = self
            .client
            .get(&self.http.endpoint)
            .query(&[
                ("in", tag.as_str()),
                ("search", params.query.as_str()),
                ("_data", self.http.route_data.as_str()),
            ])
            .query(&[("page", params.page), ("limit", params.limit)])
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(REFERER, self.http.endpoint.as_str())
            .send()
            .await
            .map_err(|source| ScoutError::Fetch { region: tag.clone(), source })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned status: {}", tag, status);
            return Err(ScoutError::Status { region: tag, status });
        }

        let body = response
            .text()
            .await
            .map_err(|source| ScoutError::Fetch { region: tag.clone(), source })?;

        debug!("Downloaded {} bytes for {}", body.len(), tag);

        parse_articles(&body).map_err(|e| ScoutError::Decode {
            region: tag,
            message: e.to_string(),
        })
    }

    fn source_name(&self) -> &'static str {
        "Daangn"
    }
}

#[derive(Debug, Deserialize)]
struct RouteData {
    #[serde(rename = "allPage", default)]
    all_page: Option<AllPage>,
}

#[derive(Debug, Deserialize)]
struct AllPage {
    #[serde(rename = "fleamarketArticles", default)]
    articles: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    href: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    price: serde_json::Value,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    nickname: Option<String>,
}

impl From<RawArticle> for Listing {
    fn from(raw: RawArticle) -> Self {
        Self {
            title: raw.title.unwrap_or_default(),
            content: raw.content.unwrap_or_default(),
            price: parse_price(&raw.price),
            created_at: raw.created_at.as_deref().and_then(parse_timestamp),
            status: raw.status.unwrap_or_default(),
            href: raw.href,
            thumbnail: raw.thumbnail.filter(|t| !t.is_empty()),
            seller: raw.user.and_then(|u| u.nickname).unwrap_or_default(),
        }
    }
}

/// Decode a route-data body into listings.
///
/// A body without the article list is an empty page. Articles that lack a
/// link are skipped since they cannot be deduplicated.
pub fn parse_articles(body: &str) -> Result<Vec<Listing>, serde_json::Error> {
    let data: RouteData = serde_json::from_str(body)?;
    let articles = data.all_page.map(|p| p.articles).unwrap_or_default();

    let listings = articles
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawArticle>(value) {
            Ok(raw) => Some(Listing::from(raw)),
            Err(e) => {
                debug!("Skipping malformed article: {}", e);
                None
            }
        })
        .collect();

    Ok(listings)
}
