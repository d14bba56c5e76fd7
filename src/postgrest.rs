use crate::config::TaggerConfig;
use crate::record::{CompanyName, CompanyRow, NewsPage, NewsRow, RecordId};
use crate::store::NewsStoreLike;
use crate::TaggerError;
use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use serde_json::json;
use tracing::debug;

/// News store backed by a PostgREST endpoint (Supabase REST API).
pub struct PostgrestNewsStore {
    client: Client,
    base_url: String,
    news_table: String,
    companies_table: String,
}

impl PostgrestNewsStore {
    pub fn new(config: &TaggerConfig) -> Result<Self, TaggerError> {
        Self::with_builder(config, Client::builder())
    }

    /// Build on a caller-supplied client builder; auth headers and timeout are added here.
    pub fn with_builder(config: &TaggerConfig, builder: ClientBuilder) -> Result<Self, TaggerError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.store_key)
            .map_err(|e| TaggerError::Config(format!("invalid store key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.store_key))
            .map_err(|e| TaggerError::Config(format!("invalid store key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = builder
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.store_url.trim_end_matches('/').to_string(),
            news_table: config.news_table.clone(),
            companies_table: config.companies_table.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

/// Total row count from a `Content-Range` header such as `0-0/42` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<usize> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

/// PostgREST filter value for an id: `eq.12`, or `eq."abc"` for text keys.
pub fn id_filter(id: &RecordId) -> String {
    match id {
        RecordId::Int(n) => format!("eq.{}", n),
        RecordId::Text(s) => format!("eq.\"{}\"", s.replace('"', "\\\"")),
    }
}

fn error_for_status(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(format!("status {}: {}", status, body.trim()))
}

impl NewsStoreLike for PostgrestNewsStore {
    fn load_companies(&self) -> Result<Vec<CompanyRow>, TaggerError> {
        let response = self
            .client
            .get(self.table_url(&self.companies_table))
            .query(&[("select", "name,aliases")])
            .send()
            .map_err(|e| TaggerError::ReferenceLoad(e.to_string()))?;
        let response = error_for_status(response).map_err(TaggerError::ReferenceLoad)?;
        let body = response.text()?;
        let rows: Vec<CompanyRow> = serde_json::from_str(&body)
            .map_err(|e| TaggerError::ReferenceLoad(format!("malformed company rows: {}", e)))?;
        debug!(rows = rows.len(), "Fetched company rows");
        Ok(rows)
    }

    fn count_news(&self) -> Result<usize, TaggerError> {
        let response = self
            .client
            .get(self.table_url(&self.news_table))
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items")
            .header("Range", "0-0")
            .send()
            .map_err(|e| TaggerError::Count(e.to_string()))?;
        let response = error_for_status(response).map_err(TaggerError::Count)?;
        let header = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| TaggerError::Count("missing Content-Range header".to_string()))?;
        parse_content_range_total(header)
            .ok_or_else(|| TaggerError::Count(format!("unparseable Content-Range: {}", header)))
    }

    fn fetch_news(&self, offset: usize, limit: usize) -> Result<NewsPage, TaggerError> {
        let fetch_error = |message: String| TaggerError::Fetch { offset, message };
        let response = self
            .client
            .get(self.table_url(&self.news_table))
            .query(&[
                ("select", "id,content".to_string()),
                ("order", "id.asc".to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .map_err(|e| fetch_error(e.to_string()))?;
        let response = error_for_status(response).map_err(fetch_error)?;
        let body = response.text().map_err(|e| fetch_error(e.to_string()))?;
        let rows: Vec<NewsRow> = serde_json::from_str(&body)
            .map_err(|e| fetch_error(format!("malformed news rows: {}", e)))?;
        Ok(NewsPage::from_rows(rows))
    }

    fn update_companies(&self, id: &RecordId, companies: &[CompanyName]) -> Result<(), TaggerError> {
        let write_error = |message: String| TaggerError::Write { id: id.to_string(), message };
        let response = self
            .client
            .patch(self.table_url(&self.news_table))
            .query(&[("id", id_filter(id))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "companies": companies }))
            .send()
            .map_err(|e| write_error(e.to_string()))?;
        error_for_status(response).map_err(write_error)?;
        Ok(())
    }
}
