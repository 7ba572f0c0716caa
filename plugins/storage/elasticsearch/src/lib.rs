use std::time::Duration;

use serde::Deserialize;

use loader_api::{BoxFuture, BulkItemStatus, ConnectorError, Event, IndexStore};

const PING_TIMEOUT: Duration = Duration::from_secs(2);
const NDJSON: &str = "application/x-ndjson";

/// Elasticsearch backend поверх HTTP API.
///
/// Пишет через `_bulk` (одна index-операция на документ, id назначает
/// Elasticsearch). Проверка доступности ходит отдельным клиентом с
/// коротким таймаутом, чтобы не делить пул соединений с записью.
pub struct ElasticsearchStore {
    http: reqwest::Client,
    ping_http: reqwest::Client,
    base_url: String,
}

impl ElasticsearchStore {
    pub fn new(url: &str) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ConnectorError::config(format!("HTTP client: {e}")))?;
        let ping_http = reqwest::Client::builder()
            .timeout(PING_TIMEOUT)
            .build()
            .map_err(|e| ConnectorError::config(format!("HTTP ping client: {e}")))?;

        tracing::info!(url, "Elasticsearch client initialized");

        Ok(Self {
            http,
            ping_http,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_bulk(&self, body: String) -> Result<String, ConnectorError> {
        let resp = self
            .http
            .post(format!("{}/_bulk", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, NDJSON)
            .body(body)
            .send()
            .await
            .map_err(|e| ConnectorError::io(format!("ES request: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ConnectorError::io(format!("ES read: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(ConnectorError::io(format!("ES bulk {status}: {body}")))
        }
    }
}

impl IndexStore for ElasticsearchStore {
    fn ping(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.ping_http.head(&self.base_url).send().await {
                Ok(resp) => resp.status().is_success(),
                Err(e) => {
                    tracing::debug!(error = %e, "Elasticsearch ping failed");
                    false
                }
            }
        })
    }

    fn bulk<'a>(
        &'a self,
        index: &'a str,
        docs: &'a [Event],
    ) -> BoxFuture<'a, Result<Vec<BulkItemStatus>, ConnectorError>> {
        Box::pin(async move {
            if docs.is_empty() {
                return Ok(Vec::new());
            }
            let body = render_bulk(index, docs)?;
            let text = self.post_bulk(body).await?;
            parse_bulk_response(&text)
        })
    }
}

// ════════════════════════════════════════════════════════════════
//  Bulk wire format
// ════════════════════════════════════════════════════════════════

/// NDJSON-тело `_bulk`: пара строк action + source на документ,
/// завершающий перевод строки обязателен.
pub fn render_bulk(index: &str, docs: &[Event]) -> Result<String, ConnectorError> {
    let action = serde_json::to_string(&serde_json::json!({ "index": { "_index": index } }))?;
    let mut body = String::new();
    for doc in docs {
        body.push_str(&action);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<BulkItem>,
}

#[derive(Deserialize)]
struct BulkItem {
    // единственный ключ = тип операции (index/create/update/delete)
    #[serde(flatten)]
    ops: serde_json::Map<String, serde_json::Value>,
}

/// Статусы элементов ответа `_bulk` в порядке запроса.
///
/// Элемент без читаемого `status` получает 0: вызывающий считает его
/// не проиндексированным.
pub fn parse_bulk_response(text: &str) -> Result<Vec<BulkItemStatus>, ConnectorError> {
    let resp: BulkResponse = serde_json::from_str(text)
        .map_err(|e| ConnectorError::format_err(format!("parse ES bulk response: {e}")))?;

    Ok(resp
        .items
        .iter()
        .map(|item| {
            let status = item
                .ops
                .values()
                .next()
                .and_then(|op| op.get("status"))
                .and_then(|s| s.as_u64())
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(0);
            BulkItemStatus(status)
        })
        .collect())
}
