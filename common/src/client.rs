use crate::config::FetchParams;
use crate::error::{FetchError, Result};
use crate::models::{Candle, Page};
use crate::utils::coerce_f64;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// API version pinned through the Accept header
const API_VERSION: &str = "20230302";

/// Anything able to serve one page of candles ending at `before_timestamp`.
#[allow(async_fn_in_trait)]
pub trait CandleSource {
    async fn fetch_page(
        &self,
        pool_address: &str,
        before_timestamp: i64,
        params: &FetchParams,
    ) -> Result<Page>;
}

#[derive(Debug, Deserialize)]
struct OhlcvResponse {
    data: OhlcvData,
}

#[derive(Debug, Deserialize)]
struct OhlcvData {
    attributes: OhlcvAttributes,
}

#[derive(Debug, Deserialize)]
struct OhlcvAttributes {
    // [timestamp, open, high, low, close, volume]
    ohlcv_list: Vec<Vec<Value>>,
}

pub struct GeckoTerminalClient {
    base_url: String,
    client: reqwest::Client,
}

impl GeckoTerminalClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(FetchError::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: String, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }

    pub fn ohlcv_url(&self, pool_address: &str, params: &FetchParams) -> String {
        format!(
            "{}/networks/{}/pools/{}/ohlcv/{}",
            self.base_url, params.network, pool_address, params.timeframe
        )
    }
}

impl CandleSource for GeckoTerminalClient {
    async fn fetch_page(
        &self,
        pool_address: &str,
        before_timestamp: i64,
        params: &FetchParams,
    ) -> Result<Page> {
        let url = self.ohlcv_url(pool_address, params);
        debug!(
            "GET {} (before_timestamp={}, limit={})",
            url, before_timestamp, params.limit
        );

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, format!("application/json;version={}", API_VERSION))
            .query(&[
                ("aggregate", params.aggregate.to_string()),
                ("before_timestamp", before_timestamp.to_string()),
                ("limit", params.limit.to_string()),
                ("currency", params.currency.as_str().to_string()),
                ("token", params.quote_side.as_str().to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                debug!("Request to {} failed: {}", url, e);
                FetchError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(FetchError::Request(format!(
                "HTTP {} for pool {}: {}",
                status, pool_address, snippet
            )));
        }

        let body = response.text().await?;
        let page = parse_ohlcv_body(&body)?;
        debug!("Pool {} returned {} candles", pool_address, page.len());
        Ok(page)
    }
}

/// Extracts `data.attributes.ohlcv_list` from a raw response body.
pub fn parse_ohlcv_body(body: &str) -> Result<Page> {
    let response: OhlcvResponse = serde_json::from_str(body)?;
    response
        .data
        .attributes
        .ohlcv_list
        .iter()
        .map(|entry| parse_candle(entry))
        .collect()
}

fn parse_candle(entry: &[Value]) -> Result<Candle> {
    if entry.len() != 6 {
        return Err(FetchError::Parse(format!(
            "Invalid OHLCV entry: expected 6 values, got {}",
            entry.len()
        )));
    }

    let field = |index: usize, name: &str| {
        coerce_f64(&entry[index]).ok_or_else(|| {
            FetchError::Parse(format!("Invalid '{}' value: {}", name, entry[index]))
        })
    };

    let timestamp = field(0, "timestamp")?;
    if !timestamp.is_finite() {
        return Err(FetchError::Parse(format!(
            "Invalid timestamp: {}",
            entry[0]
        )));
    }

    Ok(Candle {
        timestamp: timestamp as i64,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, QuoteSide, Timeframe};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn params() -> FetchParams {
        FetchParams {
            network: "eth".to_string(),
            timeframe: Timeframe::Minute,
            aggregate: 5,
            limit: 288,
            currency: Currency::Usd,
            quote_side: QuoteSide::Base,
        }
    }

    fn local_client(base_url: &str) -> GeckoTerminalClient {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        GeckoTerminalClient::with_client(base_url.to_string(), client)
    }

    /// Serves exactly one canned response and hands back the raw request head.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/api/v2", addr), handle)
    }

    #[test]
    fn test_parse_body() {
        let body = r#"{
            "data": {
                "id": "abc",
                "type": "ohlcv_request_response",
                "attributes": {
                    "ohlcv_list": [
                        [1700000300, 1.0, 2.0, 0.5, 1.5, 1000.0],
                        [1700000000, "0.9", "1.1", "0.8", "$1.0", "1,200"]
                    ]
                }
            },
            "meta": {}
        }"#;

        let page = parse_ohlcv_body(body).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(
            page[0],
            Candle {
                timestamp: 1700000300,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 1000.0,
            }
        );
        assert_eq!(page[1].timestamp, 1700000000);
        assert_eq!(page[1].close, 1.0);
        assert_eq!(page[1].volume, 1200.0);
    }

    #[test]
    fn test_parse_empty_list() {
        let body = r#"{"data": {"attributes": {"ohlcv_list": []}}}"#;
        assert!(parse_ohlcv_body(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_structure() {
        for body in [
            r#"{"errors": [{"status": "404"}]}"#,
            r#"{"data": {"attributes": {}}}"#,
            r#"{"data": {"attributes": {"ohlcv_list": [[1, 2, 3]]}}}"#,
            r#"{"data": {"attributes": {"ohlcv_list": [[1, 2, 3, 4, "n/a", 6]]}}}"#,
            "<html>nope</html>",
        ] {
            assert!(
                matches!(parse_ohlcv_body(body), Err(FetchError::Parse(_))),
                "expected parse error for {}",
                body
            );
        }
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(matches!(
            GeckoTerminalClient::new("ftp://example.com", Duration::from_secs(1)),
            Err(FetchError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_page_builds_request() {
        let body = r#"{"data": {"attributes": {"ohlcv_list": [[1700000000, 1, 2, 0.5, 1.5, 10]]}}}"#;
        let (base_url, server) = serve_once("200 OK", body).await;
        let client = local_client(&base_url);

        let page = client
            .fetch_page("0xabc", 1700000000, &params())
            .await
            .unwrap();
        assert_eq!(page.len(), 1);

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert_eq!(
            request_line,
            "GET /api/v2/networks/eth/pools/0xabc/ohlcv/minute?aggregate=5&before_timestamp=1700000000&limit=288&currency=usd&token=base HTTP/1.1"
        );
        assert!(request
            .to_ascii_lowercase()
            .contains("accept: application/json;version=20230302"));
    }

    #[tokio::test]
    async fn test_fetch_page_non_2xx_is_request_error() {
        let (base_url, server) = serve_once("429 Too Many Requests", r#"{"status": "429"}"#).await;
        let client = local_client(&base_url);

        let err = client
            .fetch_page("0xabc", 1700000000, &params())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request(ref msg) if msg.contains("429")));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_page_malformed_body_is_parse_error() {
        let (base_url, server) = serve_once("200 OK", r#"{"data": null}"#).await;
        let client = local_client(&base_url);

        let err = client
            .fetch_page("0xabc", 1700000000, &params())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_page_connection_refused_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = local_client(&format!("http://{}", addr));
        let err = client
            .fetch_page("0xabc", 1700000000, &params())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
    }
}
