use std::time::Duration;

use serde::de::DeserializeOwned;

use super::types::{DrugDetail, DrugProduct, RawDetail, RawProduct};
use super::DrugLookupError;
use crate::config::DrugApiConfig;

/// Queries shorter than this (in characters, after trimming) are not sent.
pub const MIN_QUERY_CHARS: usize = 2;
pub const DEFAULT_RESULT_ROWS: u32 = 10;

const SEARCH_OPERATION: &str = "getDrugPrdtPrmsnInq07";
const DETAIL_OPERATION: &str = "getDrugPrdtPrmsnDtlInq06";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client for the drug product approval registry.
///
/// Lookups are best effort: the public operations return an empty list or
/// `None` on any failure and log a warning instead.
pub struct DrugRegistryClient {
    config: DrugApiConfig,
    client: reqwest::Client,
}

impl DrugRegistryClient {
    pub fn new(config: DrugApiConfig) -> Result<Self, DrugLookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DrugLookupError::HttpClient(e.to_string()))?;
        Ok(Self {
            config: config.with_trimmed_base(),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }

    /// Products whose name matches `query`, at most `DEFAULT_RESULT_ROWS`.
    pub async fn search(&self, query: &str) -> Vec<DrugProduct> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return vec![];
        }
        match self.try_search(query, DEFAULT_RESULT_ROWS).await {
            Ok(products) => products,
            Err(e) => {
                tracing::warn!(query, error = %e, "Drug search failed");
                vec![]
            }
        }
    }

    pub async fn try_search(
        &self,
        query: &str,
        rows: u32,
    ) -> Result<Vec<DrugProduct>, DrugLookupError> {
        let rows = rows.to_string();
        let items: Vec<RawProduct> = self
            .fetch_items(SEARCH_OPERATION, &[("numOfRows", rows.as_str()), ("item_name", query)])
            .await?;
        Ok(items.into_iter().map(DrugProduct::from).collect())
    }

    /// Full record for one product by its item sequence code.
    pub async fn detail(&self, item_seq: &str) -> Option<DrugDetail> {
        match self.try_detail(item_seq).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(item_seq, error = %e, "Drug detail lookup failed");
                None
            }
        }
    }

    pub async fn try_detail(&self, item_seq: &str) -> Result<Option<DrugDetail>, DrugLookupError> {
        let items: Vec<RawDetail> = self
            .fetch_items(DETAIL_OPERATION, &[("numOfRows", "1"), ("item_seq", item_seq)])
            .await?;
        Ok(items.into_iter().next().map(DrugDetail::from))
    }

    fn api_key(&self) -> Result<&str, DrugLookupError> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(DrugLookupError::MissingCredential)
    }

    /// GET an operation and return the parseable entries of `body.items`.
    async fn fetch_items<T: DeserializeOwned>(
        &self,
        operation: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, DrugLookupError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{operation}", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("serviceKey", api_key), ("pageNo", "1"), ("type", "json")])
            .query(params)
            .send()
            .await
            .map_err(|e| DrugLookupError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DrugLookupError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DrugLookupError::Parse(e.to_string()))?;

        let items = body
            .pointer("/body/items")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    async fn spawn_registry(reply: serde_json::Value) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let handler = |op: &'static str| {
            let reply = reply.clone();
            move |State(seen): State<Seen>, Query(q): Query<HashMap<String, String>>| {
                let reply = reply.clone();
                async move {
                    seen.lock().unwrap().push((op.to_string(), q));
                    Json(reply)
                }
            }
        };
        let app = Router::new()
            .route("/svc/getDrugPrdtPrmsnInq07", get(handler(SEARCH_OPERATION)))
            .route("/svc/getDrugPrdtPrmsnDtlInq06", get(handler(DETAIL_OPERATION)))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/svc/"), seen)
    }

    fn client(base_url: &str, key: Option<&str>) -> DrugRegistryClient {
        DrugRegistryClient::new(DrugApiConfig {
            api_key: key.map(str::to_string),
            base_url: base_url.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn search_maps_items_and_sends_params() {
        let reply = serde_json::json!({
            "header": {"resultCode": "00"},
            "body": {"items": [
                {"ITEM_NAME": "Tylenol 500mg", "ENTP_NAME": "Janssen", "ITEM_INGR_NAME": "Acetaminophen", "EDI_CODE": "A123", "PRDLST_STDR_CODE": "200001"},
                {"ITEM_NAME": "Tylenol ER"}
            ]}
        });
        let (base, seen) = spawn_registry(reply).await;
        let products = client(&base, Some("key-1")).search("  Tylenol ").await;

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].item_ingr_name, "Acetaminophen");
        assert_eq!(products[1].entp_name, "");

        let seen = seen.lock().unwrap();
        let (op, q) = &seen[0];
        assert_eq!(op, SEARCH_OPERATION);
        assert_eq!(q["serviceKey"], "key-1");
        assert_eq!(q["pageNo"], "1");
        assert_eq!(q["numOfRows"], "10");
        assert_eq!(q["type"], "json");
        assert_eq!(q["item_name"], "Tylenol");
    }

    #[tokio::test]
    async fn short_query_is_not_sent() {
        let (base, seen) = spawn_registry(serde_json::json!({})).await;
        let products = client(&base, Some("key-1")).search(" a ").await;
        assert!(products.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_key_returns_empty_without_request() {
        let (base, seen) = spawn_registry(serde_json::json!({})).await;
        let c = client(&base, None);
        assert!(!c.is_configured());
        assert!(c.search("Tylenol").await.is_empty());
        assert!(c.detail("200001").await.is_none());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unexpected_shape_returns_empty() {
        let (base, _) = spawn_registry(serde_json::json!({"body": {"items": ""}})).await;
        assert!(client(&base, Some("k")).search("Tylenol").await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_registry_returns_empty() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let c = client(&format!("http://{addr}"), Some("k"));
        assert!(matches!(
            c.try_search("Tylenol", 10).await,
            Err(DrugLookupError::Transport(_))
        ));
        assert!(c.search("Tylenol").await.is_empty());
    }

    #[tokio::test]
    async fn detail_maps_rare_drug_flag() {
        let reply = serde_json::json!({
            "body": {"items": [{
                "ITEM_NAME": "Orphan 10mg",
                "STORAGE_METHOD": "Room temperature",
                "ATC_CODE": "L01XX",
                "RARE_DRUG_YN": "Y"
            }]}
        });
        let (base, seen) = spawn_registry(reply).await;
        let detail = client(&base, Some("k")).detail("200002").await.unwrap();
        assert_eq!(detail.item_name.as_deref(), Some("Orphan 10mg"));
        assert_eq!(detail.atc_code.as_deref(), Some("L01XX"));
        assert!(detail.rare_drug);
        assert!(detail.bar_code.is_none());

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, DETAIL_OPERATION);
        assert_eq!(seen[0].1["item_seq"], "200002");
        assert_eq!(seen[0].1["numOfRows"], "1");
    }

    #[tokio::test]
    async fn detail_with_no_items_is_none() {
        let (base, _) = spawn_registry(serde_json::json!({"body": {"items": []}})).await;
        assert!(client(&base, Some("k")).detail("1").await.is_none());
    }
}
