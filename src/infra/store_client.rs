use crate::app::ports::AppCatalogPort;
use crate::config::StoreConfig;
use crate::constants::USER_AGENT;
use crate::error::ApiError;
use crate::types::{AppDetails, AppId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Steam storefront API: free-text search and app details.
pub struct StoreClient {
    client: reqwest::Client,
    api_base: String,
    language: String,
    country: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: u64,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Deserialize)]
struct DetailsEnvelope {
    success: bool,
    data: Option<DetailsData>,
}

#[derive(Deserialize)]
struct DetailsData {
    name: Option<String>,
    #[serde(default)]
    dlc: Vec<u64>,
}

impl StoreClient {
    pub fn new(config: &StoreConfig, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            country: config.country.clone(),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, ApiError> {
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

fn first_app(body: SearchResponse) -> Option<AppId> {
    body.items
        .into_iter()
        .find(|item| item.kind.is_empty() || item.kind == "app")
        .map(|item| AppId::new(item.id.to_string()))
}

fn details_for(app_id: &AppId, mut body: HashMap<String, DetailsEnvelope>) -> Option<AppDetails> {
    let envelope = body.remove(app_id.as_str())?;
    if !envelope.success {
        return None;
    }
    let data = envelope.data?;
    Some(AppDetails {
        name: data.name.filter(|n| !n.trim().is_empty()),
        dlc: data
            .dlc
            .into_iter()
            .map(|id| AppId::new(id.to_string()))
            .collect(),
    })
}

#[async_trait]
impl AppCatalogPort for StoreClient {
    async fn search(&self, query: &str) -> Result<Option<AppId>, ApiError> {
        let url = format!("{}/api/storesearch/", self.api_base);
        let bytes = self
            .get_json(
                &url,
                &[("term", query), ("l", self.language.as_str()), ("cc", self.country.as_str())],
            )
            .await?;
        let body: SearchResponse = serde_json::from_slice(&bytes)?;
        Ok(first_app(body))
    }

    async fn details(&self, app_id: &AppId) -> Result<Option<AppDetails>, ApiError> {
        let url = format!("{}/api/appdetails", self.api_base);
        let bytes = self
            .get_json(&url, &[("appids", app_id.as_str()), ("l", self.language.as_str())])
            .await?;
        let body: HashMap<String, DetailsEnvelope> = serde_json::from_slice(&bytes)?;
        Ok(details_for(app_id, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_app_skips_non_apps() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"total":2,"items":[
                {"type":"sub","name":"Bundle","id":1},
                {"type":"app","name":"Spacewar","id":480}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_app(body), Some(AppId::from("480")));
    }

    #[test]
    fn test_details_name_and_dlc() {
        let body: HashMap<String, DetailsEnvelope> = serde_json::from_str(
            r#"{"480":{"success":true,"data":{"type":"game","name":"Spacewar","dlc":[1200,1201]}}}"#,
        )
        .unwrap();
        let details = details_for(&AppId::from("480"), body).unwrap();
        assert_eq!(details.name.as_deref(), Some("Spacewar"));
        assert_eq!(details.dlc, vec![AppId::from("1200"), AppId::from("1201")]);
    }

    #[test]
    fn test_details_unsuccessful() {
        let body: HashMap<String, DetailsEnvelope> =
            serde_json::from_str(r#"{"480":{"success":false}}"#).unwrap();
        assert!(details_for(&AppId::from("480"), body).is_none());
    }
}
