use crate::adapters::http::SnapshotRequest;
use crate::domain::model::{CableLink, Collection, Document};
use crate::utils::error::{InventoryError, Result};
use crate::utils::validation::validate_url;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Path report as returned by `POST /cablingSnapshot`.
#[derive(Debug, Clone, Deserialize)]
pub struct PathReport {
    #[serde(rename = "cablingPath")]
    pub cabling_path: Vec<String>,
    #[serde(default)]
    pub incomplete: bool,
    #[serde(default)]
    pub reason: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

/// Thin reqwest client for the module-db HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        validate_url("server", base_url)?;
        let mut base =
            Url::parse(base_url).map_err(|e| InventoryError::InvalidConfigValueError {
                field: "server".to_string(),
                value: base_url.to_string(),
                reason: e.to_string(),
            })?;
        // Relative joins replace the last segment unless it ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            client: Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| InventoryError::InvalidConfigValueError {
                field: "path".to_string(),
                value: path.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn connect_cables(&self, link: &CableLink) -> Result<String> {
        let url = self.endpoint("connectCables")?;
        tracing::debug!("POST {}", url);
        let response = self.client.post(url).json(link).send().await?;
        read_message(response).await
    }

    pub async fn disconnect_cables(&self, link: &CableLink) -> Result<String> {
        let url = self.endpoint("disconnectCables")?;
        tracing::debug!("POST {}", url);
        let response = self.client.post(url).json(link).send().await?;
        read_message(response).await
    }

    pub async fn cabling_snapshot(&self, request: &SnapshotRequest) -> Result<PathReport> {
        let url = self.endpoint("cablingSnapshot")?;
        tracing::debug!("POST {}", url);
        let response = self.client.post(url).json(request).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        let url = self.endpoint(collection.as_str())?;
        let response = self.client.get(url).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn get(&self, collection: Collection, key: &str) -> Result<Document> {
        let mut url = self.endpoint(collection.as_str())?;
        url.path_segments_mut()
            .map_err(|_| InventoryError::ConfigError {
                message: format!("server URL {} cannot take a path", self.base),
            })?
            .push(key);
        let response = self.client.get(url).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn insert(&self, collection: Collection, document: &Document) -> Result<String> {
        let url = self.endpoint(collection.as_str())?;
        let response = self.client.post(url).json(document).send().await?;
        read_message(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);
    Err(InventoryError::UnexpectedResponse {
        status: status.as_u16(),
        message,
    })
}

async fn read_message(response: Response) -> Result<String> {
    let body: MessageBody = ensure_success(response).await?.json().await?;
    Ok(body.message)
}
