//! Embedding collaborator seam
//!
//! The appearance model lives outside this crate. `Embedder` turns query
//! images into embeddings and measures distances between embeddings; the
//! shipped [`RemoteEmbedder`] talks JSON to an external embedding service.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::archive::Embedding;
use crate::error::EmbedError;

/// Appearance model interface
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
  /// One embedding per decodable image
  async fn extract(&self, images: &[Vec<u8>]) -> Result<Vec<Embedding>, EmbedError>;

  /// One distance per query embedding against `candidate`
  fn distance(&self, query: &[Embedding], candidate: &[f32]) -> Result<Vec<f32>, EmbedError> {
    query.iter().map(|q| squared_euclidean(q, candidate)).collect()
  }
}

/// Squared Euclidean distance, the metric the matching threshold is tuned for
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> Result<f32, EmbedError> {
  if a.len() != b.len() {
    return Err(EmbedError::DimensionMismatch { query: a.len(), candidate: b.len() });
  }
  Ok(a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum())
}

/// Arithmetic mean; NaN for an empty slice so it never passes a threshold
pub fn mean(values: &[f32]) -> f32 {
  if values.is_empty() {
    return f32::NAN;
  }
  values.iter().sum::<f32>() / values.len() as f32
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
  images: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  model: Option<&'a str>,
}

#[derive(Deserialize)]
struct ExtractResponse {
  #[serde(default)]
  embeddings: Vec<Embedding>,
  #[serde(default)]
  error: Option<String>,
}

/// HTTP client for an external embedding service
pub struct RemoteEmbedder {
  client: Client,
  url: String,
  model: Option<String>,
}

impl RemoteEmbedder {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EmbedError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into(), model: None })
  }

  /// Ask the service for a specific model instead of its default
  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = Some(model.into());
    self
  }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
  async fn extract(&self, images: &[Vec<u8>]) -> Result<Vec<Embedding>, EmbedError> {
    let request = ExtractRequest {
      images: images.iter().map(|image| STANDARD.encode(image)).collect(),
      model: self.model.as_deref(),
    };

    let response = self.client.post(&self.url).json(&request).send().await?;
    let status = response.status();
    let body: ExtractResponse = match response.json().await {
      Ok(body) => body,
      Err(_) if !status.is_success() => {
        return Err(EmbedError::Service(format!("embedding service returned {status}")));
      }
      Err(e) => return Err(e.into()),
    };

    if let Some(error) = body.error {
      return Err(EmbedError::Service(error));
    }
    if !status.is_success() {
      return Err(EmbedError::Service(format!("embedding service returned {status}")));
    }
    if body.embeddings.is_empty() {
      return Err(EmbedError::Service("no embeddings could be extracted from the images".to_string()));
    }
    if let Some(first) = body.embeddings.first() {
      let dimension = first.len();
      if let Some(odd) = body.embeddings.iter().find(|e| e.len() != dimension) {
        return Err(EmbedError::DimensionMismatch { query: dimension, candidate: odd.len() });
      }
    }
    Ok(body.embeddings)
  }
}
