//! Image generation collaborator (Replicate predictions API)
//!
//! The default model is PhotoMaker: up to four reference photos of a person
//! plus a prompt produce new pictures of that person.

use crate::provider::{http_client, retry_after, ProviderError};
use base64::Engine;
use lifesim_error::{Error, ErrorKind, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Replicate accepts at most this many reference photos
pub const MAX_REFERENCE_IMAGES: usize = 4;

/// Used when the caller gives no negative prompt
pub const DEFAULT_NEGATIVE_PROMPT: &str = "lowres, bad anatomy, bad hands, text, error, \
missing fingers, extra digit, fewer digits, cropped, worst quality, low quality, normal quality, \
jpeg artifacts, signature, watermark, username, blurry";

/// tencentarc/photomaker
pub const PHOTOMAKER_VERSION: &str =
    "ddfc2b08d209f9fa8c1eca692712918bd449f695dabb4a958da31802a9570fe4";

/// One image generation call
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    /// Raw bytes of reference photos, only the first four are sent
    pub reference_images: Vec<Vec<u8>>,
    pub steps: u32,
    pub negative_prompt: Option<String>,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_images: Vec::new(),
            steps: 50,
            negative_prompt: None,
        }
    }

    pub fn with_reference_images(mut self, images: Vec<Vec<u8>>) -> Self {
        self.reference_images = images;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    /// The model input object sent to Replicate
    pub fn to_input(&self) -> serde_json::Value {
        let mut input = serde_json::Map::new();
        input.insert("prompt".into(), self.prompt.clone().into());
        input.insert("num_steps".into(), self.steps.into());
        input.insert(
            "negative_prompt".into(),
            self.negative_prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NEGATIVE_PROMPT.to_string())
                .into(),
        );

        for (i, image) in self.reference_images.iter().take(MAX_REFERENCE_IMAGES).enumerate() {
            let key = if i == 0 {
                "input_image".to_string()
            } else {
                format!("input_image{}", i + 1)
            };
            let data = base64::engine::general_purpose::STANDARD.encode(image);
            input.insert(key, format!("data:{};base64,{}", image_mime_type(image), data).into());
        }

        serde_json::Value::Object(input)
    }
}

/// MIME type from the file's magic bytes
fn image_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// Read up to four `.png`/`.jpg`/`.jpeg` files from a directory, in name order
pub fn load_reference_images(dir: impl AsRef<Path>) -> Result<Vec<Vec<u8>>> {
    let dir = dir.as_ref();
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| Error::from(e).with_context("dir", dir.display().to_string()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .take(MAX_REFERENCE_IMAGES)
        .map(|path| {
            std::fs::read(&path)
                .map_err(|e| Error::from(e).with_context("path", path.display().to_string()))
        })
        .collect()
}

/// The image generation collaborator
#[allow(async_fn_in_trait)]
pub trait ImageGenerator: Send + Sync {
    /// Generate images and return each one's encoded bytes
    async fn generate_images(&self, request: ImageRequest) -> Result<Vec<Vec<u8>>>;
}

/// Configuration for the Replicate adapter
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_token: String,
    pub base_url: String,
    pub model_version: String,
    pub timeout_secs: u64,
    pub poll_interval: Duration,
    pub max_polls: usize,
}

impl ReplicateConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: "https://api.replicate.com/v1".into(),
            model_version: PHOTOMAKER_VERSION.into(),
            timeout_secs: 300,
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        }
    }

    /// Reads `REPLICATE_API_TOKEN`
    pub fn from_env() -> Result<Self> {
        std::env::var("REPLICATE_API_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| Error::missing_env("REPLICATE_API_TOKEN").with_operation("replicate::from_env"))
    }
}

/// Replicate-backed image generator
pub struct ReplicateImageGenerator {
    client: Client,
    config: ReplicateConfig,
}

impl ReplicateImageGenerator {
    pub fn new(config: ReplicateConfig) -> Result<Self> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    async fn check(response: reqwest::Response) -> std::result::Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let retry = retry_after(&response);
        let text = response.text().await.unwrap_or_default();
        Err(ProviderError::from_status(status, text, retry))
    }

    async fn create_prediction(&self, request: &ImageRequest) -> std::result::Result<Prediction, ProviderError> {
        let body = serde_json::json!({
            "version": self.config.model_version,
            "input": request.to_input(),
        });

        let response = self
            .client
            .post(format!("{}/predictions", self.config.base_url))
            .bearer_auth(&self.config.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn fetch_prediction(&self, url: &str) -> std::result::Result<Prediction, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, ProviderError> {
        let response = self.client.get(url).send().await.map_err(ProviderError::from_reqwest)?;
        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(ProviderError::from_reqwest)?;
        Ok(bytes.to_vec())
    }

    /// Poll until the prediction leaves the starting/processing states
    async fn wait_for(&self, mut prediction: Prediction) -> Result<Prediction> {
        let mut polls = 0;
        while prediction.is_pending() {
            if polls >= self.config.max_polls {
                return Err(Error::new(
                    ErrorKind::CollaboratorTimeout,
                    format!("prediction {} still {} after {} polls", prediction.id, prediction.status, polls),
                )
                .with_context("prediction", prediction.id));
            }
            let url = prediction.urls.get.clone().ok_or_else(|| {
                Error::collaborator_failed("pending prediction has no polling URL")
                    .with_context("prediction", prediction.id.clone())
            })?;

            tokio::time::sleep(self.config.poll_interval).await;
            prediction = self
                .fetch_prediction(&url)
                .await
                .map_err(|e| e.into_error("replicate"))?;
            polls += 1;
            debug!(prediction = %prediction.id, status = %prediction.status, polls, "polled prediction");
        }
        Ok(prediction)
    }
}

impl ImageGenerator for ReplicateImageGenerator {
    async fn generate_images(&self, request: ImageRequest) -> Result<Vec<Vec<u8>>> {
        let op = "replicate::generate_images";

        let prediction = self
            .create_prediction(&request)
            .await
            .map_err(|e| e.into_error("replicate").with_operation(op))?;
        let prediction = self.wait_for(prediction).await.map_err(|e| e.with_operation(op))?;

        if prediction.status != "succeeded" {
            let reason = prediction
                .error
                .as_ref()
                .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                .unwrap_or_else(|| "no error detail".into());
            return Err(Error::collaborator_failed(format!("prediction {}: {}", prediction.status, reason))
                .with_operation(op)
                .with_context("prediction", prediction.id));
        }

        let urls = output_urls(prediction.output.as_ref());
        info!(prediction = %prediction.id, images = urls.len(), "prediction succeeded");

        let mut images = Vec::with_capacity(urls.len());
        for url in &urls {
            let bytes = self
                .download(url)
                .await
                .map_err(|e| e.into_error("replicate").with_operation(op).with_context("url", url.clone()))?;
            images.push(bytes);
        }
        Ok(images)
    }
}

/// Output URLs of a finished prediction; the field is either a list or a single string
pub fn output_urls(output: Option<&serde_json::Value>) -> Vec<String> {
    match output {
        Some(serde_json::Value::String(url)) => vec![url.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: PredictionUrls,
}

impl Prediction {
    fn is_pending(&self) -> bool {
        matches!(self.status.as_str(), "starting" | "processing")
    }
}

#[derive(Debug, Default, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}
