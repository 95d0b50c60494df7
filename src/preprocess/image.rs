//! Image attachments: answered by an image-understanding backend.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

/// Image-understanding collaborator: answers `question` about the image.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image: &[u8], mime_type: &str, question: &str) -> anyhow::Result<String>;
}

/// MIME type for an image file name.
pub fn mime_type(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "image/png"
    }
}

/// Gemini `generateContent` client with the image sent inline.
pub struct GeminiImageAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiImageAnalyzer {
    pub fn new(api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key,
            model,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

fn request_body(image: &[u8], mime_type: &str, question: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                {
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(image)
                    }
                },
                { "text": question }
            ]
        }]
    })
}

fn response_text(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl ImageAnalyzer for GeminiImageAnalyzer {
    async fn analyze(&self, image: &[u8], mime_type: &str, question: &str) -> anyhow::Result<String> {
        tracing::info!("Analyzing {} image ({} bytes)", mime_type, image.len());

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(image, mime_type, question))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Vision API error ({}): {}", status, body));
        }

        let body: Value = response.json().await?;
        response_text(&body).ok_or_else(|| anyhow::anyhow!("Vision API returned no text"))
    }
}
