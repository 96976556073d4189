//! The restoration backend: send one image plus an instruction, get one image
//! back.
//!
//! [`RestorationClient`] is the seam the workflow talks to. The shipped
//! implementation, [`GeminiRestorationClient`], calls the Generative Language
//! `generateContent` REST endpoint directly with `reqwest`. All prompt text
//! lives in [`crate::prompts`].
//!
//! ## Response handling
//!
//! Only the first candidate is read, and within it only the first part that
//! carries `inlineData`. Text parts (the model sometimes narrates what it
//! did) are skipped. No inline image at all is [`ColoriFxError::NoImageReturned`].
//! There are no retries; the user re-runs the transform.

use crate::config::RestorationConfig;
use crate::error::ColoriFxError;
use crate::pipeline::encode::{sniff_image, EncodedImage};
use crate::prompts::{build_prompt, RESTORATION_PROMPT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Media type assumed when the API omits one for an inline image.
const FALLBACK_RESULT_MIME: &str = "image/png";

/// A backend that turns a scanned document into a restored one.
///
/// `instruction` is the user's free text (possibly empty); implementations
/// combine it with their fixed restoration prompt.
#[async_trait]
pub trait RestorationClient: Send + Sync {
    async fn restore(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<EncodedImage, ColoriFxError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default, alias = "mime_type")]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

// ── Gemini client ────────────────────────────────────────────────────────

/// [`RestorationClient`] backed by the Gemini image model.
pub struct GeminiRestorationClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    prompt_template: String,
}

impl std::fmt::Debug for GeminiRestorationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiRestorationClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl GeminiRestorationClient {
    /// Build a client from the config, resolving the API key from the
    /// environment when the config does not carry one.
    pub fn from_config(config: &RestorationConfig) -> Result<Self, ColoriFxError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ColoriFxError::ProviderNotConfigured {
                provider: "gemini".to_string(),
                hint: "Set GEMINI_API_KEY (or API_KEY), or pass --api-key.".to_string(),
            })?;

        let http = reqwest::Client::builder()
            .timeout(config.api_timeout())
            .build()
            .map_err(|e| ColoriFxError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            prompt_template: config
                .prompt_template
                .clone()
                .unwrap_or_else(|| RESTORATION_PROMPT.to_string()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl RestorationClient for GeminiRestorationClient {
    async fn restore(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<EncodedImage, ColoriFxError> {
        let start = Instant::now();
        let body = build_request(image, &self.prompt_template, instruction, self.temperature);
        info!(
            "Sending {} ({} bytes) to {}",
            image.mime_type(),
            image.len(),
            self.model
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request timed out after {}ms", start.elapsed().as_millis())
                } else {
                    e.to_string()
                };
                ColoriFxError::RestorationFailed { message }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Restoration API returned HTTP {}", status);
            return Err(ColoriFxError::RestorationFailed {
                message: format!("HTTP {status}: {}", truncate(&detail, 300)),
            });
        }

        let parsed: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| ColoriFxError::RestorationFailed {
                    message: format!("unreadable response: {e}"),
                })?;

        let result = extract_first_image(parsed)?;
        debug!(
            "Restoration returned {} ({} bytes) in {:?}",
            result.mime_type(),
            result.len(),
            start.elapsed()
        );
        Ok(result)
    }
}

/// Build the `generateContent` body: the image first, then the prompt.
pub fn build_request(
    image: &EncodedImage,
    template: &str,
    instruction: &str,
    temperature: f32,
) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: None,
            parts: vec![
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: Some(image.mime_type().to_string()),
                        data: image.base64_payload(),
                    }),
                },
                Part {
                    text: Some(build_prompt(template, instruction)),
                    inline_data: None,
                },
            ],
        }],
        generation_config: Some(GenerationConfig {
            temperature,
            response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
        }),
    }
}

/// Take the first inline image of the first candidate.
///
/// The payload must be valid base64 of a decodable image; anything else is a
/// failed restoration, never a result.
pub fn extract_first_image(response: GenerateContentResponse) -> Result<EncodedImage, ColoriFxError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ColoriFxError::NoImageReturned)?;

    if let Some(ref reason) = candidate.finish_reason {
        debug!("First candidate finish reason: {}", reason);
    }

    let inline = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .find_map(|p| p.inline_data)
        .ok_or(ColoriFxError::NoImageReturned)?;

    let mime = inline
        .mime_type
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| FALLBACK_RESULT_MIME.to_string());

    let image = EncodedImage::from_base64(mime, &inline.data).map_err(|e| {
        ColoriFxError::RestorationFailed {
            message: e.to_string(),
        }
    })?;
    sniff_image(image.bytes(), image.mime_type()).map_err(|e| ColoriFxError::RestorationFailed {
        message: format!("returned image is unusable: {e}"),
    })?;
    Ok(image)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::tests::png_bytes;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).expect("valid response json")
    }

    #[test]
    fn request_puts_image_before_prompt() {
        let img = EncodedImage::new("image/jpeg", b"IMGA".to_vec());
        let req = build_request(&img, RESTORATION_PROMPT, "Make it vertical", 0.1);
        let json = serde_json::to_value(&req).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "SU1HQQ==");
        let text = parts[1]["text"].as_str().unwrap();
        assert!(text.starts_with("DOCUMENT RESTORATION SYSTEM"));
        assert!(text.ends_with("ADDITIONAL USER REQUEST: Make it vertical"));

        let gen = &json["generationConfig"];
        assert!((gen["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(gen["responseModalities"][0], "IMAGE");
    }

    #[test]
    fn extracts_first_inline_image_skipping_text() {
        let first = STANDARD.encode(png_bytes(2, 2, [255, 0, 0, 255]));
        let second = STANDARD.encode(png_bytes(3, 3, [0, 255, 0, 255]));
        let json = format!(
            r#"{{"candidates":[
                {{"content":{{"parts":[
                    {{"text":"Here is your document"}},
                    {{"inlineData":{{"mimeType":"image/png","data":"{first}"}}}},
                    {{"inlineData":{{"mimeType":"image/png","data":"{second}"}}}}
                ]}},"finishReason":"STOP"}},
                {{"content":{{"parts":[{{"inlineData":{{"mimeType":"image/png","data":"{second}"}}}}]}}}}
            ]}}"#
        );
        let img = extract_first_image(parse(&json)).unwrap();
        assert_eq!(img.base64_payload(), first);
    }

    #[test]
    fn snake_case_inline_data_is_accepted() {
        let data = STANDARD.encode(png_bytes(1, 1, [0, 0, 0, 255]));
        let json = format!(
            r#"{{"candidates":[{{"content":{{"parts":[{{"inline_data":{{"mime_type":"image/png","data":"{data}"}}}}]}}}}]}}"#
        );
        assert!(extract_first_image(parse(&json)).is_ok());
    }

    #[test]
    fn missing_mime_defaults_to_png() {
        let data = STANDARD.encode(png_bytes(1, 1, [0, 0, 0, 255]));
        let json = format!(
            r#"{{"candidates":[{{"content":{{"parts":[{{"inlineData":{{"data":"{data}"}}}}]}}}}]}}"#
        );
        assert_eq!(extract_first_image(parse(&json)).unwrap().mime_type(), "image/png");
    }

    #[test]
    fn no_candidates_or_text_only_is_no_image() {
        assert!(matches!(
            extract_first_image(parse(r#"{"candidates":[]}"#)),
            Err(ColoriFxError::NoImageReturned)
        ));
        assert!(matches!(
            extract_first_image(parse(r#"{}"#)),
            Err(ColoriFxError::NoImageReturned)
        ));
        assert!(matches!(
            extract_first_image(parse(
                r#"{"candidates":[{"content":{"parts":[{"text":"I cannot do that"}]}}]}"#
            )),
            Err(ColoriFxError::NoImageReturned)
        ));
        assert!(matches!(
            extract_first_image(parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#)),
            Err(ColoriFxError::NoImageReturned)
        ));
    }

    #[test]
    fn garbage_payload_is_a_failed_restoration() {
        let json = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"SU1HQg=="}}]}}]}"#;
        assert!(matches!(
            extract_first_image(parse(json)),
            Err(ColoriFxError::RestorationFailed { .. })
        ));
    }

    #[test]
    fn client_requires_api_key() {
        let config = RestorationConfig::builder().api_key("k").build().unwrap();
        let client = GeminiRestorationClient::from_config(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        assert!(!format!("{client:?}").contains("\"k\""));
    }

    #[test]
    fn truncate_long_detail() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc\u{2026}");
    }
}
