use std::fmt::{Display, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use retrato_model::PortraitStyle;
use serde_json::{json, Value};

#[derive(Debug)]
pub struct EngineError(pub String);

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EngineError {}

/// Remote image-to-image renderer. The input is the customer upload, the
/// output is the finished portrait as JPEG bytes.
#[async_trait]
pub trait PortraitEngine: Send + Sync + 'static {
    async fn render(
        &self,
        image: &[u8],
        mime: &str,
        style: PortraitStyle,
    ) -> Result<Vec<u8>, EngineError>;
}

const BASE_PROMPT: &str = "Formal portrait of a PET transformed into a noble figure from a \
classic gallery. The image must convey grandeur, serenity, and timelessness. The animal \
occupies a central position, seated or slightly in three-quarter view, with a direct or subtly \
averted gaze, evoking silent authority. The attire must dialogue with the chosen period \
(Renaissance, Baroque, or Victorian), with textile richness and refined ornamental detailing. \
Lighting: soft lateral key light at 45 degrees, warm temperature. Background: palatial \
interior or textured neutral with atmospheric depth, blurred with slight pictorial grain, \
simulating oil on canvas. Composition: central symmetrical grid with wide margins, dominant \
vertical axis, 4:5 vertical proportion. Aesthetic reference: pictorial realism with \
historical theatricality and classical gravity. No visible modern elements. No caricatural \
humor. Palette restricted to earthy tones, golds, deep greens, and wine red. Texture \
simulating oil painting.";

fn style_prompt(style: PortraitStyle) -> &'static str {
    match style {
        PortraitStyle::Renaissance => {
            "Create an image representing a classic portrait of a PET in Renaissance \
             aesthetics, with a white lace collar, deep velvet tunic, central golden \
             medallion, balanced composition, serene expression, architectural background \
             with columns and diffused landscape. Soft lighting, moderate contrast, and \
             harmonious atmosphere."
        }
        PortraitStyle::Baroque => {
            "Create an image representing a classic portrait of a PET in Baroque aesthetics, \
             with luxurious fabrics, golden embroidery, intense light and shadow contrast, \
             dramatic dark background with heavy red curtains. Lighting with accentuated \
             chiaroscuro and punctual shine on metals and jewels. Theatrical and haughty \
             expression."
        }
        PortraitStyle::Victorian => {
            "Create an image representing a classic portrait of a PET in Victorian \
             aesthetics, wearing a structured waistcoat, antique brooch, top hat or elegant \
             bow. Velvet-upholstered armchair, library in the background. Soft and \
             melancholic lighting, introspective aristocratic atmosphere."
        }
    }
}

/// Client for an OpenAI-style image generation API. The upload travels
/// inline as a data URL; the response points at a hosted result which is
/// fetched before returning.
pub struct AimlPortraitEngine {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AimlPortraitEngine {
    #[must_use]
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            base_url,
            api_key,
            model,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl PortraitEngine for AimlPortraitEngine {
    async fn render(
        &self,
        image: &[u8],
        mime: &str,
        style: PortraitStyle,
    ) -> Result<Vec<u8>, EngineError> {
        let data_url = format!("data:{mime};base64,{}", BASE64.encode(image));
        let prompt = format!("{}\n\n{}", style_prompt(style), BASE_PROMPT);

        let response = self
            .client
            .post(format!(
                "{}/v1/images/generations",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "image_urls": [data_url],
                "prompt": prompt,
                "num_images": 1,
            }))
            .send()
            .await
            .map_err(|e| EngineError(format!("engine request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError(format!("engine error ({status}): {body}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError(format!("engine response parse failed: {e}")))?;
        let image_url = payload["data"][0]["url"]
            .as_str()
            .ok_or_else(|| EngineError("no image generated in response".to_string()))?;

        let image_response = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| EngineError(format!("result fetch failed: {e}")))?;
        if !image_response.status().is_success() {
            return Err(EngineError(format!(
                "result fetch failed with status {}",
                image_response.status()
            )));
        }
        let bytes = image_response
            .bytes()
            .await
            .map_err(|e| EngineError(format!("result read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
