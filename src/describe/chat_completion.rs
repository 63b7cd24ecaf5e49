use base64::{Engine, engine::general_purpose::STANDARD};
use log::info;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

use super::{DescriptionService, ServiceError, ensure_success};
use crate::pipeline::fetch::ImageAsset;
use crate::utils::{image_mime, redact};

#[derive(Debug, Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// OpenAI compatible chat completion endpoint with the image inlined as a data URL.
pub struct ChatCompletionService {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionService {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let service = Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        };
        info!(
            "Chat completion client ready: model={}, api_key={}",
            service.model,
            redact(&service.api_key)
        );
        service
    }
}

/// `data:<mime>;base64,<payload>` for an image payload
pub fn data_url(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", image_mime(bytes), STANDARD.encode(bytes))
}

impl DescriptionService for ChatCompletionService {
    fn name(&self) -> &str {
        "chat-completion"
    }

    fn request(&self, image: &ImageAsset, query: &str) -> Result<String, ServiceError> {
        let start = Instant::now();
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": query },
                    { "type": "image_url", "image_url": { "url": data_url(&image.bytes) } },
                ],
            }],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let reply: CompletionReply = ensure_success(response)?.json()?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::Payload("reply has no message content".to_string()))?;
        info!(duration = &*format!("{:?}", start.elapsed()); "Received completion for {}", image.link);
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CannedResponse, client, png_bytes, serve};

    #[test]
    fn data_url_carries_sniffed_mime() {
        let url = data_url(&png_bytes(16));
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn request_sends_query_and_inline_image() {
        let (base, rx) = serve(vec![CannedResponse::json(json!({
            "choices": [{"message": {"role": "assistant", "content": "a cat"}}]
        }))]);
        let service = ChatCompletionService::new(client(), base, "key-123", "vision-model");
        let image = ImageAsset {
            link: "https://example.com/a.png".to_string(),
            bytes: png_bytes(32),
            persisted: None,
        };

        assert_eq!(service.request(&image, "what is it?").unwrap(), "a cat");

        let recorded = rx.recv().unwrap();
        assert_eq!(recorded.request_line, "POST /chat/completions HTTP/1.1");
        assert_eq!(recorded.header("authorization"), Some("Bearer key-123"));
        let body: serde_json::Value = serde_json::from_slice(&recorded.body).unwrap();
        assert_eq!(body["model"], json!("vision-model"));
        assert_eq!(body["messages"][0]["content"][0]["text"], json!("what is it?"));
        let image_url = body["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(image_url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn empty_choices_is_a_payload_error() {
        let (base, _rx) = serve(vec![CannedResponse::json(json!({"choices": []}))]);
        let service = ChatCompletionService::new(client(), base, "k", "m");
        let image = ImageAsset {
            link: "l".to_string(),
            bytes: png_bytes(8),
            persisted: None,
        };

        assert!(matches!(
            service.request(&image, "q"),
            Err(ServiceError::Payload(_))
        ));
    }
}
