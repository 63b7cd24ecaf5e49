//! Conversation based understanding API
//!
//! One description takes three calls: open a conversation, upload the image into it,
//! then run the app with the query and the uploaded file id.

use log::info;
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

use super::{DescriptionService, ServiceError, ensure_success};
use crate::pipeline::fetch::ImageAsset;
use crate::utils::{image_mime, redact};

const AUTH_HEADER: &str = "X-Appbuilder-Authorization";

#[derive(Debug, Deserialize)]
struct ConversationReply {
    conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadReply {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunReply {
    answer: Option<String>,
}

pub struct AppBuilderService {
    client: Client,
    endpoint: String,
    app_id: String,
    authorization: String,
}

impl AppBuilderService {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        app_id: impl Into<String>,
        authorization: impl Into<String>,
    ) -> Self {
        let service = Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            authorization: authorization.into(),
        };
        info!(
            "App builder client ready: app_id={}, authorization={}",
            service.app_id,
            redact(&service.authorization)
        );
        service
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn create_conversation(&self) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(self.url("/v2/app/conversation"))
            .header(AUTH_HEADER, &self.authorization)
            .json(&json!({ "app_id": self.app_id }))
            .send()?;
        let reply: ConversationReply = ensure_success(response)?.json()?;
        let conversation_id = reply
            .conversation_id
            .ok_or_else(|| ServiceError::Payload("missing conversation_id".to_string()))?;
        info!("Created conversation {}", conversation_id);
        Ok(conversation_id)
    }

    fn upload_file(&self, conversation_id: &str, image: &ImageAsset) -> Result<String, ServiceError> {
        let start = Instant::now();
        let part = multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name())
            .mime_str(image_mime(&image.bytes))?;
        let form = multipart::Form::new()
            .text("app_id", self.app_id.clone())
            .text("conversation_id", conversation_id.to_string())
            .part("file", part);

        let response = self
            .client
            .post(self.url("/v2/app/conversation/file/upload"))
            .header(AUTH_HEADER, &self.authorization)
            .multipart(form)
            .send()?;
        let reply: UploadReply = ensure_success(response)?.json()?;
        let file_id = reply
            .id
            .ok_or_else(|| ServiceError::Payload("missing file id".to_string()))?;
        info!(duration = &*format!("{:?}", start.elapsed()); "Uploaded {} as file {}", image.link, file_id);
        Ok(file_id)
    }

    fn run(&self, conversation_id: &str, query: &str, file_id: &str) -> Result<String, ServiceError> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.url("/v2/app/conversation/runs"))
            .header(AUTH_HEADER, &self.authorization)
            .json(&json!({
                "app_id": self.app_id,
                "query": query,
                "stream": false,
                "conversation_id": conversation_id,
                "file_ids": [file_id],
            }))
            .send()?;
        let reply: RunReply = ensure_success(response)?.json()?;
        let answer = reply
            .answer
            .ok_or_else(|| ServiceError::Payload("missing answer".to_string()))?;
        info!(duration = &*format!("{:?}", start.elapsed()); "App run completed for conversation {}", conversation_id);
        Ok(answer)
    }
}

impl DescriptionService for AppBuilderService {
    fn name(&self) -> &str {
        "app-builder"
    }

    fn request(&self, image: &ImageAsset, query: &str) -> Result<String, ServiceError> {
        let conversation_id = self.create_conversation()?;
        let file_id = self.upload_file(&conversation_id, image)?;
        self.run(&conversation_id, query, &file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CannedResponse, client, png_bytes, serve};

    fn asset() -> ImageAsset {
        ImageAsset {
            link: "https://example.com/a.png".to_string(),
            bytes: png_bytes(64),
            persisted: None,
        }
    }

    #[test]
    fn request_runs_conversation_upload_and_run() {
        let (base, rx) = serve(vec![
            CannedResponse::json(json!({"conversation_id": "conv-1"})),
            CannedResponse::json(json!({"id": "file-9", "conversation_id": "conv-1"})),
            CannedResponse::json(json!({"answer": "a cat"})),
        ]);
        let service = AppBuilderService::new(client(), base, "app-7", "Bearer secret-token");

        let answer = service.request(&asset(), "what is it?").unwrap();
        assert_eq!(answer, "a cat");

        let create = rx.recv().unwrap();
        assert_eq!(create.request_line, "POST /v2/app/conversation HTTP/1.1");
        assert_eq!(create.header(AUTH_HEADER), Some("Bearer secret-token"));

        let upload = rx.recv().unwrap();
        assert!(upload.request_line.starts_with("POST /v2/app/conversation/file/upload"));
        assert!(String::from_utf8_lossy(&upload.body).contains("conv-1"));

        let run = rx.recv().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&run.body).unwrap();
        assert_eq!(body["file_ids"], json!(["file-9"]));
        assert_eq!(body["query"], json!("what is it?"));
        assert_eq!(body["stream"], json!(false));
    }

    #[test]
    fn server_error_surfaces_as_status() {
        let (base, _rx) = serve(vec![CannedResponse::status(500)]);
        let service = AppBuilderService::new(client(), base, "app-7", "token");

        let err = service.request(&asset(), "q").unwrap_err();
        assert!(matches!(err, ServiceError::Status { .. }));
    }

    #[test]
    fn missing_answer_is_a_payload_error() {
        let (base, _rx) = serve(vec![
            CannedResponse::json(json!({"conversation_id": "c"})),
            CannedResponse::json(json!({"id": "f"})),
            CannedResponse::json(json!({"code": "quota"})),
        ]);
        let service = AppBuilderService::new(client(), base, "app-7", "token");

        let err = service.request(&asset(), "q").unwrap_err();
        assert!(matches!(err, ServiceError::Payload(_)));
    }
}
