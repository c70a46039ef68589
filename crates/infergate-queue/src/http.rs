// SQS-compatible queue client
//
// Speaks the JSON wire protocol (x-amz-json-1.0 with an X-Amz-Target header)
// against unauthenticated SQS-compatible endpoints such as ElasticMQ or
// LocalStack. Request signing for the managed cloud API is out of scope.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use infergate_core::{
    CorrelationId, EngineConfig, EngineError, QueueClient, QueueMessage, Result,
    CORRELATION_ATTRIBUTE,
};

const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest<'a> {
    queue_url: &'a str,
    message_body: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageResponse {
    message_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest<'a> {
    queue_url: &'a str,
    max_number_of_messages: usize,
    wait_time_seconds: u64,
    visibility_timeout: u64,
    message_attribute_names: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResponse {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireMessage {
    body: String,
    receipt_handle: String,
    #[serde(default)]
    message_attributes: HashMap<String, WireMessageAttribute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireMessageAttribute {
    #[serde(default)]
    string_value: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageRequest<'a> {
    queue_url: &'a str,
    receipt_handle: &'a str,
}

/// Queue client for an SQS-compatible HTTP endpoint
pub struct HttpQueueClient {
    client: Client,
    request_queue_url: String,
    response_queue_url: String,
    visibility_timeout: Duration,
}

impl HttpQueueClient {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: Client::new(),
            request_queue_url: config.request_queue_url.clone(),
            response_queue_url: config.response_queue_url.clone(),
            visibility_timeout: config.visibility_timeout,
        }
    }

    /// One wire call: POST the action body to the queue URL
    async fn call<B: Serialize>(&self, queue_url: &str, action: &str, body: &B) -> Result<String> {
        let body = serde_json::to_vec(body)
            .map_err(|e| EngineError::queue(format!("{action} body unserializable: {e}")))?;
        let response = self
            .client
            .post(queue_url)
            .header("Content-Type", AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", format!("AmazonSQS.{action}"))
            .body(body)
            .send()
            .await
            .map_err(|e| EngineError::queue(format!("{action} request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::queue(format!("{action} response unreadable: {e}")))?;

        if !status.is_success() {
            return Err(EngineError::queue(format!(
                "{action} returned {status}: {text}"
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl QueueClient for HttpQueueClient {
    async fn send(&self, body: &str) -> Result<CorrelationId> {
        let request = SendMessageRequest {
            queue_url: &self.request_queue_url,
            message_body: body,
        };
        let raw = self
            .call(&self.request_queue_url, "SendMessage", &request)
            .await?;
        let parsed: SendMessageResponse = serde_json::from_str(&raw)
            .map_err(|e| EngineError::protocol(format!("SendMessage response malformed: {e}")))?;

        debug!(correlation_id = %parsed.message_id, "enqueued request message");
        Ok(parsed.message_id)
    }

    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<QueueMessage>> {
        let request = ReceiveMessageRequest {
            queue_url: &self.response_queue_url,
            max_number_of_messages: max_messages,
            wait_time_seconds: wait.as_secs(),
            visibility_timeout: self.visibility_timeout.as_secs(),
            message_attribute_names: vec![CORRELATION_ATTRIBUTE],
        };
        let raw = self
            .call(&self.response_queue_url, "ReceiveMessage", &request)
            .await?;
        let parsed: ReceiveMessageResponse = serde_json::from_str(&raw)
            .map_err(|e| EngineError::protocol(format!("ReceiveMessage response malformed: {e}")))?;

        Ok(parsed
            .messages
            .into_iter()
            .map(|message| QueueMessage {
                correlation_id: message
                    .message_attributes
                    .get(CORRELATION_ATTRIBUTE)
                    .and_then(|attr| attr.string_value.clone()),
                body: message.body,
                ack_token: message.receipt_handle,
            })
            .collect())
    }

    async fn delete(&self, ack_token: &str) -> Result<()> {
        let request = DeleteMessageRequest {
            queue_url: &self.response_queue_url,
            receipt_handle: ack_token,
        };
        self.call(&self.response_queue_url, "DeleteMessage", &request)
            .await?;
        Ok(())
    }
}
