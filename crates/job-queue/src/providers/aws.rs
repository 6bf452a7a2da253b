//! AWS SQS provider implementation using the SQS query API over HTTP.
//!
//! Requests are form-encoded `POST`s signed with AWS Signature V4; responses
//! are XML. Talking HTTP directly keeps the provider testable against a mocked
//! endpoint and lets it target local emulators as easily as the real service.
//!
//! ## Authentication
//!
//! Credentials come from [`AwsSqsConfig`] or, when absent there, from the
//! `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
//! environment variables. Without credentials requests are sent unsigned,
//! which local emulators accept.
//!
//! ## Payloads
//!
//! Message bodies are sent verbatim so that other SQS producers and consumers
//! interoperate with this one. Message attributes travel as SQS string
//! message attributes; the correlation id uses the `correlation_id` attribute.

use crate::client::QueueProvider;
use crate::error::{ConfigurationError, QueueError, SerializationError};
use crate::message::{
    Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceiveOptions, ReceivedMessage,
    Timestamp,
};
use crate::provider::{
    AwsSqsConfig, ProviderType, MAX_VISIBILITY_TIMEOUT_SECONDS, MAX_WAIT_TIME_SECONDS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::{debug, warn};
use url::Url;

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

/// SQS query API version
const API_VERSION: &str = "2012-11-05";

/// Message attribute carrying the correlation id
const CORRELATION_ID_ATTRIBUTE: &str = "correlation_id";

// ============================================================================
// Error Types
// ============================================================================

/// AWS SQS specific errors
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("SQS service error: {code} - {message}")]
    ServiceError { code: String, message: String },

    #[error("SQS rejected the request: {code} - {message}")]
    RequestRejected { code: String, message: String },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Invalid receipt handle: {0}")]
    InvalidReceipt(String),

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Malformed response: {0}")]
    SerializationError(String),

    #[error("Element '{0}' missing from response")]
    MissingElement(String),
}

impl AwsError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authentication(_) => false,
            Self::NetworkError(_) => true,
            Self::Timeout(_) => true,
            Self::ServiceError { .. } => true, // Throttling and 5xx
            Self::RequestRejected { .. } => false,
            Self::QueueNotFound(_) => false,
            Self::InvalidReceipt(_) => false,
            Self::MessageTooLarge { .. } => false,
            Self::ConfigurationError(_) => false,
            Self::SerializationError(_) => false,
            Self::MissingElement(_) => false,
        }
    }

    /// Map AWS error to QueueError
    pub fn to_queue_error(self) -> QueueError {
        match self {
            Self::Authentication(msg) => QueueError::AuthenticationFailed { message: msg },
            Self::NetworkError(msg) => QueueError::ConnectionFailed { message: msg },
            Self::Timeout(duration) => QueueError::Timeout {
                duration: chrono::Duration::from_std(duration)
                    .unwrap_or_else(|_| chrono::Duration::zero()),
            },
            Self::ServiceError { code, message } => QueueError::ProviderError {
                provider: ProviderType::AwsSqs.to_string(),
                code,
                message,
            },
            Self::RequestRejected { code, message } => QueueError::RequestRejected {
                provider: ProviderType::AwsSqs.to_string(),
                code,
                message,
            },
            Self::QueueNotFound(queue) => QueueError::QueueNotFound { queue_name: queue },
            Self::InvalidReceipt(receipt) => QueueError::MessageNotFound { receipt },
            Self::MessageTooLarge { size, max_size } => {
                QueueError::MessageTooLarge { size, max_size }
            }
            Self::ConfigurationError(msg) => {
                QueueError::ConfigurationError(ConfigurationError::Invalid { message: msg })
            }
            Self::SerializationError(msg) => {
                QueueError::SerializationError(SerializationError::Xml { message: msg })
            }
            Self::MissingElement(element) => {
                QueueError::SerializationError(SerializationError::MissingElement { element })
            }
        }
    }
}

impl From<AwsError> for QueueError {
    fn from(error: AwsError) -> Self {
        error.to_queue_error()
    }
}

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// Static credentials used for signing
#[derive(Clone)]
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    /// Explicit configuration first, then the standard environment variables
    fn resolve(config: &AwsSqsConfig) -> Option<Self> {
        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            return Some(Self {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: config.session_token.clone(),
            });
        }

        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<REDACTED>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// AWS Signature Version 4 signer for request authentication
///
/// Implements the AWS Signature V4 signing process:
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
#[derive(Clone, Debug)]
struct AwsV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl AwsV4Signer {
    fn new(credentials: AwsCredentials, region: String) -> Self {
        Self {
            credentials,
            region,
            service: "sqs".to_string(),
        }
    }

    /// Sign a request whose parameters travel in the body
    ///
    /// Returns the headers to add: `Authorization`, `x-amz-date` and, for
    /// temporary credentials, `x-amz-security-token`.
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, AwsError> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        // Canonical headers must be sorted by name
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.credentials.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));

        // Parameters are in the body, so the canonical query string is empty
        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method, path, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = self.calculate_signature(&string_to_sign, &date_stamp)?;

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.credentials.access_key_id, credential_scope, signed_headers, signature
        );

        let mut headers = vec![
            ("Authorization".to_string(), authorization_header),
            ("x-amz-date".to_string(), amz_date),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        Ok(headers)
    }

    /// kSecret -> kDate -> kRegion -> kService -> kSigning -> signature
    fn calculate_signature(
        &self,
        string_to_sign: &str,
        date_stamp: &str,
    ) -> Result<String, AwsError> {
        let k_secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes())?;

        Ok(hex::encode(signature))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AwsError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AwsError::Authentication(format!("Invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

// ============================================================================
// AWS SQS Provider
// ============================================================================

/// AWS SQS queue provider implementation
///
/// Thread-safe; share it across tasks behind an `Arc`. The underlying HTTP
/// client pools connections.
pub struct AwsSqsProvider {
    http_client: HttpClient,
    signer: Option<AwsV4Signer>,
    endpoint: Url,
    host: String,
    request_timeout: std::time::Duration,
}

impl AwsSqsProvider {
    /// Create new AWS SQS provider
    ///
    /// # Errors
    ///
    /// Returns error if the region is empty, the endpoint is not a valid URL,
    /// or the HTTP client cannot be built.
    pub fn new(config: AwsSqsConfig) -> Result<Self, AwsError> {
        if config.region.is_empty() {
            return Err(AwsError::ConfigurationError(
                "Region cannot be empty".to_string(),
            ));
        }

        let endpoint = Url::parse(&config.resolved_endpoint()).map_err(|e| {
            AwsError::ConfigurationError(format!("Invalid SQS endpoint: {}", e))
        })?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(AwsError::ConfigurationError(format!(
                    "SQS endpoint has no host: {}",
                    endpoint
                )))
            }
        };

        let signer = match AwsCredentials::resolve(&config) {
            Some(credentials) => Some(AwsV4Signer::new(credentials, config.region.clone())),
            None => {
                warn!(endpoint = %endpoint, "No AWS credentials found; sending unsigned requests");
                None
            }
        };

        let request_timeout = std::time::Duration::from_secs(config.request_timeout_seconds);
        let http_client = HttpClient::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AwsError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            signer,
            endpoint,
            host,
            request_timeout,
        })
    }

    /// Send one query API action and return the raw XML response
    async fn call(
        &self,
        action: &str,
        mut params: BTreeMap<String, String>,
    ) -> Result<String, AwsError> {
        params.insert("Action".to_string(), action.to_string());
        params.insert("Version".to_string(), API_VERSION.to_string());

        let body = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .header("content-type", "application/x-www-form-urlencoded");

        if let Some(signer) = &self.signer {
            let path = match self.endpoint.path() {
                "" => "/",
                path => path,
            };
            for (name, value) in signer.sign_request("POST", &self.host, path, &body, &Utc::now())? {
                request = request.header(name, value);
            }
        }

        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                AwsError::Timeout(self.request_timeout)
            } else if e.is_connect() {
                AwsError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AwsError::NetworkError(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AwsError::NetworkError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let error = parse_error_response(&response_body, status.as_u16());
            debug!(action, status = status.as_u16(), error = %error, "SQS request failed");
            return Err(error);
        }

        Ok(response_body)
    }
}

#[async_trait]
impl QueueProvider for AwsSqsProvider {
    async fn resolve_queue(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueName".to_string(), queue.as_str().to_string());

        let xml = self.call("GetQueueUrl", params).await.map_err(|e| match e {
            // The error body names the queue inconsistently across emulators
            AwsError::QueueNotFound(_) => AwsError::QueueNotFound(queue.to_string()),
            other => other,
        })?;

        Ok(QueueUrl::new(parse_queue_url_response(&xml)?))
    }

    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        let max_size = ProviderType::AwsSqs.max_message_size();
        if message.body.len() > max_size {
            return Err(AwsError::MessageTooLarge {
                size: message.body.len(),
                max_size,
            }
            .into());
        }

        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        params.insert("MessageBody".to_string(), message.body.clone());

        let mut attributes: BTreeMap<&str, &str> = message
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(correlation_id) = &message.correlation_id {
            attributes.insert(CORRELATION_ID_ATTRIBUTE, correlation_id);
        }
        for (index, (name, value)) in attributes.into_iter().enumerate() {
            let prefix = format!("MessageAttribute.{}", index + 1);
            params.insert(format!("{}.Name", prefix), name.to_string());
            params.insert(format!("{}.Value.DataType", prefix), "String".to_string());
            params.insert(format!("{}.Value.StringValue", prefix), value.to_string());
        }

        let xml = self.call("SendMessage", params).await?;
        parse_send_message_response(&xml).map_err(QueueError::from)
    }

    async fn receive_message(
        &self,
        queue: &QueueUrl,
        options: &ReceiveOptions,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let wait_seconds = options
            .wait_time
            .num_seconds()
            .clamp(0, i64::from(MAX_WAIT_TIME_SECONDS));
        let visibility_seconds = options
            .visibility_timeout
            .num_seconds()
            .clamp(0, i64::from(MAX_VISIBILITY_TIMEOUT_SECONDS));

        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        params.insert("MaxNumberOfMessages".to_string(), "1".to_string());
        params.insert("WaitTimeSeconds".to_string(), wait_seconds.to_string());
        params.insert("VisibilityTimeout".to_string(), visibility_seconds.to_string());
        params.insert("AttributeName.1".to_string(), "All".to_string());
        params.insert("MessageAttributeName.1".to_string(), "All".to_string());

        // The lease starts no earlier than the request is sent
        let requested_at = Timestamp::now();
        let xml = self.call("ReceiveMessage", params).await?;
        let lease_expires_at =
            requested_at.plus(chrono::Duration::seconds(visibility_seconds));

        let messages = parse_receive_message_response(&xml)?;
        if messages.len() > 1 {
            warn!(
                count = messages.len(),
                "SQS returned more than one message for a single-message receive; extra messages will be redelivered"
            );
        }

        Ok(messages
            .into_iter()
            .next()
            .map(|raw| raw.into_received(lease_expires_at)))
    }

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        params.insert("ReceiptHandle".to_string(), receipt.handle().to_string());

        self.call("DeleteMessage", params).await?;
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSqs
    }
}

// ============================================================================
// XML Response Parsing
// ============================================================================

/// Walk `xml`, calling `on_end(path, text)` for every closed element
///
/// `path` holds the names of the enclosing elements ending with the closed
/// one; `text` is the text directly collected since the element's last
/// child opened, which for leaf elements is their full content.
fn walk_xml<F>(xml: &str, mut on_end: F) -> Result<(), AwsError>
where
    F: FnMut(&[String], String),
{
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                text.clear();
            }
            Ok(Event::Empty(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                on_end(&path, String::new());
                path.pop();
                text.clear();
            }
            Ok(Event::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| AwsError::SerializationError(format!("Invalid text: {}", e)))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(_)) => {
                on_end(&path, std::mem::take(&mut text));
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AwsError::SerializationError(format!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// True when `path` ends with `suffix`
fn path_ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

fn parse_queue_url_response(xml: &str) -> Result<String, AwsError> {
    let mut queue_url = None;
    walk_xml(xml, |path, text| {
        if path_ends_with(path, &["QueueUrl"]) {
            queue_url = Some(text.trim().to_string());
        }
    })?;

    queue_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AwsError::MissingElement("QueueUrl".to_string()))
}

fn parse_send_message_response(xml: &str) -> Result<MessageId, AwsError> {
    let mut message_id = None;
    walk_xml(xml, |path, text| {
        if path_ends_with(path, &["SendMessageResult", "MessageId"]) {
            message_id = Some(text.trim().to_string());
        }
    })?;

    message_id
        .and_then(|id| MessageId::from_str(&id).ok())
        .ok_or_else(|| AwsError::MissingElement("MessageId".to_string()))
}

/// Message as it appears in a ReceiveMessage response
#[derive(Debug, Default)]
struct RawMessage {
    message_id: Option<String>,
    receipt_handle: Option<String>,
    body: String,
    system_attributes: HashMap<String, String>,
    message_attributes: HashMap<String, String>,
}

impl RawMessage {
    fn into_received(mut self, lease_expires_at: Timestamp) -> ReceivedMessage {
        let delivered_at = Timestamp::now();
        let delivery_count = self
            .system_attributes
            .get("ApproximateReceiveCount")
            .and_then(|count| count.parse().ok())
            .unwrap_or(1);
        let first_delivered_at = self
            .system_attributes
            .get("ApproximateFirstReceiveTimestamp")
            .and_then(|millis| millis.parse().ok())
            .and_then(Timestamp::from_epoch_millis)
            .unwrap_or_else(|| delivered_at.clone());
        let correlation_id = self.message_attributes.remove(CORRELATION_ID_ATTRIBUTE);

        ReceivedMessage {
            message_id: self
                .message_id
                .as_deref()
                .and_then(|id| MessageId::from_str(id).ok())
                .unwrap_or_default(),
            body: self.body,
            attributes: self.message_attributes,
            correlation_id,
            receipt_handle: ReceiptHandle::new(
                self.receipt_handle.unwrap_or_default(),
                lease_expires_at,
                ProviderType::AwsSqs,
            ),
            delivery_count,
            first_delivered_at,
            delivered_at,
        }
    }
}

fn parse_receive_message_response(xml: &str) -> Result<Vec<RawMessage>, AwsError> {
    let mut messages = Vec::new();
    let mut current = RawMessage::default();
    let mut attribute_name: Option<String> = None;
    let mut attribute_value = String::new();

    walk_xml(xml, |path, text| {
        let Some(element) = path.last().map(String::as_str) else {
            return;
        };
        let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

        match (parent, element) {
            (Some("Message"), "MessageId") => current.message_id = Some(text.trim().to_string()),
            (Some("Message"), "ReceiptHandle") => {
                current.receipt_handle = Some(text.trim().to_string())
            }
            (Some("Message"), "Body") => current.body = text,
            (Some("Attribute"), "Name") | (Some("MessageAttribute"), "Name") => {
                attribute_name = Some(text.trim().to_string())
            }
            (Some("Attribute"), "Value") => attribute_value = text,
            (Some("Value"), "StringValue")
                if path_ends_with(path, &["MessageAttribute", "Value", "StringValue"]) =>
            {
                attribute_value = text
            }
            (Some("Message"), "Attribute") => {
                if let Some(name) = attribute_name.take() {
                    current
                        .system_attributes
                        .insert(name, std::mem::take(&mut attribute_value));
                }
            }
            (Some("Message"), "MessageAttribute") => {
                if let Some(name) = attribute_name.take() {
                    current
                        .message_attributes
                        .insert(name, std::mem::take(&mut attribute_value));
                }
            }
            (_, "Message") if path_ends_with(path, &["ReceiveMessageResult", "Message"]) => {
                messages.push(std::mem::take(&mut current));
            }
            _ => {}
        }
    })?;

    for message in &messages {
        if message.receipt_handle.as_deref().map_or(true, str::is_empty) {
            return Err(AwsError::MissingElement("ReceiptHandle".to_string()));
        }
    }

    Ok(messages)
}

/// Error codes SQS uses when a request is refused for rate reasons
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestThrottled",
    "OverLimit",
];

/// Map an SQS error document and HTTP status to an [`AwsError`]
///
/// Only throttling and server-side (5xx) failures are worth repeating; any
/// other sender fault is a [`AwsError::RequestRejected`].
fn parse_error_response(xml: &str, status_code: u16) -> AwsError {
    let mut code = None;
    let mut message = None;

    // Unparseable bodies fall through to the status-based mapping
    let _ = walk_xml(xml, |path, text| {
        if path_ends_with(path, &["Error", "Code"]) {
            code = Some(text.trim().to_string());
        } else if path_ends_with(path, &["Error", "Message"]) {
            message = Some(text.trim().to_string());
        }
    });

    let code = code.unwrap_or_else(|| format!("Http{}", status_code));
    let message = message.unwrap_or_else(|| "Unknown error".to_string());

    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" | "NonExistentQueue" => {
            AwsError::QueueNotFound(message)
        }
        "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "SignatureDoesNotMatch"
        | "MissingAuthenticationToken"
        | "InvalidAccessKeyId"
        | "AccessDenied"
        | "ExpiredToken" => AwsError::Authentication(format!("{}: {}", code, message)),
        "ReceiptHandleIsInvalid" | "InvalidReceiptHandle" => AwsError::InvalidReceipt(message),
        _ if THROTTLING_CODES.contains(&code.as_str()) => AwsError::ServiceError { code, message },
        _ if status_code == 401 || status_code == 403 => {
            AwsError::Authentication(format!("{}: {}", code, message))
        }
        _ if status_code >= 500 => AwsError::ServiceError { code, message },
        _ => AwsError::RequestRejected { code, message },
    }
}
