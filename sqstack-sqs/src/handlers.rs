//! HTTP handlers for SQS
//!
//! Accepts both wire flavours SDKs use: the query protocol (form-encoded
//! `Action=...`, XML responses) and the JSON protocol (`X-Amz-Target:
//! AmazonSQS.<Action>`, JSON responses).

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::Response,
};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use sqstack_core::{escape_xml, AwsError, ErrorCode, RequestId, SQS_XML_NAMESPACE};

use crate::message::{Message, MessageAttribute, NewMessage, SentMessage};
use crate::registry::{Sqs, SqsError};

const JSON_TARGET_PREFIX: &str = "AmazonSQS.";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const MAX_RECEIVE_COUNT: usize = 10;
const MAX_DELAY_SECONDS: u32 = 900;

/// Actions the SQS API defines that the emulator does not serve
const UNSUPPORTED_ACTIONS: &[&str] = &[
    "AddPermission",
    "ChangeMessageVisibility",
    "ChangeMessageVisibilityBatch",
    "CreateQueue",
    "DeleteMessage",
    "DeleteMessageBatch",
    "DeleteQueue",
    "ListDeadLetterSourceQueues",
    "ListQueueTags",
    "PurgeQueue",
    "RemovePermission",
    "SendMessageBatch",
    "SetQueueAttributes",
    "TagQueue",
    "UntagQueue",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Query,
    Json,
}

/// Request parameters in either wire flavour
enum Params {
    Form(HashMap<String, String>),
    Json(Map<String, Value>),
}

impl Params {
    fn get(&self, name: &str) -> Option<String> {
        match self {
            Self::Form(params) => params.get(name).cloned(),
            Self::Json(params) => match params.get(name)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            },
        }
    }

    fn require(&self, name: &str) -> Result<String, AwsError> {
        self.get(name).ok_or_else(|| {
            AwsError::new(
                ErrorCode::MissingParameter,
                format!("The request must contain the parameter {name}."),
            )
        })
    }

    /// String-valued message attributes with their data types. Binary
    /// values are not stored.
    fn message_attributes(&self) -> HashMap<String, MessageAttribute> {
        let mut attributes = HashMap::new();
        match self {
            Self::Form(params) => {
                for n in 1.. {
                    let Some(name) = params.get(&format!("MessageAttribute.{n}.Name")) else {
                        break;
                    };
                    let Some(value) = params.get(&format!("MessageAttribute.{n}.Value.StringValue"))
                    else {
                        continue;
                    };
                    let data_type = params
                        .get(&format!("MessageAttribute.{n}.Value.DataType"))
                        .map_or("String", String::as_str);
                    attributes.insert(name.clone(), MessageAttribute::new(data_type, value.as_str()));
                }
            }
            Self::Json(params) => {
                if let Some(Value::Object(map)) = params.get("MessageAttributes") {
                    for (name, value) in map {
                        let Some(s) = value.get("StringValue").and_then(Value::as_str) else {
                            continue;
                        };
                        let data_type = value
                            .get("DataType")
                            .and_then(Value::as_str)
                            .unwrap_or("String");
                        attributes.insert(name.clone(), MessageAttribute::new(data_type, s));
                    }
                }
            }
        }
        attributes
    }
}

/// Successful results, rendered per protocol
enum Outcome {
    QueueUrl(String),
    QueueUrls(Vec<String>),
    Sent(SentMessage),
    Messages(Vec<Message>),
    Attributes(Vec<(&'static str, String)>),
}

/// Handle SQS requests in either protocol
pub async fn handle_request(
    State(sqs): State<Arc<Sqs>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = RequestId::new();

    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .and_then(|t| t.strip_prefix(JSON_TARGET_PREFIX));

    let (protocol, action, params) = match target {
        Some(action) => {
            // Some tools send no body at all for parameterless calls
            let params = if body.is_empty() {
                Map::new()
            } else {
                match serde_json::from_slice::<Value>(&body) {
                    Ok(Value::Object(map)) => map,
                    _ => {
                        let error = AwsError::new(
                            ErrorCode::InvalidParameterValue,
                            "Request body is not a JSON object",
                        );
                        return error_response(Protocol::Json, error, &request_id);
                    }
                }
            };
            (Protocol::Json, action.to_string(), Params::Json(params))
        }
        None => {
            let params = query_params(&uri, &body);
            let action = params.get("Action").cloned().unwrap_or_default();
            (Protocol::Query, action, Params::Form(params))
        }
    };

    info!(action = %action, protocol = ?protocol, "SQS request");

    match dispatch(&sqs, &action, &params).await {
        Ok(outcome) => success_response(protocol, &action, outcome, &request_id),
        Err(error) => {
            debug!(action = %action, error = %error, "SQS request failed");
            error_response(protocol, error, &request_id)
        }
    }
}

async fn dispatch(sqs: &Sqs, action: &str, params: &Params) -> Result<Outcome, AwsError> {
    match action {
        "GetQueueUrl" => get_queue_url(sqs, params),
        "ListQueues" => Ok(list_queues(sqs, params)),
        "SendMessage" => send_message(sqs, params),
        "ReceiveMessage" => receive_message(sqs, params).await,
        "GetQueueAttributes" => get_queue_attributes(sqs, params).await,
        _ if UNSUPPORTED_ACTIONS.contains(&action) => {
            warn!(action = %action, "Unsupported SQS operation");
            Err(AwsError::new(
                ErrorCode::NotImplemented,
                format!("{action} is not supported by this emulator"),
            ))
        }
        _ => {
            warn!(action = %action, "Unknown SQS operation");
            Err(AwsError::new(
                ErrorCode::InvalidAction,
                format!("The action {action} is not valid for this endpoint."),
            ))
        }
    }
}

/// Query-protocol parameters come from the query string and/or a
/// form-encoded body; body values win.
fn query_params(uri: &Uri, body: &[u8]) -> HashMap<String, String> {
    let query = uri.query().unwrap_or("").as_bytes();
    form_urlencoded::parse(query)
        .chain(form_urlencoded::parse(body))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

impl From<SqsError> for AwsError {
    fn from(error: SqsError) -> Self {
        match error {
            SqsError::QueueNotFound(_) => AwsError::new(
                ErrorCode::NonExistentQueue,
                "The specified queue does not exist for this wsdl version.",
            ),
            SqsError::QueueUnavailable(name) => AwsError::new(
                ErrorCode::ServiceUnavailable,
                format!("Queue {name} is shutting down"),
            ),
            SqsError::ConfigLoadFailure(reason) => AwsError::new(ErrorCode::InternalError, reason),
        }
    }
}

// === Handlers ===

fn get_queue_url(sqs: &Sqs, params: &Params) -> Result<Outcome, AwsError> {
    let queue_name = params.require("QueueName")?;
    Ok(Outcome::QueueUrl(sqs.resolve(&queue_name)?))
}

fn list_queues(sqs: &Sqs, params: &Params) -> Outcome {
    let prefix = params.get("QueueNamePrefix").unwrap_or_default();
    Outcome::QueueUrls(sqs.list(&prefix))
}

fn send_message(sqs: &Sqs, params: &Params) -> Result<Outcome, AwsError> {
    let queue_url = params.require("QueueUrl")?;
    let body = params.require("MessageBody")?;

    let delay_seconds = match params.get("DelaySeconds") {
        Some(raw) => match raw.parse::<u32>() {
            Ok(delay) if delay <= MAX_DELAY_SECONDS => delay,
            _ => {
                return Err(AwsError::new(
                    ErrorCode::InvalidParameterValue,
                    format!("Value {raw} for parameter DelaySeconds is invalid. Reason: must be between 0 and {MAX_DELAY_SECONDS}."),
                ))
            }
        },
        None => 0,
    };

    let input = NewMessage {
        body,
        attributes: params.message_attributes(),
        delay_seconds,
        deduplication_id: params.get("MessageDeduplicationId"),
        group_id: params.get("MessageGroupId").filter(|g| !g.is_empty()),
    };

    Ok(Outcome::Sent(sqs.send_message(&queue_url, input)?))
}

async fn receive_message(sqs: &Sqs, params: &Params) -> Result<Outcome, AwsError> {
    let queue_url = params.require("QueueUrl")?;
    let max_messages = match params.get("MaxNumberOfMessages") {
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            AwsError::new(
                ErrorCode::InvalidParameterValue,
                format!("Value {raw} for parameter MaxNumberOfMessages is invalid."),
            )
        })?,
        None => 1,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_messages = max_messages.clamp(1, MAX_RECEIVE_COUNT as i64) as usize;

    Ok(Outcome::Messages(sqs.receive(&queue_url, max_messages).await?))
}

async fn get_queue_attributes(sqs: &Sqs, params: &Params) -> Result<Outcome, AwsError> {
    let queue_url = params.require("QueueUrl")?;
    let depth = sqs.depth(&queue_url).await?;
    let name = sqstack_core::queue_name_from_url(&queue_url);

    Ok(Outcome::Attributes(vec![
        ("ApproximateNumberOfMessages", depth.to_string()),
        ("ApproximateNumberOfMessagesNotVisible", "0".to_string()),
        ("QueueArn", sqs.scope().queue_arn(name)),
    ]))
}

// === Rendering ===

fn system_attributes(msg: &Message) -> Vec<(&'static str, String)> {
    let mut attributes = vec![("SentTimestamp", msg.sent_timestamp.to_string())];
    if let Some(group_id) = &msg.group_id {
        attributes.push(("MessageGroupId", group_id.clone()));
    }
    if let Some(dedup_id) = &msg.deduplication_id {
        attributes.push(("MessageDeduplicationId", dedup_id.clone()));
    }
    attributes
}

fn sorted_attributes(
    attributes: &HashMap<String, MessageAttribute>,
) -> Vec<(&String, &MessageAttribute)> {
    let mut sorted: Vec<_> = attributes.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
}

fn success_response(
    protocol: Protocol,
    action: &str,
    outcome: Outcome,
    request_id: &RequestId,
) -> Response {
    match protocol {
        Protocol::Query => xml_response(
            StatusCode::OK,
            &render_xml(action, &outcome, request_id),
            request_id,
        ),
        Protocol::Json => json_response(StatusCode::OK, &render_json(&outcome), request_id),
    }
}

fn render_xml(action: &str, outcome: &Outcome, request_id: &RequestId) -> String {
    let mut result = String::new();
    match outcome {
        Outcome::QueueUrl(url) => {
            let _ = write!(result, "<QueueUrl>{}</QueueUrl>", escape_xml(url));
        }
        Outcome::QueueUrls(urls) => {
            for url in urls {
                let _ = write!(result, "<QueueUrl>{}</QueueUrl>", escape_xml(url));
            }
        }
        Outcome::Sent(sent) => {
            let _ = write!(
                result,
                "<MD5OfMessageBody>{}</MD5OfMessageBody>",
                sent.md5_of_body
            );
            if let Some(md5) = &sent.md5_of_attributes {
                let _ = write!(result, "<MD5OfMessageAttributes>{md5}</MD5OfMessageAttributes>");
            }
            let _ = write!(result, "<MessageId>{}</MessageId>", sent.message_id);
        }
        Outcome::Messages(messages) => {
            for msg in messages {
                result.push_str("<Message>");
                let _ = write!(result, "<MessageId>{}</MessageId>", msg.message_id);
                let _ = write!(result, "<ReceiptHandle>{}</ReceiptHandle>", uuid::Uuid::new_v4());
                let _ = write!(result, "<MD5OfBody>{}</MD5OfBody>", msg.md5_of_body);
                let _ = write!(result, "<Body>{}</Body>", escape_xml(&msg.body));
                if let Some(md5) = &msg.md5_of_attributes {
                    let _ = write!(result, "<MD5OfMessageAttributes>{md5}</MD5OfMessageAttributes>");
                }
                for (name, value) in system_attributes(msg) {
                    let _ = write!(
                        result,
                        "<Attribute><Name>{name}</Name><Value>{}</Value></Attribute>",
                        escape_xml(&value)
                    );
                }
                for (name, attribute) in sorted_attributes(&msg.attributes) {
                    let _ = write!(
                        result,
                        "<MessageAttribute><Name>{}</Name><Value><StringValue>{}</StringValue><DataType>{}</DataType></Value></MessageAttribute>",
                        escape_xml(name),
                        escape_xml(&attribute.string_value),
                        escape_xml(&attribute.data_type)
                    );
                }
                result.push_str("</Message>");
            }
        }
        Outcome::Attributes(attributes) => {
            for (name, value) in attributes {
                let _ = write!(
                    result,
                    "<Attribute><Name>{name}</Name><Value>{}</Value></Attribute>",
                    escape_xml(value)
                );
            }
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<{action}Response xmlns="{SQS_XML_NAMESPACE}"><{action}Result>{result}</{action}Result><ResponseMetadata><RequestId>{request_id}</RequestId></ResponseMetadata></{action}Response>"#
    )
}

fn render_json(outcome: &Outcome) -> Value {
    match outcome {
        Outcome::QueueUrl(url) => json!({ "QueueUrl": url }),
        Outcome::QueueUrls(urls) => json!({ "QueueUrls": urls }),
        Outcome::Sent(sent) => {
            let mut rendered = json!({
                "MD5OfMessageBody": sent.md5_of_body,
                "MessageId": sent.message_id,
            });
            if let Some(md5) = &sent.md5_of_attributes {
                rendered["MD5OfMessageAttributes"] = Value::String(md5.clone());
            }
            rendered
        }
        Outcome::Messages(messages) => {
            let messages: Vec<Value> = messages
                .iter()
                .map(|msg| {
                    let attributes: Map<String, Value> = system_attributes(msg)
                        .into_iter()
                        .map(|(name, value)| (name.to_string(), Value::String(value)))
                        .collect();
                    let message_attributes: Map<String, Value> = msg
                        .attributes
                        .iter()
                        .map(|(name, attribute)| {
                            (
                                name.clone(),
                                json!({
                                    "StringValue": attribute.string_value,
                                    "DataType": attribute.data_type,
                                }),
                            )
                        })
                        .collect();
                    let mut rendered = json!({
                        "MessageId": msg.message_id,
                        "ReceiptHandle": uuid::Uuid::new_v4().to_string(),
                        "MD5OfBody": msg.md5_of_body,
                        "Body": msg.body,
                        "Attributes": attributes,
                    });
                    if let Some(md5) = &msg.md5_of_attributes {
                        rendered["MD5OfMessageAttributes"] = Value::String(md5.clone());
                        rendered["MessageAttributes"] = Value::Object(message_attributes);
                    }
                    rendered
                })
                .collect();
            json!({ "Messages": messages })
        }
        Outcome::Attributes(attributes) => {
            let attributes: Map<String, Value> = attributes
                .iter()
                .map(|(name, value)| ((*name).to_string(), Value::String(value.clone())))
                .collect();
            json!({ "Attributes": attributes })
        }
    }
}

// === Response helpers ===

fn with_request_id(mut response: Response, request_id: &RequestId) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert("x-amzn-requestid", value);
    }
    response
}

fn xml_response(status: StatusCode, body: &str, request_id: &RequestId) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/xml"),
    );
    with_request_id(response, request_id)
}

fn json_response(status: StatusCode, body: &Value, request_id: &RequestId) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    with_request_id(response, request_id)
}

fn error_response(protocol: Protocol, error: AwsError, request_id: &RequestId) -> Response {
    let error = error.with_request_id(request_id.as_str());
    let status = StatusCode::from_u16(error.code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let (body, content_type) = match protocol {
        Protocol::Query => (error.to_xml(), "text/xml"),
        Protocol::Json => (error.to_json(), JSON_CONTENT_TYPE),
    };
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if protocol == Protocol::Json {
        if let Ok(value) = HeaderValue::from_str(&error.query_error_header()) {
            response.headers_mut().insert("x-amzn-query-error", value);
        }
    }
    with_request_id(response, request_id)
}
