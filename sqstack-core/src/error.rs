//! AWS error types and formatting

use serde::Serialize;
use thiserror::Error;

/// Namespace of every SQS query-protocol document
pub const SQS_XML_NAMESPACE: &str = "http://queue.amazonaws.com/doc/2012-11-05/";

/// SQS error codes reported by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Sender faults
    NonExistentQueue,
    MissingParameter,
    InvalidParameterValue,
    InvalidAction,

    // Receiver faults
    NotImplemented,
    ServiceUnavailable,
    InternalError,
}

impl ErrorCode {
    /// Code as reported by the query (XML) protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonExistentQueue => "AWS.SimpleQueueService.NonExistentQueue",
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::InvalidAction => "InvalidAction",
            Self::NotImplemented => "NotImplemented",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::InternalError => "InternalError",
        }
    }

    /// Shape name as reported by the JSON protocol
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::NonExistentQueue => "QueueDoesNotExist",
            other => other.as_str(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NonExistentQueue
            | Self::MissingParameter
            | Self::InvalidParameterValue
            | Self::InvalidAction => 400,
            Self::NotImplemented => 501,
            Self::ServiceUnavailable => 503,
            Self::InternalError => 500,
        }
    }

    /// `Sender` for client mistakes, `Receiver` for server-side conditions
    pub fn fault(&self) -> &'static str {
        if self.http_status() < 500 {
            "Sender"
        } else {
            "Receiver"
        }
    }
}

/// AWS-style error
#[derive(Debug, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct AwsError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

impl AwsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Format as an SQS query-protocol XML error
    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ErrorResponse xmlns="{}">
    <Error>
        <Type>{}</Type>
        <Code>{}</Code>
        <Message>{}</Message>
        <Detail/>
    </Error>
    <RequestId>{}</RequestId>
</ErrorResponse>"#,
            SQS_XML_NAMESPACE,
            self.code.fault(),
            self.code.as_str(),
            escape_xml(&self.message),
            self.request_id
        )
    }

    /// Format as an SQS JSON-protocol error
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct JsonError<'a> {
            #[serde(rename = "__type")]
            error_type: String,
            message: &'a str,
        }

        let error = JsonError {
            error_type: format!("com.amazonaws.sqs#{}", self.code.json_type()),
            message: &self.message,
        };

        serde_json::to_string(&error).unwrap_or_else(|_| {
            format!(r#"{{"__type":"{}","message":"{}"}}"#, self.code.json_type(), self.message)
        })
    }

    /// Value of the `x-amzn-query-error` header that lets JSON clients map
    /// the error back to its query-protocol code
    pub fn query_error_header(&self) -> String {
        format!("{};{}", self.code.as_str(), self.code.fault())
    }
}

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
