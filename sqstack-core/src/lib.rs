//! Core types for sqstack
//!
//! This crate provides the AWS-flavoured types shared by the queue engine,
//! its protocol handlers and the server binary.

pub mod account;
pub mod error;
pub mod request_id;

pub use account::{queue_name_from_url, AccountRegion, DEFAULT_ACCOUNT_ID, DEFAULT_REGION};
pub use error::{escape_xml, AwsError, ErrorCode, SQS_XML_NAMESPACE};
pub use request_id::RequestId;
