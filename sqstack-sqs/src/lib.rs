//! In-memory SQS emulation for sqstack
//!
//! Queues are fixed at startup. Each one is a growable ring buffer owned by a
//! single actor task, so concurrent senders and receivers never share the
//! buffer. Provides:
//! - GetQueueUrl, ListQueues
//! - SendMessage, ReceiveMessage (receive removes the message)
//! - GetQueueAttributes (approximate depth, ARN)

pub mod actor;
pub mod handlers;
pub mod message;
pub mod registry;
pub mod ring_buffer;

pub use handlers::handle_request;
pub use message::{Message, MessageAttribute, NewMessage, SentMessage};
pub use registry::{QueueConfig, Sqs, SqsConfig, SqsError};
pub use ring_buffer::RingBuffer;
