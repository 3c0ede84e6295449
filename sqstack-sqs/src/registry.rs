//! Queue registry and the public queue operations
//!
//! The set of queues is fixed when [`Sqs::bootstrap`] runs: one actor per
//! configured name, looked up by name for the rest of the process lifetime.
//! After bootstrap the map is only read, so it is shared without locking.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sqstack_core::{queue_name_from_url, AccountRegion, DEFAULT_ACCOUNT_ID, DEFAULT_REGION};

use crate::actor::{spawn_queue_actor, QueueHandle};
use crate::message::{Message, NewMessage, SentMessage};

const MAX_QUEUE_NAME_LEN: usize = 80;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqsError {
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),
    #[error("Queue is shutting down: {0}")]
    QueueUnavailable(String),
    #[error("Invalid queue configuration: {0}")]
    ConfigLoadFailure(String),
}

/// One configured queue
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    pub name: String,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Everything needed to build the registry
#[derive(Debug, Clone, Deserialize)]
pub struct SqsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_account_id")]
    pub account_id: String,
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            account_id: default_account_id(),
            queues: Vec::new(),
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_account_id() -> String {
    DEFAULT_ACCOUNT_ID.to_string()
}

impl SqsConfig {
    pub fn with_queues<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queues: names.into_iter().map(QueueConfig::new).collect(),
            ..Self::default()
        }
    }

    pub fn scope(&self) -> AccountRegion {
        AccountRegion::new(&self.account_id, &self.region)
    }

    fn validate(&self) -> Result<(), SqsError> {
        let mut seen = HashSet::new();
        for queue in &self.queues {
            validate_queue_name(&queue.name)?;
            if !seen.insert(queue.name.as_str()) {
                return Err(SqsError::ConfigLoadFailure(format!(
                    "queue '{}' is configured more than once",
                    queue.name
                )));
            }
        }
        Ok(())
    }
}

fn validate_queue_name(name: &str) -> Result<(), SqsError> {
    let stem = name.strip_suffix(".fifo").unwrap_or(name);
    if stem.is_empty() {
        return Err(SqsError::ConfigLoadFailure(
            "queue name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(SqsError::ConfigLoadFailure(format!(
            "queue name '{name}' is longer than {MAX_QUEUE_NAME_LEN} characters"
        )));
    }
    if !stem
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(SqsError::ConfigLoadFailure(format!(
            "queue name '{name}' may only contain alphanumerics, hyphens and underscores"
        )));
    }
    Ok(())
}

#[derive(Debug)]
struct QueueEntry {
    url: String,
    handle: QueueHandle,
}

/// The queue service: registry of queue actors plus the operations the
/// protocol layer calls
#[derive(Debug)]
pub struct Sqs {
    scope: AccountRegion,
    queues: HashMap<String, QueueEntry>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Sqs {
    /// Create every configured queue and start its actor. Must run inside a
    /// tokio runtime. Nothing is started if the configuration is invalid.
    pub fn bootstrap(config: &SqsConfig) -> Result<Self, SqsError> {
        config.validate()?;

        let scope = config.scope();
        let mut queues = HashMap::with_capacity(config.queues.len());
        let mut tasks = Vec::with_capacity(config.queues.len());
        for queue in &config.queues {
            let url = scope.queue_url(&queue.name);
            let (handle, task) = spawn_queue_actor(queue.name.clone());
            info!(name = %queue.name, url = %url, "Creating queue");
            queues.insert(queue.name.clone(), QueueEntry { url, handle });
            tasks.push(task);
        }

        Ok(Self {
            scope,
            queues,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn scope(&self) -> &AccountRegion {
        &self.scope
    }

    /// URL of the queue called `name`
    pub fn resolve(&self, name: &str) -> Result<String, SqsError> {
        self.queues
            .get(name)
            .map(|entry| entry.url.clone())
            .ok_or_else(|| SqsError::QueueNotFound(name.to_string()))
    }

    /// URLs of every queue whose name starts with `prefix`, sorted by name
    pub fn list(&self, prefix: &str) -> Vec<String> {
        let mut matches: Vec<(&String, &QueueEntry)> = self
            .queues
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(b.0));
        matches.into_iter().map(|(_, entry)| entry.url.clone()).collect()
    }

    /// Send `body` to the queue at `queue_url` and return the new message id.
    /// An empty `group_id` means no group.
    pub fn send(&self, queue_url: &str, body: &str, group_id: &str) -> Result<String, SqsError> {
        let input = NewMessage::new(body).with_group_id(group_id);
        self.send_message(queue_url, input).map(|sent| sent.message_id)
    }

    /// Send a fully specified message. Returns as soon as the message is
    /// handed to the queue's actor.
    pub fn send_message(&self, queue_url: &str, input: NewMessage) -> Result<SentMessage, SqsError> {
        let (name, entry) = self.entry_for_url(queue_url)?;

        let message = Message::new(input);
        let sent = SentMessage::from(&message);
        entry
            .handle
            .ingest(vec![message])
            .map_err(|_| SqsError::QueueUnavailable(name.to_string()))?;

        debug!(queue = %name, message_id = %sent.message_id, "Sent message");
        Ok(sent)
    }

    /// Take up to `max_count` messages from the queue at `queue_url`. Received
    /// messages are gone from the queue.
    pub async fn receive(&self, queue_url: &str, max_count: usize) -> Result<Vec<Message>, SqsError> {
        let (name, entry) = self.entry_for_url(queue_url)?;

        let messages = entry
            .handle
            .receive(max_count)
            .await
            .map_err(|_| SqsError::QueueUnavailable(name.to_string()))?;

        debug!(queue = %name, count = messages.len(), "Received messages");
        Ok(messages)
    }

    /// Number of messages currently in the queue at `queue_url`
    pub async fn depth(&self, queue_url: &str) -> Result<usize, SqsError> {
        let (name, entry) = self.entry_for_url(queue_url)?;
        entry
            .handle
            .depth()
            .await
            .map_err(|_| SqsError::QueueUnavailable(name.to_string()))
    }

    /// Stop every queue actor and wait for them to finish. Requests already
    /// sent are served first; later ones fail with `QueueUnavailable`.
    pub async fn shutdown(&self) {
        for entry in self.queues.values() {
            entry.handle.stop();
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Queue actor ended abnormally");
            }
        }
        info!(queues = self.queues.len(), "Queue actors stopped");
    }

    fn entry_for_url<'a>(&'a self, queue_url: &'a str) -> Result<(&'a str, &'a QueueEntry), SqsError> {
        let name = queue_name_from_url(queue_url);
        self.queues
            .get(name)
            .map(|entry| (name, entry))
            .ok_or_else(|| SqsError::QueueNotFound(name.to_string()))
    }
}
