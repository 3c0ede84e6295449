//! Account and region scoping for queue URLs and ARNs

/// Region reported in every URL and ARN unless configured otherwise
pub const DEFAULT_REGION: &str = "us-west-2";

/// Account id reported in every URL and ARN unless configured otherwise
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";

const QUEUE_DOMAIN: &str = "amazonaws.com";

/// The account and region a set of queues lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountRegion {
    pub account_id: String,
    pub region: String,
}

impl AccountRegion {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
        }
    }

    /// `https://{region}.queue.amazonaws.com/{account}/{name}`
    pub fn queue_url(&self, queue_name: &str) -> String {
        format!(
            "https://{}.queue.{}/{}/{}",
            self.region, QUEUE_DOMAIN, self.account_id, queue_name
        )
    }

    pub fn queue_arn(&self, queue_name: &str) -> String {
        format!("arn:aws:sqs:{}:{}:{}", self.region, self.account_id, queue_name)
    }
}

impl Default for AccountRegion {
    fn default() -> Self {
        Self::new(DEFAULT_ACCOUNT_ID, DEFAULT_REGION)
    }
}

/// Extract the queue name from a queue URL (its last path segment)
pub fn queue_name_from_url(queue_url: &str) -> &str {
    queue_url.rsplit('/').next().unwrap_or(queue_url)
}
