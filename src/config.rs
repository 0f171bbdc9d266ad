use std::{collections::HashMap, path::PathBuf, time::Duration};

use regex::Regex;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct GhNotifyConfig {
    /// Secret shared with GitHub, used to check the `X-Hub-Signature-256` header of deliveries
    pub github_secret: String,
    /// Commits whose message matches this pattern are left out of push notices
    #[serde(with = "serde_regex", default = "default_merge_pattern")]
    pub merge_pattern: Regex,
    /// Deadline in seconds for handing a batch of notices to the forwarder
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout: u64,
    /// Deadline in seconds for writing a batch to one feed target
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout: u64,
    /// If set, events for repositories whose `html_url` isn't listed here are rejected
    #[serde(default)]
    pub authorized_repos: Option<Vec<Url>>,
    #[serde(default)]
    pub feeds: FeedsConfig,
}

impl GhNotifyConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout)
    }
}

fn default_merge_pattern() -> Regex {
    Regex::new(r"^Merge (branch|pull request|remote-tracking branch) ")
        .expect("default merge pattern is valid")
}

fn default_forward_timeout() -> u64 {
    5
}

fn default_delivery_timeout() -> u64 {
    10
}

/// Where notices end up, keyed by repository full name (`owner/repo`).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub default: Vec<FeedTarget>,
    #[serde(default)]
    pub repos: HashMap<String, Vec<FeedTarget>>,
}

impl FeedsConfig {
    /// Targets for `repo`, falling back to the default feeds when the repo has no entry.
    pub fn targets_for(&self, repo: &str) -> &[FeedTarget] {
        self.repos
            .get(repo)
            .map_or(self.default.as_slice(), Vec::as_slice)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedTarget {
    /// Emit notices as log events tagged with the feed name
    Log { name: String },
    /// Append notices to a file, one per line
    File { path: PathBuf },
}
