use std::fmt::{self, Display};
use std::str::FromStr;

use serde::Deserialize;
use url::Url;

mod issue_comment;
mod issues;
mod ping;
mod pull_request;
mod push;
mod release;
mod watch;

pub use issue_comment::*;
pub use issues::*;
pub use ping::*;
pub use pull_request::*;
pub use push::*;
pub use release::*;
pub use watch::*;

/// Event kinds we know how to handle, as named in the `X-GitHub-Event` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    IssueComment,
    Issues,
    Ping,
    PullRequest,
    Push,
    Release,
    Watch,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IssueComment => "issue_comment",
            Self::Issues => "issues",
            Self::Ping => "ping",
            Self::PullRequest => "pull_request",
            Self::Push => "push",
            Self::Release => "release",
            Self::Watch => "watch",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnsupportedKind(pub String);

impl FromStr for EventKind {
    type Err = UnsupportedKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "issue_comment" => Self::IssueComment,
            "issues" => Self::Issues,
            "ping" => Self::Ping,
            "pull_request" => Self::PullRequest,
            "push" => Self::Push,
            "release" => Self::Release,
            "watch" => Self::Watch,
            other => return Err(UnsupportedKind(other.to_string())),
        };

        Ok(kind)
    }
}

#[derive(Debug)]
pub enum GitHubEvent {
    IssueComment(IssueCommentEvent),
    Issues(IssuesEvent),
    Ping(PingEvent),
    PullRequest(PullRequestEvent),
    Push(PushEvent),
    Release(ReleaseEvent),
    Watch(WatchEvent),
}

impl GitHubEvent {
    /// Decodes a (signature-checked) payload according to its declared kind.
    pub fn decode(kind: EventKind, payload: &[u8]) -> serde_json::Result<Self> {
        let event = match kind {
            EventKind::IssueComment => Self::IssueComment(serde_json::from_slice(payload)?),
            EventKind::Issues => Self::Issues(serde_json::from_slice(payload)?),
            EventKind::Ping => Self::Ping(serde_json::from_slice(payload)?),
            EventKind::PullRequest => Self::PullRequest(serde_json::from_slice(payload)?),
            EventKind::Push => Self::Push(serde_json::from_slice(payload)?),
            EventKind::Release => Self::Release(serde_json::from_slice(payload)?),
            EventKind::Watch => Self::Watch(serde_json::from_slice(payload)?),
        };

        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::IssueComment(_) => EventKind::IssueComment,
            Self::Issues(_) => EventKind::Issues,
            Self::Ping(_) => EventKind::Ping,
            Self::PullRequest(_) => EventKind::PullRequest,
            Self::Push(_) => EventKind::Push,
            Self::Release(_) => EventKind::Release,
            Self::Watch(_) => EventKind::Watch,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub html_url: Url,
}

impl Repository {
    /// Browsable URL of the repository, used as the prefix of every link we build.
    pub fn link_prefix(&self) -> &str {
        self.html_url.as_str().trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub title: String,
}
