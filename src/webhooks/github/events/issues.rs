use serde::Deserialize;

use crate::webhooks::github::events::{GitHubUser, Issue, Repository};

#[derive(Debug, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub repository: Repository,
    pub sender: GitHubUser,
    pub issue: Issue,
}
