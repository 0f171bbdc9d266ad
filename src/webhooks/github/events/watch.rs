use serde::Deserialize;

use crate::webhooks::github::events::{GitHubUser, Repository};

/// Despite the name, GitHub sends this one when someone stars a repository.
#[derive(Debug, Deserialize)]
pub struct WatchEvent {
    pub repository: Repository,
    pub sender: GitHubUser,
}
