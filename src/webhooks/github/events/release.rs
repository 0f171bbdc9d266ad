use serde::Deserialize;
use url::Url;

use crate::webhooks::github::events::{GitHubUser, Repository};

#[derive(Debug, Deserialize)]
pub struct ReleaseEvent {
    pub repository: Repository,
    pub sender: GitHubUser,
    pub release: Release,
}

#[derive(Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub html_url: Url,
}
