use serde::Deserialize;

use crate::webhooks::github::events::Repository;

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub r#ref: String,
    pub repository: Repository,
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub forced: bool,
}

#[derive(Debug, Deserialize)]
pub struct Commit {
    pub id: String,
    pub message: String,
    pub author: CommitAuthor,
}

impl Commit {
    /// Everything before the first line break of the commit message.
    pub fn title(&self) -> &str {
        let line = match self.message.split_once('\n') {
            Some((first, _)) => first,
            None => &self.message,
        };
        line.strip_suffix('\r').unwrap_or(line)
    }

    /// The commit hash, cut down to at most 6 characters.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(6) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
}
