use std::collections::HashSet;

use tracing::warn;
use url::Url;

use crate::{notices::DispatchError, webhooks::github::Repository};

/// Repositories we accept events for, identified by their `html_url`. Built once from the
/// configuration and never touched again.
#[derive(Clone, Debug)]
pub struct AuthorizedRepos(HashSet<Url>);

impl AuthorizedRepos {
    pub fn new(urls: impl IntoIterator<Item = Url>) -> Self {
        Self(urls.into_iter().collect())
    }

    pub fn check(&self, repository: &Repository) -> Result<(), DispatchError> {
        if self.0.contains(&repository.html_url) {
            Ok(())
        } else {
            warn!(
                "rejecting event for unknown repository {} ({})",
                repository.full_name, repository.html_url
            );
            Err(DispatchError::UnknownRepository(
                repository.html_url.clone(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository(url: &str) -> Repository {
        Repository {
            full_name: "org/repo".to_string(),
            html_url: Url::parse(url).unwrap(),
        }
    }

    #[test]
    fn known_repository_is_allowed() {
        let repos = AuthorizedRepos::new([Url::parse("https://github.com/org/repo").unwrap()]);

        assert!(repos.check(&repository("https://github.com/org/repo")).is_ok());
        assert!(matches!(
            repos.check(&repository("https://github.com/org/other")),
            Err(DispatchError::UnknownRepository(_))
        ));
    }

    #[test]
    fn empty_set_rejects_everything() {
        let repos = AuthorizedRepos::new(Vec::new());
        assert!(repos.check(&repository("https://github.com/org/repo")).is_err());
    }
}
