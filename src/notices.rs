use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    config::{FeedTarget, FeedsConfig},
    feeds::NoticeForwarder,
    webhooks::GitHubEvent,
};

mod authorization;
pub use authorization::AuthorizedRepos;

mod github;
use github::handle_github_event;

mod notice_builder;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown repository: {0}")]
    UnknownRepository(Url),
}

/// Notices produced by a single delivery, for a single repository.
pub struct Response {
    pub repo: String,
    pub notices: Vec<String>,
}

/// What gets handed to the [`NoticeForwarder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoticeBatch {
    pub targets: Vec<FeedTarget>,
    /// Full name (`owner/repo`) of the repository the notices are about
    pub repo: String,
    pub notices: Vec<String>,
}

/// Turns decoded events into notices and hands them to the forwarder.
///
/// Everything in here is read-only once built, so a single instance is shared by every request.
pub struct Dispatcher {
    forwarder: Box<dyn NoticeForwarder>,
    feeds: FeedsConfig,
    merge_pattern: Regex,
    authorized_repos: Option<AuthorizedRepos>,
    forward_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        forwarder: Box<dyn NoticeForwarder>,
        feeds: FeedsConfig,
        merge_pattern: Regex,
        authorized_repos: Option<AuthorizedRepos>,
        forward_timeout: Duration,
    ) -> Self {
        Self {
            forwarder,
            feeds,
            merge_pattern,
            authorized_repos,
            forward_timeout,
        }
    }

    /// Handles an event end to end. Only a rejected repository is an error: failing to forward
    /// notices is logged, and doesn't concern whoever sent us the event.
    pub async fn dispatch(&self, event: GitHubEvent) -> Result<(), DispatchError> {
        let kind = event.kind();
        let response = handle_github_event(
            event,
            &self.merge_pattern,
            self.authorized_repos.as_ref(),
        )?;

        let Response { repo, notices } = match response {
            Some(response) if !response.notices.is_empty() => response,
            // event doesn't need a notice
            _ => {
                trace!("{} event didn't need to be announced", kind);
                return Ok(());
            }
        };

        let targets = self.feeds.targets_for(&repo);
        if targets.is_empty() {
            debug!(
                "no feed configured for {}, dropping {} notice(s)",
                repo,
                notices.len()
            );
            return Ok(());
        }

        let batch = NoticeBatch {
            targets: targets.to_vec(),
            repo,
            notices,
        };
        debug!(
            "forwarding {} notice(s) for {}",
            batch.notices.len(),
            batch.repo
        );

        match timeout(self.forward_timeout, self.forwarder.forward(batch)).await {
            Ok(Ok(())) => trace!("notices forwarded"),
            Ok(Err(e)) => warn!("couldn't forward notices: {:#}", e),
            Err(_) => warn!(
                "forwarding notices took more than {:?}, giving up",
                self.forward_timeout
            ),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use tokio::sync::mpsc::unbounded_channel;

    use crate::{
        feeds::ChannelForwarder,
        webhooks::github::{EventKind, GitHubEvent},
    };

    use super::*;

    const WATCH: &[u8] = br#"{
        "action": "started",
        "repository": { "full_name": "org/repo", "html_url": "https://example.com/org/repo" },
        "sender": { "login": "carol" }
    }"#;

    fn watch_event() -> GitHubEvent {
        GitHubEvent::decode(EventKind::Watch, WATCH).unwrap()
    }

    fn feeds() -> FeedsConfig {
        FeedsConfig {
            default: vec![FeedTarget::Log {
                name: "activity".to_string(),
            }],
            ..Default::default()
        }
    }

    fn dispatcher(forwarder: Box<dyn NoticeForwarder>, feeds: FeedsConfig) -> Dispatcher {
        Dispatcher::new(
            forwarder,
            feeds,
            Regex::new("^Merge ").unwrap(),
            None,
            Duration::from_millis(50),
        )
    }

    /// Never completes, like a feed stuck on a dead connection.
    struct StuckForwarder(Arc<AtomicUsize>);

    #[rocket::async_trait]
    impl NoticeForwarder for StuckForwarder {
        async fn forward(&self, _batch: NoticeBatch) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    struct FailingForwarder;

    #[rocket::async_trait]
    impl NoticeForwarder for FailingForwarder {
        async fn forward(&self, _batch: NoticeBatch) -> anyhow::Result<()> {
            anyhow::bail!("feed is down")
        }
    }

    #[tokio::test]
    async fn forwards_batch_to_targets() {
        let (sender, mut receiver) = unbounded_channel();
        let dispatcher = dispatcher(Box::new(ChannelForwarder(sender)), feeds());

        dispatcher.dispatch(watch_event()).await.unwrap();

        let batch = receiver.try_recv().unwrap();
        assert_eq!(
            batch,
            NoticeBatch {
                targets: feeds().default,
                repo: "org/repo".to_string(),
                notices: vec![r"Starred by @carol! \o/".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn nothing_forwarded_without_targets() {
        let (sender, mut receiver) = unbounded_channel();
        let dispatcher = dispatcher(Box::new(ChannelForwarder(sender)), FeedsConfig::default());

        dispatcher.dispatch(watch_event()).await.unwrap();
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn stuck_forwarder_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(Box::new(StuckForwarder(calls.clone())), feeds());

        dispatcher.dispatch(watch_event()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forwarder_failure_is_not_an_error() {
        let dispatcher = dispatcher(Box::new(FailingForwarder), feeds());
        assert!(dispatcher.dispatch(watch_event()).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_repository_is_an_error() {
        let (sender, mut receiver) = unbounded_channel();
        let dispatcher = Dispatcher::new(
            Box::new(ChannelForwarder(sender)),
            feeds(),
            Regex::new("^Merge ").unwrap(),
            Some(AuthorizedRepos::new([
                Url::parse("https://example.com/org/other").unwrap()
            ])),
            Duration::from_secs(1),
        );

        match dispatcher.dispatch(watch_event()).await {
            Err(DispatchError::UnknownRepository(url)) => {
                assert_eq!(url.as_str(), "https://example.com/org/repo")
            }
            other => panic!("expected unknown repository, got {:?}", other),
        }
        assert!(receiver.try_recv().is_err());
    }
}
