use std::{future::Future, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{config::FeedTarget, notices::NoticeBatch};

/// Receives finished notices and takes care of getting them to people.
#[rocket::async_trait]
pub trait NoticeForwarder: Send + Sync {
    async fn forward(&self, batch: NoticeBatch) -> anyhow::Result<()>;
}

/// Queues batches for [`deliver_batches`], running in its own task.
pub struct ChannelForwarder(pub UnboundedSender<NoticeBatch>);

#[rocket::async_trait]
impl NoticeForwarder for ChannelForwarder {
    async fn forward(&self, batch: NoticeBatch) -> anyhow::Result<()> {
        self.0
            .send(batch)
            .map_err(|_| anyhow!("feed channel was closed / dropped"))
    }
}

/// Delivers queued batches until every sender is gone. A target that takes longer than
/// `delivery_timeout` is given up on so the next ones still get their notices.
pub async fn deliver_batches(
    mut batches: UnboundedReceiver<NoticeBatch>,
    delivery_timeout: Duration,
) {
    loop {
        let batch = match batches.recv().await {
            Some(batch) => batch,
            None => {
                info!("all channel senders were dropped, exiting delivery loop");
                break;
            }
        };
        debug!(
            "delivering {} notice(s) for {}",
            batch.notices.len(),
            batch.repo
        );

        for target in &batch.targets {
            let delivery = deliver(target, &batch);
            if let Err(e) = deliver_within(delivery_timeout, target, delivery).await {
                warn!("encountered error while delivering to {:?}: {:#}", target, e);
            }
        }
    }
}

async fn deliver_within(
    delivery_timeout: Duration,
    target: &FeedTarget,
    delivery: impl Future<Output = anyhow::Result<()>>,
) -> anyhow::Result<()> {
    timeout(delivery_timeout, delivery)
        .await
        .with_context(|| format!("gave up on {:?} after {:?}", target, delivery_timeout))?
}

async fn deliver(target: &FeedTarget, batch: &NoticeBatch) -> anyhow::Result<()> {
    match target {
        FeedTarget::Log { name } => {
            for notice in &batch.notices {
                info!(feed = %name, repo = %batch.repo, "{}", notice);
            }
            Ok(())
        }
        FeedTarget::File { path } => append_to_file(path, &batch.notices).await,
    }
}

async fn append_to_file(path: &Path, notices: &[String]) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("couldn't open {}", path.display()))?;

    let mut lines = String::new();
    for notice in notices {
        lines.push_str(notice);
        lines.push('\n');
    }

    file.write_all(lines.as_bytes())
        .await
        .with_context(|| format!("couldn't write to {}", path.display()))?;
    file.flush().await?;

    Ok(())
}
