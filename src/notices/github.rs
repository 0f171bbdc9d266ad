use std::fmt::Write;

use regex::Regex;
use tracing::{debug, info, trace};

use crate::{
    notices::{notice_builder::NoticeBuilder, AuthorizedRepos, DispatchError, Response},
    webhooks::github::{
        GitHubEvent, IssueCommentEvent, IssuesEvent, PullRequestEvent, PushEvent, ReleaseEvent,
        Repository, WatchEvent,
    },
};

const PULL_REQUEST_ACTIONS: &[&str] = &["opened", "closed", "reopened"];
const ISSUES_ACTIONS: &[&str] = &["opened", "created", "closed", "reopened"];
const ISSUE_COMMENT_ACTIONS: &[&str] = &["created"];

pub(crate) fn handle_github_event(
    event: GitHubEvent,
    merge_pattern: &Regex,
    authorized_repos: Option<&AuthorizedRepos>,
) -> Result<Option<Response>, DispatchError> {
    let authorize = |repository: &Repository| match authorized_repos {
        Some(authorized_repos) => authorized_repos.check(repository),
        None => Ok(()),
    };

    let response = match event {
        GitHubEvent::Ping(ping) => {
            info!(
                "got ping from GitHub (hook {:?}, repository {:?}): {}",
                ping.hook_id,
                ping.repository.as_ref().map(|repo| &repo.full_name),
                ping.zen
            );
            return Ok(None);
        }
        GitHubEvent::IssueComment(event) => {
            authorize(&event.repository)?;
            handle_issue_comment(event)
        }
        GitHubEvent::Issues(event) => {
            authorize(&event.repository)?;
            handle_issues(event)
        }
        GitHubEvent::PullRequest(event) => {
            authorize(&event.repository)?;
            handle_pull_request(event)
        }
        GitHubEvent::Push(event) => {
            authorize(&event.repository)?;
            handle_push(event, merge_pattern)
        }
        GitHubEvent::Release(event) => {
            authorize(&event.repository)?;
            handle_release(event)
        }
        GitHubEvent::Watch(event) => {
            authorize(&event.repository)?;
            handle_watch(event)
        }
    };

    Ok(Some(response))
}

fn is_allowed(allowed: &[&str], action: &str) -> bool {
    let allowed = allowed.contains(&action);
    if !allowed {
        trace!("action `{}` isn't announced", action);
    }
    allowed
}

/// Nothing to announce for this repository
fn filtered_out(repository: Repository) -> Response {
    Response {
        repo: repository.full_name,
        notices: Vec::new(),
    }
}

fn handle_push(event: PushEvent, merge_pattern: &Regex) -> Response {
    debug!(
        "push to {} with {} commit(s) (forced: {})",
        event.r#ref,
        event.commits.len(),
        event.forced
    );

    let notices = event
        .commits
        .iter()
        .filter(|commit| {
            let is_merge = merge_pattern.is_match(&commit.message);
            if is_merge {
                trace!("skipping merge commit {}", commit.id);
            }
            !is_merge
        })
        .map(|commit| {
            let mut notice = NoticeBuilder::new();
            notice.repo_link(&event.repository, "commit", commit.short_id());
            notice.separator();
            write!(notice, "{}", commit.title()).unwrap();
            notice.separator();
            write!(notice, "{}", commit.author.name).unwrap();
            notice.build()
        })
        .collect();

    Response {
        repo: event.repository.full_name,
        notices,
    }
}

fn handle_pull_request(event: PullRequestEvent) -> Response {
    if !is_allowed(PULL_REQUEST_ACTIONS, &event.action) {
        return filtered_out(event.repository);
    }

    titled_notice(
        event.repository,
        "pull",
        event.number,
        &format!("pull request {} by @{}", event.action, event.sender.login),
        &event.pull_request.title,
    )
}

fn handle_issues(event: IssuesEvent) -> Response {
    if !is_allowed(ISSUES_ACTIONS, &event.action) {
        return filtered_out(event.repository);
    }

    titled_notice(
        event.repository,
        "issues",
        event.issue.number,
        &format!("Issue {} by @{}", event.action, event.sender.login),
        &event.issue.title,
    )
}

fn handle_issue_comment(event: IssueCommentEvent) -> Response {
    if !is_allowed(ISSUE_COMMENT_ACTIONS, &event.action) {
        return filtered_out(event.repository);
    }

    titled_notice(
        event.repository,
        "issues",
        event.issue.number,
        &format!("Comment on issue by @{}", event.sender.login),
        &event.issue.title,
    )
}

/// `<link> — <what happened> — <title>`, shared by pull requests, issues and comments
fn titled_notice(
    repository: Repository,
    kind: &str,
    number: u64,
    summary: &str,
    title: &str,
) -> Response {
    let mut notice = NoticeBuilder::new();
    notice.repo_link(&repository, kind, number);
    notice.separator();
    write!(notice, "{}", summary).unwrap();
    notice.separator();
    write!(notice, "{}", title).unwrap();

    Response {
        repo: repository.full_name,
        notices: vec![notice.build()],
    }
}

fn handle_watch(event: WatchEvent) -> Response {
    let mut notice = NoticeBuilder::new();
    write!(notice, r"Starred by @{}! \o/", event.sender.login).unwrap();

    Response {
        repo: event.repository.full_name,
        notices: vec![notice.build()],
    }
}

fn handle_release(event: ReleaseEvent) -> Response {
    let mut notice = NoticeBuilder::new();
    write!(
        notice,
        "{} released {} - {}",
        event.sender.login, event.release.tag_name, event.release.html_url
    )
    .unwrap();

    Response {
        repo: event.repository.full_name,
        notices: vec![notice.build()],
    }
}
