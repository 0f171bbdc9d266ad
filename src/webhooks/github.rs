use std::{convert::Infallible, io};

use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    response::{self, Responder},
    Request, State,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod events;
pub use events::*;

mod signing;
use signing::SignedGitHubPayload;

use crate::notices::{DispatchError, Dispatcher};

const X_GITHUB_EVENT: &str = "X-GitHub-Event";
const X_GITHUB_DELIVERY: &str = "X-GitHub-Delivery";

pub struct GitHubSecret(pub String);

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("couldn't read payload: {0}")]
    Io(#[from] io::Error),
    #[error("couldn't decode payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("event type {0} not implemented")]
    Unsupported(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("server state {0} isn't managed")]
    MissingState(&'static str),
}

impl WebhookError {
    pub fn status(&self) -> Status {
        match self {
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::PayloadTooLarge => Status::PayloadTooLarge,
            Self::Io(_) => Status::BadRequest,
            Self::Unsupported(_) => Status::NotFound,
            Self::Decode(_) | Self::Dispatch(_) | Self::MissingState(_) => {
                Status::InternalServerError
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for WebhookError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        (self.status(), self.to_string()).respond_to(request)
    }
}

/// GitHub headers describing a delivery. Extracting them never fails: an absent or unknown
/// event type is reported only once the signature has been checked.
#[derive(Debug)]
pub struct DeliveryHeaders {
    pub event_type: Option<String>,
    pub delivery_id: Option<String>,
}

impl DeliveryHeaders {
    pub fn event_kind(&self) -> Result<EventKind, WebhookError> {
        let event_type = self.event_type.as_deref().unwrap_or_default();
        event_type
            .parse()
            .map_err(|UnsupportedKind(kind)| WebhookError::Unsupported(kind))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for DeliveryHeaders {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();

        // several event types make no sense, treat it like a missing one
        let event_types = headers.get(X_GITHUB_EVENT).collect::<Vec<_>>();
        let event_type = match event_types.as_slice() {
            [event_type] => Some(event_type.to_string()),
            _ => None,
        };

        Outcome::Success(DeliveryHeaders {
            event_type,
            delivery_id: headers.get_one(X_GITHUB_DELIVERY).map(str::to_string),
        })
    }
}

#[rocket::post("/api/webhooks/github", data = "<payload>")]
pub async fn github_webhook(
    headers: DeliveryHeaders,
    payload: Result<SignedGitHubPayload, WebhookError>,
    dispatcher: &State<Dispatcher>,
) -> Result<&'static str, WebhookError> {
    let delivery = headers.delivery_id.as_deref().unwrap_or("-");

    let payload = payload.map_err(|e| {
        warn!("rejected delivery {}: {}", delivery, e);
        e
    })?;

    let kind = headers.event_kind().map_err(|e| {
        info!("delivery {}: {}", delivery, e);
        e
    })?;
    debug!("received {} event (delivery {})", kind, delivery);

    let event = GitHubEvent::decode(kind, &payload.0).map_err(|e| {
        warn!("couldn't decode {} event (delivery {}): {}", kind, delivery, e);
        e
    })?;

    dispatcher.dispatch(event).await?;

    Ok("OK")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use regex::Regex;
    use rocket::{
        http::{Header, Status},
        local::blocking::Client,
    };
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use url::Url;

    use super::signing::tests::{sign, sign_sha1};
    use crate::{
        config::{FeedTarget, FeedsConfig},
        feeds::ChannelForwarder,
        notices::{AuthorizedRepos, NoticeBatch},
        webhooks::build_rocket,
    };

    use super::*;

    const SECRET: &str = "s3cret";

    const PUSH: &str = r#"{
        "ref": "refs/heads/master",
        "repository": {
            "full_name": "org/repo",
            "html_url": "https://example.com/org/repo"
        },
        "sender": { "login": "alice" },
        "commits": [
            {
                "id": "0123456789",
                "message": "Merge branch 'x'",
                "author": { "name": "alice" }
            },
            {
                "id": "abcdef1234",
                "message": "Fix crash\n\ndetails",
                "author": { "name": "alice" }
            }
        ]
    }"#;

    fn client(authorized: Option<AuthorizedRepos>) -> (Client, UnboundedReceiver<NoticeBatch>) {
        let (sender, receiver) = unbounded_channel();
        let feeds = FeedsConfig {
            default: vec![FeedTarget::Log {
                name: "test".to_string(),
            }],
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(
            Box::new(ChannelForwarder(sender)),
            feeds,
            Regex::new("^Merge ").unwrap(),
            authorized,
            Duration::from_secs(1),
        );

        let client = Client::tracked(build_rocket(SECRET.to_string(), dispatcher))
            .expect("valid rocket instance");
        (client, receiver)
    }

    fn deliver<'c>(
        client: &'c Client,
        event: &str,
        body: &str,
        signature: Option<String>,
    ) -> rocket::local::blocking::LocalResponse<'c> {
        let mut request = client
            .post("/api/webhooks/github")
            .header(Header::new(X_GITHUB_EVENT, event.to_string()))
            .header(Header::new(X_GITHUB_DELIVERY, "72d3162e-cc78-11e3-81ab-4c9367dc0958"))
            .body(body);
        if let Some(signature) = signature {
            request = request.header(Header::new("X-Hub-Signature-256", signature));
        }
        request.dispatch()
    }

    #[test]
    fn push_is_forwarded() {
        let (client, mut receiver) = client(None);

        let response = deliver(&client, "push", PUSH, Some(sign(SECRET, PUSH.as_bytes())));
        assert_eq!(response.status(), Status::Ok);

        let batch = receiver.try_recv().expect("a batch should have been forwarded");
        assert_eq!(batch.repo, "org/repo");
        assert_eq!(
            batch.notices,
            vec!["https://example.com/org/repo/commit/abcdef — Fix crash — alice".to_string()]
        );
        assert_eq!(
            batch.targets,
            vec![FeedTarget::Log {
                name: "test".to_string()
            }]
        );
    }

    #[test]
    fn missing_or_wrong_signature_is_unauthorized() {
        let (client, mut receiver) = client(None);

        let response = deliver(&client, "push", PUSH, None);
        assert_eq!(response.status(), Status::Unauthorized);

        let response = deliver(&client, "push", PUSH, Some(sign("wrong", PUSH.as_bytes())));
        assert_eq!(response.status(), Status::Unauthorized);

        let response = deliver(&client, "push", PUSH, Some("abcdef".to_string()));
        assert_eq!(response.status(), Status::Unauthorized);

        // signature checked before the event type
        let response = deliver(&client, "fork", "{}", None);
        assert_eq!(response.status(), Status::Unauthorized);

        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn unsupported_kind_is_named() {
        let (client, _receiver) = client(None);

        let body = r#"{"forkee": {}}"#;
        let response = deliver(&client, "fork", body, Some(sign(SECRET, body.as_bytes())));
        assert_eq!(response.status(), Status::NotFound);
        assert!(response.into_string().unwrap().contains("fork"));
    }

    #[test]
    fn ping_is_acknowledged() {
        let (client, mut receiver) = client(None);

        let body = r#"{"zen": "Speak like a human.", "hook_id": 1}"#;
        let response = deliver(&client, "ping", body, Some(sign(SECRET, body.as_bytes())));
        assert_eq!(response.status(), Status::Ok);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn malformed_payload_is_internal_error() {
        let (client, _receiver) = client(None);

        let body = r#"{"action": "started"}"#;
        let response = deliver(&client, "watch", body, Some(sign(SECRET, body.as_bytes())));
        assert_eq!(response.status(), Status::InternalServerError);
    }

    #[test]
    fn filtered_action_is_ok_without_notice() {
        let (client, mut receiver) = client(None);

        let body = r#"{
            "action": "edited",
            "repository": { "full_name": "org/repo", "html_url": "https://example.com/org/repo" },
            "sender": { "login": "bob" },
            "issue": { "number": 3, "title": "Crash" }
        }"#;
        let response = deliver(
            &client,
            "issue_comment",
            body,
            Some(sign(SECRET, body.as_bytes())),
        );
        assert_eq!(response.status(), Status::Ok);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn unknown_repository_is_rejected() {
        let authorized =
            AuthorizedRepos::new([Url::parse("https://example.com/org/other").unwrap()]);
        let (client, mut receiver) = client(Some(authorized));

        let response = deliver(&client, "push", PUSH, Some(sign(SECRET, PUSH.as_bytes())));
        assert_eq!(response.status(), Status::InternalServerError);
        assert!(response
            .into_string()
            .unwrap()
            .contains("https://example.com/org/repo"));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn legacy_sha1_signature_is_accepted() {
        let (client, mut receiver) = client(None);

        let response = client
            .post("/api/webhooks/github")
            .header(Header::new(X_GITHUB_EVENT, "push"))
            .header(Header::new(
                "X-Hub-Signature",
                format!("sha1={}", sign_sha1(SECRET, PUSH.as_bytes())),
            ))
            .body(PUSH)
            .dispatch();
        assert_eq!(response.status(), Status::Ok);

        let batch = receiver.try_recv().expect("a batch should have been forwarded");
        assert_eq!(batch.notices.len(), 1);
    }

    #[test]
    fn duplicate_signature_headers_are_unauthorized() {
        let (client, mut receiver) = client(None);

        // both copies are valid, the request is still ambiguous
        let response = client
            .post("/api/webhooks/github")
            .header(Header::new(X_GITHUB_EVENT, "push"))
            .header(Header::new("X-Hub-Signature-256", sign(SECRET, PUSH.as_bytes())))
            .header(Header::new("X-Hub-Signature-256", sign(SECRET, PUSH.as_bytes())))
            .body(PUSH)
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let (client, mut receiver) = client(None);

        // over Rocket's default 1 MiB `json` limit
        let body = format!(r#"{{"zen": "{}"}}"#, "a".repeat(2 * 1024 * 1024));
        let response = deliver(&client, "ping", &body, Some(sign(SECRET, body.as_bytes())));
        assert_eq!(response.status(), Status::PayloadTooLarge);
        assert!(receiver.try_recv().is_err());
    }
}
