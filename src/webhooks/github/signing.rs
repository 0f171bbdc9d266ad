use hmac::{Hmac, Mac};
use rocket::{
    data::{ByteUnit, FromData, Outcome},
    http::Status,
    Data, Request,
};
use sha1::Sha1;
use sha2::Sha256;
use tracing::trace;

use crate::webhooks::github::{GitHubSecret, WebhookError};

const X_HUB_SIGNATURE_256: &str = "X-Hub-Signature-256";
// legacy header, only looked at when the SHA-256 one is missing
const X_HUB_SIGNATURE: &str = "X-Hub-Signature";

/// A signature header value, with the algorithm taken from its prefix.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Signature<'a> {
    Sha256(&'a str),
    Sha1(&'a str),
}

fn verify<M: Mac>(mut mac: M, data: &[u8], hex_signature: &str) -> bool {
    mac.update(data);

    match hex::decode(hex_signature) {
        // constant time comparison
        Ok(bytes) => mac.verify_slice(&bytes).is_ok(),
        Err(_) => {
            trace!("couldn't decode hex-encoded signature {}", hex_signature);
            false
        }
    }
}

pub(crate) fn validate_signature(secret: &str, signature: &Signature, data: &[u8]) -> bool {
    trace!("validating signature...");

    match signature {
        Signature::Sha256(hex) => match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
            Ok(mac) => verify(mac, data, hex),
            Err(_) => false,
        },
        Signature::Sha1(hex) => match Hmac::<Sha1>::new_from_slice(secret.as_bytes()) {
            Ok(mac) => verify(mac, data, hex),
            Err(_) => false,
        },
    }
}

/// Finds the signature GitHub attached to the request. The header must be present exactly once
/// and carry the algorithm prefix GitHub puts in front of its hex digest.
fn find_signature<'r>(request: &'r Request<'_>) -> Result<Signature<'r>, WebhookError> {
    for (header, prefix) in [(X_HUB_SIGNATURE_256, "sha256="), (X_HUB_SIGNATURE, "sha1=")] {
        let values = request.headers().get(header).collect::<Vec<_>>();
        match *values.as_slice() {
            [] => continue,
            [value] => {
                let hex = value.strip_prefix(prefix).ok_or_else(|| {
                    trace!("couldn't strip prefix from signature `{}`", value);
                    WebhookError::Unauthorized("malformed signature header")
                })?;

                return Ok(if prefix == "sha256=" {
                    Signature::Sha256(hex)
                } else {
                    Signature::Sha1(hex)
                });
            }
            _ => {
                trace!("found more than one {} header", header);
                return Err(WebhookError::Unauthorized(
                    "request needs exactly one signature",
                ));
            }
        }
    }

    trace!("couldn't locate {} header", X_HUB_SIGNATURE_256);
    Err(WebhookError::Unauthorized("missing signature header"))
}

/// Raw body of a delivery whose signature matched our secret. The bytes are kept exactly as
/// received: decoding happens later, once we know the payload comes from GitHub.
pub struct SignedGitHubPayload(pub Vec<u8>);

const LIMIT: ByteUnit = ByteUnit::Mebibyte(1);

// Tracking issue for chaining Data guards to avoid reimplementing all this:
// https://github.com/SergioBenitez/Rocket/issues/775
#[rocket::async_trait]
impl<'r> FromData<'r> for SignedGitHubPayload {
    type Error = WebhookError;

    async fn from_data(request: &'r Request<'_>, data: Data<'r>) -> Outcome<'r, Self> {
        trace!("received payload on GitHub webhook endpoint: {:?}", request);

        let signature = match find_signature(request) {
            Ok(signature) => signature,
            Err(e) => return Outcome::Error((Status::Unauthorized, e)),
        };

        let size_limit = request.limits().get("json").unwrap_or(LIMIT);
        let content = match data.open(size_limit).into_bytes().await {
            Ok(bytes) if bytes.is_complete() => bytes.into_inner(),
            Ok(_) => {
                trace!("payload was too big");
                return Outcome::Error((
                    Status::PayloadTooLarge,
                    WebhookError::PayloadTooLarge,
                ));
            }
            Err(e) => return Outcome::Error((Status::BadRequest, WebhookError::Io(e))),
        };

        let secret = match request.rocket().state::<GitHubSecret>() {
            Some(secret) => secret,
            None => {
                return Outcome::Error((
                    Status::InternalServerError,
                    WebhookError::MissingState("GitHubSecret"),
                ))
            }
        };

        if !validate_signature(&secret.0, &signature, &content) {
            trace!("signature validation failed, stopping here...");
            return Outcome::Error((
                Status::Unauthorized,
                WebhookError::Unauthorized("couldn't verify signature"),
            ));
        }

        trace!("validated GitHub payload");
        Outcome::Success(SignedGitHubPayload(content))
    }
}
