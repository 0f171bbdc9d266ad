use rocket::{routes, Build, Rocket};

pub mod github;
pub use github::{github_webhook, GitHubEvent, GitHubSecret};

use crate::notices::Dispatcher;

/// Mounts the webhook endpoints, with everything they need to run as managed state.
pub fn build_rocket(github_secret: String, dispatcher: Dispatcher) -> Rocket<Build> {
    rocket::build()
        .mount("/", routes![github_webhook])
        .manage(GitHubSecret(github_secret))
        .manage(dispatcher)
}
