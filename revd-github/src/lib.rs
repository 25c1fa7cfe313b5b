//! revd GitHub - GitHub integration for the revd review daemon
//!
//! Polls open pull requests over the REST API with ETag revalidation and
//! reads and writes PR conversation comments.

mod comments;
mod error;
mod poller;

pub use comments::GitHubComments;
pub use error::{Error, Result};
pub use poller::{GitHubPoller, RateLimit, GITHUB_API_URL};
