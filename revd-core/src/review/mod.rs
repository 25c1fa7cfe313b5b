//! Review jobs
//!
//! The daemon side schedules and tracks jobs ([`ReviewCoordinator`] over a
//! [`ReviewLauncher`]); the job side runs one review in its own process
//! ([`ReviewRunner`]).

pub mod agent;
pub mod coordinator;
pub mod launcher;
pub mod request;
pub mod runner;
pub mod skill;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{AgentOutput, ClaudeReviewer, ReviewAgent};
pub use coordinator::ReviewCoordinator;
pub use launcher::{JobExit, ProcessJob, ProcessLauncher, ReviewJob, ReviewLauncher};
pub use request::{ReviewKey, ReviewRequest};
pub use runner::{review_body, review_prompt, ReviewOutcome, ReviewRunner};
pub use skill::load_skill;
