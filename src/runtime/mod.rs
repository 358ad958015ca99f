//! # Runtime
//!
//! Process-level plumbing around the reconciler: start-up, the controller
//! watch loop, its error policy and leader election.

pub mod error_policy;
pub mod initialization;
pub mod leader_election;
pub mod watch_loop;
