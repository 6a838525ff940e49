//! Fair, atomic, blocking multi-consumer pop over keyed lists.
//!
//! Two commands sit on top of an ordered-list value type: [`PopEngine::pop_all`]
//! drains a list, [`PopEngine::pop_batch`] takes a bounded count. Both block
//! the caller (without parking a thread) until elements arrive, the timeout
//! elapses, or the call is cancelled. Blocked callers are served strictly in
//! registration order, and every element is delivered exactly once.

pub mod error;
pub use error::PopError;

pub mod registry;
pub use registry::WaitRegistry;

pub mod resolver;
pub use resolver::ClaimResolver;

pub mod scheduler;
pub use scheduler::TimeoutScheduler;

pub mod command;
pub use command::PopEngine;
