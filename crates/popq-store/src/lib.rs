//! List value storage behind the pop engine.
//!
//! The engine consumes only the [`ListStore`] contract: length, atomic
//! tail-pop, tail-push. [`MemoryListStore`] is the in-process
//! implementation used by tests and demos; a host store adapter implements
//! the same trait.

pub mod error;
pub use error::StoreError;

mod list;
pub use list::ListStore;

mod memory;
pub use memory::MemoryListStore;
