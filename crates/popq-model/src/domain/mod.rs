mod policy;
pub use policy::ClaimPolicy;

mod timeout;
pub use timeout::WaitTimeout;

mod waiter_info;
pub use waiter_info::WaiterInfo;

/// Name of a list value in the host store.
///
/// Lists and their waiter queues are partitioned by key; operations on
/// distinct keys never coordinate with each other.
pub type Key = String;

/// A single list element: an opaque byte string.
///
/// The core never inspects element contents, it only moves them from the
/// list tail to a caller.
pub type Element = Vec<u8>;
