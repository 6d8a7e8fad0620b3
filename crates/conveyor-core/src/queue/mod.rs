//! Queue module: item state, retry policy, and pending-work ordering.

mod ordering;
mod record;
mod retry;
mod state;

pub(crate) use ordering::PendingQueue;
pub(crate) use record::QueueItem;
pub use retry::RetryPolicy;
pub use state::ItemState;
