//! Recyclable command-buffer containers, one pool per worker thread.
//!
//! # Lifecycle
//!
//! A [`ManagedCommandBuffer`](state::ManagedCommandBuffer) tracks the native buffer's lifecycle
//! explicitly: `Initial → Recording → Executable → Pending → (back to the pool)`. Transitions
//! that the native API would reject are caught host-side and fail with
//! [`Error::InvalidState`](crate::Error::InvalidState) instead of corrupting the native object.
//!
//! # Threading
//!
//! Command pools are not thread-safe in the native API, so the
//! [`QueueCommandManager`](manager::QueueCommandManager) hands every calling thread its own
//! [`ThreadPool`](thread_pool::ThreadPool), created lazily on first request. The manager-level
//! mutex only guards the thread → pool map; once a thread has its pool, recording runs with no
//! contended locks. This costs one native pool per extra thread and buys zero per-operation lock
//! contention on the hot recording path.

pub mod manager;
pub mod state;
pub mod thread_pool;
