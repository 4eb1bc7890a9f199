//! The core module holds the error type, the device interface that every pool
//! talks to, and the queue metadata consumed by the command and transfer layers.

pub mod device;
pub mod error;
pub mod queue;
