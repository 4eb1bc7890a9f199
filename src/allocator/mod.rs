//! The allocator module exposes the memory-allocator seam used by staged uploads.
//!
//! # Allocator traits
//! These are defined in [`traits`], and can be implemented to supply a custom allocator type.
//! The pooling subsystem never inspects allocator internals; it only consumes the opaque
//! allocation handle.
//! # Default allocator
//! A default allocator based on the `gpu_allocator` crate is implemented here.

pub mod default_allocator;
pub mod memory_type;
pub mod traits;
