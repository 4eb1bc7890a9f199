//! Signature-keyed caching of descriptor-set handles.
//!
//! The cache shares the recycle-pool design of the sync module: bounded per-bucket capacity with
//! LRU eviction, plus age-based expiry driven by a frame counter. It stores handles only and
//! never creates or destroys GPU objects; ownership of evicted descriptor sets stays with the
//! caller.

pub mod cache;
