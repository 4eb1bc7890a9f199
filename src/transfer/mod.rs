//! Batched copy submission with pooled resources and completion tracking.
//!
//! A [`TransferBatch`](batch::TransferBatch) collects copy operations, the
//! [`TransferPipeline`](pipeline::TransferPipeline) submits it to the transfer queue with a
//! pool-acquired command buffer and fence, and [`poll`](pipeline::TransferPipeline::poll) (or
//! [`wait_idle`](pipeline::TransferPipeline::wait_idle)) returns both to their pools once the
//! GPU signals completion.
//!
//! Operations within one batch execute in recorded order relative to each other, but nothing
//! orders two different batches: cross-batch dependencies are the caller's to establish.
//! Submitted work cannot be withdrawn; the only control is whether to poll or block.

pub mod batch;
pub mod pipeline;
pub mod staging;
