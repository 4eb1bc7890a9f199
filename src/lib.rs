//! Recyclable Vulkan resource pools with batched transfer submission and completion tracking
//!
//! Deimos manages the host-side lifetime of the objects Vulkan programs churn through the most:
//! command buffers, fences and semaphores are handed out from recycling pools, copy work is
//! batched onto a transfer queue, and every pooled object flows back to its pool once the GPU
//! signals completion. Nothing is reclaimed while a submission might still reference it, and
//! nothing stalls the caller unless it explicitly asks to wait.
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import types under a namespace.
//! use deimos::prelude as dm;
//!
//! // Or, if you dont care about using the types under a namespace
//! use deimos::prelude::*;
//! ```
//!
//! # Example
//!
//! Device and queue creation stays with the application; deimos wraps an already-created
//! `ash::Device` and the queues you hand it.
//! ```ignore
//! use deimos::prelude::*;
//!
//! let device = Device::new(ash_device);
//! let transfer_queue = Queue::new(raw_queue, QueueInfo {
//!     queue_type: QueueType::Transfer,
//!     dedicated: true,
//!     family_index: 1,
//!     flags: vk::QueueFlags::TRANSFER,
//! });
//! // Per-thread command buffer pools for the transfer queue.
//! let commands = QueueCommandManager::new(device.clone(), &transfer_queue);
//! // Recyclable fences and semaphores.
//! let sync = SyncManager::new(device.clone());
//! // Batched copies with completion tracking.
//! let transfer = TransferPipeline::new(device.clone(), allocator, commands, sync.fences().clone());
//!
//! let mut batch = transfer.create_batch();
//! batch.add_buffer_copy(src, dst, regions);
//! transfer.submit_batch(batch)?;
//! // ... later, on any thread:
//! transfer.poll()?;
//! ```
//! For further example code, check out the following modules
//! - [`sync`] for the fence/semaphore pools, the sync manager and timeline semaphores.
//! - [`command_buffer`] for the per-thread command buffer pools and the lifecycle state machine.
//! - [`transfer`] for batched copy submission, polling and staged uploads.
//! - [`descriptor`] for the signature-keyed descriptor set cache.
//! - [`allocator`] for the memory allocator seam used by staged uploads.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod allocator;
pub mod command_buffer;
pub mod core;
pub mod descriptor;
pub mod sync;
pub mod transfer;
