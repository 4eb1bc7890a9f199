//! Exposes the deimos error type

use std::sync::PoisonError;

use ash;
use gpu_allocator::AllocationError;
use thiserror::Error;

use crate::command_buffer::state::CommandBufferState;

/// Error type that deimos can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic Vulkan error type.
    #[error("Vulkan error: `{0}`")]
    VkError(ash::vk::Result),
    /// Creating a native object (fence, semaphore, command buffer, buffer) failed.
    /// Usually host or device memory exhaustion. The caller may retry after freeing resources.
    #[error("Failed to create native object: `{0}`")]
    ResourceCreationFailed(ash::vk::Result),
    /// The queue submit call itself failed. Fatal for the affected batch.
    #[error("Queue submission failed: `{0}`")]
    SubmissionFailed(ash::vk::Result),
    /// A bounded wait did not complete in time. Distinct from failure, retryable.
    #[error("Wait timed out.")]
    Timeout,
    /// A command buffer was used in a lifecycle state that forbids the operation.
    #[error("Command buffer is in state `{0:?}`, which does not allow this operation.")]
    InvalidState(CommandBufferState),
    /// `release()` was called with a handle this pool does not track as in use.
    #[error("Handle was not acquired from this pool, or was already released.")]
    HandleNotFound,
    /// No queue was found for requested domain. Did you forget to request it?
    #[error("No queue found for requested domain. Did you forget a queue request on initialization?")]
    NoCapableQueue,
    /// Mappable memory expected
    #[error("Requested mappable memory, but the allocation does not have a memory map")]
    UnmappableBuffer,
    /// Vulkan allocation error.
    #[error("Vulkan allocation error: `{0}`")]
    AllocationError(AllocationError),
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}

impl From<ash::vk::Result> for Error {
    fn from(value: ash::vk::Result) -> Self {
        Error::VkError(value)
    }
}

impl From<AllocationError> for Error {
    fn from(value: AllocationError) -> Self {
        Error::AllocationError(value)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
