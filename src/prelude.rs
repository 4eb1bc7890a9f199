pub use ash::vk;

pub use crate::core::device::{Device, DeviceInterface};
pub use crate::core::error::Error;
pub use crate::core::queue::{Queue, QueueInfo, QueueType};

pub use crate::allocator::default_allocator::DefaultAllocator;
pub use crate::allocator::memory_type::MemoryType;
pub use crate::allocator::traits::*;

pub use crate::sync::fence_pool::FencePool;
pub use crate::sync::manager::SyncManager;
pub use crate::sync::semaphore_pool::SemaphorePool;
pub use crate::sync::timeline::TimelineSemaphore;

pub use crate::command_buffer::manager::{CommandManager, QueueCommandManager};
pub use crate::command_buffer::state::{CommandBufferState, ManagedCommandBuffer};
pub use crate::command_buffer::thread_pool::ThreadPool;

pub use crate::transfer::batch::TransferBatch;
pub use crate::transfer::pipeline::{RetiredBatch, TransferPipeline};
pub use crate::transfer::staging::StagingBuffer;

pub use crate::descriptor::cache::{
    BindingSignature, DescriptorBinding, DescriptorCache, DescriptorContents,
};
