//! The per-thread command-buffer pool.

use std::thread::ThreadId;

use anyhow::Result;
use ash::vk;

use crate::command_buffer::state::{CommandBufferState, ManagedCommandBuffer};
use crate::{DeviceInterface, Error};

/// One native command pool plus its recycling lists, owned by a single thread.
///
/// `allocated` tracks every buffer ever created from the native pool (for bulk reset), `free`
/// tracks the subset ready to hand out. Reuse pops from `free` and resets the buffer, so the
/// native allocation cost is only paid the first time.
///
/// Obtained through [`QueueCommandManager::thread_pool`](crate::QueueCommandManager::thread_pool);
/// the `Arc<Mutex<_>>` around it is uncontended in steady state because only the owning thread
/// records, and only a `poll()` observing completion briefly locks it to return a buffer.
#[derive(Debug)]
pub struct ThreadPool<D: DeviceInterface> {
    device: D,
    pool: vk::CommandPool,
    allocated: Vec<vk::CommandBuffer>,
    free: Vec<vk::CommandBuffer>,
    owner: ThreadId,
}

impl<D: DeviceInterface> ThreadPool<D> {
    pub(crate) fn new(device: D, family_index: u32) -> Result<Self> {
        let pool = device
            .create_command_pool(family_index)
            .map_err(Error::ResourceCreationFailed)?;
        let owner = std::thread::current().id();
        #[cfg(feature = "log-objects")]
        trace!("Created new VkCommandPool {pool:?} for thread {owner:?}");
        Ok(Self {
            device,
            pool,
            allocated: vec![],
            free: vec![],
            owner,
        })
    }

    /// Hand out a command buffer in the `Initial` state, reusing a released one if possible.
    pub fn acquire(&mut self) -> Result<ManagedCommandBuffer> {
        if let Some(cmd) = self.free.pop() {
            if let Err(e) = self.device.reset_command_buffer(cmd) {
                self.free.push(cmd);
                return Err(Error::VkError(e).into());
            }
            return Ok(ManagedCommandBuffer::new(cmd));
        }
        let cmd = self
            .device
            .allocate_command_buffer(self.pool)
            .map_err(Error::ResourceCreationFailed)?;
        self.allocated.push(cmd);
        Ok(ManagedCommandBuffer::new(cmd))
    }

    /// Return a command buffer to the pool. The buffer must not be used afterwards.
    ///
    /// A buffer still `Pending` cannot be released: its fence has not been observed as signaled,
    /// and handing it out again would let a caller reset a buffer the GPU is reading.
    pub fn release(&mut self, cmd: ManagedCommandBuffer) -> Result<()> {
        if cmd.state() == CommandBufferState::Pending {
            warn!("Refusing to release a command buffer that is still pending");
            return Err(Error::InvalidState(cmd.state()).into());
        }
        let handle = unsafe { cmd.handle() };
        if !self.allocated.contains(&handle) {
            warn!("Released command buffer {handle:?} was not allocated from this pool, ignoring");
            return Err(Error::HandleNotFound.into());
        }
        if self.free.contains(&handle) {
            warn!("Command buffer {handle:?} was released twice, ignoring");
            return Err(Error::HandleNotFound.into());
        }
        self.free.push(handle);
        Ok(())
    }

    /// Reset the entire native pool in one call and make every buffer ever allocated available
    /// again. This invalidates buffers a caller forgot to release; it is a bulk-recovery
    /// operation for end-of-frame cleanup, not a substitute for per-buffer release.
    pub fn reset_all(&mut self) -> Result<()> {
        self.device
            .reset_command_pool(self.pool)
            .map_err(Error::VkError)?;
        self.free.clear();
        self.free.extend(self.allocated.iter().copied());
        Ok(())
    }

    /// Total number of buffers ever allocated from this pool.
    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    /// Number of buffers ready to hand out.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// The thread this pool was created for.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Obtain the raw vulkan handle of the native command pool.
    pub unsafe fn handle(&self) -> vk::CommandPool {
        self.pool
    }
}

impl<D: DeviceInterface> Drop for ThreadPool<D> {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkCommandPool {:?}", self.pool);
        // Destroying the native pool frees every buffer allocated from it.
        self.device.destroy_command_pool(self.pool);
    }
}
