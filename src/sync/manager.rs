//! The sync manager bundles a fence pool and a semaphore pool behind one surface.

use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::{DeviceInterface, FencePool, SemaphorePool};

/// Acts as the single place rendering code acquires and releases synchronization objects from.
/// Both pools are clone-shared, so the manager itself can be cloned freely and handed to every
/// thread that submits or polls.
#[derive(Clone)]
pub struct SyncManager<D: DeviceInterface> {
    fences: FencePool<D>,
    semaphores: SemaphorePool<D>,
}

impl<D: DeviceInterface> SyncManager<D> {
    pub fn new(device: D) -> Self {
        Self {
            fences: FencePool::new(device.clone()),
            semaphores: SemaphorePool::new(device),
        }
    }

    /// Acquire a fence from the pool. See [`FencePool::acquire`].
    pub fn acquire_fence(&self, signaled: bool) -> Result<vk::Fence> {
        self.fences.acquire(signaled)
    }

    /// Return a fence to the pool.
    pub fn release_fence(&self, fence: vk::Fence) -> Result<()> {
        self.fences.release(fence)
    }

    /// Block until `fence` is signaled, then return it to the pool.
    pub fn wait_and_release_fence(&self, fence: vk::Fence, timeout: Duration) -> Result<()> {
        self.fences.wait_and_release(fence, timeout)
    }

    /// Acquire a binary semaphore from the pool.
    pub fn acquire_semaphore(&self) -> Result<vk::Semaphore> {
        self.semaphores.acquire()
    }

    /// Return a binary semaphore to the pool.
    pub fn release_semaphore(&self, semaphore: vk::Semaphore) -> Result<()> {
        self.semaphores.release(semaphore)
    }

    /// The underlying fence pool, for sharing with a [`TransferPipeline`](crate::TransferPipeline).
    pub fn fences(&self) -> &FencePool<D> {
        &self.fences
    }

    /// The underlying semaphore pool.
    pub fn semaphores(&self) -> &SemaphorePool<D> {
        &self.semaphores
    }
}
