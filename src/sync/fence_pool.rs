//! A recycling store for fence objects.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::{DeviceInterface, Error};

#[derive(Debug)]
struct FencePoolInner<D: DeviceInterface> {
    device: D,
    available: Vec<vk::Fence>,
    in_use: Vec<vk::Fence>,
    created: usize,
}

/// A pool of reusable fences. Acquiring hands out a recycled fence where possible and only
/// creates a new native object when the pool is empty. A fence is in exactly one of the
/// `available` or `in_use` lists at any time, and destroying the pool destroys every fence it
/// ever created exactly once.
///
/// All internal state is wrapped in an `Arc<Mutex<T>>`, so this is safe to clone and share
/// between a submitting thread and a polling thread.
#[derive(Debug)]
pub struct FencePool<D: DeviceInterface> {
    inner: Arc<Mutex<FencePoolInner<D>>>,
}

impl<D: DeviceInterface> Clone for FencePool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: DeviceInterface> FencePool<D> {
    pub fn new(device: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FencePoolInner {
                device,
                available: vec![],
                in_use: vec![],
                created: 0,
            })),
        }
    }

    /// Create a pool with `count` unsignaled fences already available, avoiding native creation
    /// on the first acquires.
    pub fn with_preallocated(device: D, count: usize) -> Result<Self> {
        let pool = Self::new(device);
        {
            let mut inner = pool.inner.lock().map_err(|_| Error::PoisonError)?;
            for _ in 0..count {
                let fence = inner
                    .device
                    .create_fence(false)
                    .map_err(Error::ResourceCreationFailed)?;
                #[cfg(feature = "log-objects")]
                trace!("Created new VkFence {fence:?}");
                inner.available.push(fence);
                inner.created += 1;
            }
        }
        Ok(pool)
    }

    /// Acquire a fence, reusing a pooled one if possible. A reused fence is always reset to the
    /// unsignaled state first; only a freshly created fence honors `signaled`.
    pub fn acquire(&self, signaled: bool) -> Result<vk::Fence> {
        let mut inner = self.inner.lock().map_err(|_| Error::PoisonError)?;
        let fence = match inner.available.pop() {
            Some(fence) => {
                if let Err(e) = inner.device.reset_fence(fence) {
                    inner.available.push(fence);
                    return Err(Error::VkError(e).into());
                }
                fence
            }
            None => {
                let fence = inner
                    .device
                    .create_fence(signaled)
                    .map_err(Error::ResourceCreationFailed)?;
                #[cfg(feature = "log-objects")]
                trace!("Created new VkFence {fence:?}");
                inner.created += 1;
                fence
            }
        };
        inner.in_use.push(fence);
        Ok(fence)
    }

    /// Return a fence to the pool. The fence must currently be tracked as in use; releasing an
    /// untracked handle is a caller bug and leaves the pool untouched.
    pub fn release(&self, fence: vk::Fence) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::PoisonError)?;
        let Some(index) = inner.in_use.iter().position(|&f| f == fence) else {
            warn!("Released fence {fence:?} is not in use by this pool, ignoring");
            return Err(Error::HandleNotFound.into());
        };
        inner.in_use.swap_remove(index);
        inner.available.push(fence);
        Ok(())
    }

    /// Block until `fence` is signaled, then return it to the pool. On [`Error::Timeout`] the
    /// fence stays in use so the caller can retry the wait.
    ///
    /// The native wait runs outside the pool lock, so other threads can keep acquiring and
    /// releasing while one thread blocks.
    pub fn wait_and_release(&self, fence: vk::Fence, timeout: Duration) -> Result<()> {
        let device = {
            let inner = self.inner.lock().map_err(|_| Error::PoisonError)?;
            if !inner.in_use.contains(&fence) {
                warn!("Waited-on fence {fence:?} is not in use by this pool");
                return Err(Error::HandleNotFound.into());
            }
            inner.device.clone()
        };
        match device.wait_for_fence(fence, timeout.as_nanos() as u64) {
            Ok(()) => self.release(fence),
            Err(vk::Result::TIMEOUT) => Err(Error::Timeout.into()),
            Err(e) => Err(Error::VkError(e).into()),
        }
    }

    /// Number of fences ready to be handed out.
    pub fn available_count(&self) -> usize {
        self.inner.lock().unwrap().available.len()
    }

    /// Number of fences currently handed out.
    pub fn in_use_count(&self) -> usize {
        self.inner.lock().unwrap().in_use.len()
    }

    /// Total number of native fences this pool ever created.
    pub fn created_count(&self) -> usize {
        self.inner.lock().unwrap().created
    }
}

impl<D: DeviceInterface> Drop for FencePoolInner<D> {
    fn drop(&mut self) {
        if !self.in_use.is_empty() {
            warn!(
                "Destroying fence pool with {} fences still in use",
                self.in_use.len()
            );
        }
        for fence in self.available.drain(..).chain(self.in_use.drain(..)) {
            #[cfg(feature = "log-objects")]
            trace!("Destroying VkFence {fence:?}");
            self.device.destroy_fence(fence);
        }
    }
}
