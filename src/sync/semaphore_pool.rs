//! A recycling store for binary semaphore objects.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::vk;

use crate::{DeviceInterface, Error};

#[derive(Debug)]
struct SemaphorePoolInner<D: DeviceInterface> {
    device: D,
    available: Vec<vk::Semaphore>,
    in_use: Vec<vk::Semaphore>,
    created: usize,
}

/// A pool of reusable binary semaphores, sharing the recycling design of
/// [`FencePool`](crate::FencePool). Unlike fences, binary semaphores cannot be reset from the
/// host; a released semaphore must already have had its pending signal consumed by a wait before
/// it is reused.
#[derive(Debug)]
pub struct SemaphorePool<D: DeviceInterface> {
    inner: Arc<Mutex<SemaphorePoolInner<D>>>,
}

impl<D: DeviceInterface> Clone for SemaphorePool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: DeviceInterface> SemaphorePool<D> {
    pub fn new(device: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SemaphorePoolInner {
                device,
                available: vec![],
                in_use: vec![],
                created: 0,
            })),
        }
    }

    /// Acquire a semaphore, reusing a pooled one if possible.
    pub fn acquire(&self) -> Result<vk::Semaphore> {
        let mut inner = self.inner.lock().map_err(|_| Error::PoisonError)?;
        let semaphore = match inner.available.pop() {
            Some(semaphore) => semaphore,
            None => {
                let semaphore = inner
                    .device
                    .create_semaphore()
                    .map_err(Error::ResourceCreationFailed)?;
                #[cfg(feature = "log-objects")]
                trace!("Created new VkSemaphore {semaphore:?}");
                inner.created += 1;
                semaphore
            }
        };
        inner.in_use.push(semaphore);
        Ok(semaphore)
    }

    /// Return a semaphore to the pool. Releasing an untracked handle is a caller bug and leaves
    /// the pool untouched.
    pub fn release(&self, semaphore: vk::Semaphore) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::PoisonError)?;
        let Some(index) = inner.in_use.iter().position(|&s| s == semaphore) else {
            warn!("Released semaphore {semaphore:?} is not in use by this pool, ignoring");
            return Err(Error::HandleNotFound.into());
        };
        inner.in_use.swap_remove(index);
        inner.available.push(semaphore);
        Ok(())
    }

    /// Number of semaphores ready to be handed out.
    pub fn available_count(&self) -> usize {
        self.inner.lock().unwrap().available.len()
    }

    /// Number of semaphores currently handed out.
    pub fn in_use_count(&self) -> usize {
        self.inner.lock().unwrap().in_use.len()
    }

    /// Total number of native semaphores this pool ever created.
    pub fn created_count(&self) -> usize {
        self.inner.lock().unwrap().created
    }
}

impl<D: DeviceInterface> Drop for SemaphorePoolInner<D> {
    fn drop(&mut self) {
        if !self.in_use.is_empty() {
            warn!(
                "Destroying semaphore pool with {} semaphores still in use",
                self.in_use.len()
            );
        }
        for semaphore in self.available.drain(..).chain(self.in_use.drain(..)) {
            #[cfg(feature = "log-objects")]
            trace!("Destroying VkSemaphore {semaphore:?}");
            self.device.destroy_semaphore(semaphore);
        }
    }
}
