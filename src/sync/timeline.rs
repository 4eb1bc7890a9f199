//! Wrapper around a timeline semaphore.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::{DeviceInterface, Error};

/// A monotonically increasing counter exposed through a single semaphore object.
///
/// [`last_signaled`](Self::last_signaled) is a local cache of the last value signaled through
/// this wrapper and is not authoritative: other queues advance the counter on the GPU side, so
/// cross-thread observation must go through [`value`](Self::value).
#[derive(Debug)]
pub struct TimelineSemaphore<D: DeviceInterface> {
    device: D,
    handle: vk::Semaphore,
    last_signaled: AtomicU64,
}

impl<D: DeviceInterface> TimelineSemaphore<D> {
    /// Create a new timeline semaphore starting at `initial_value`.
    pub fn new(device: D, initial_value: u64) -> Result<Self> {
        let handle = device
            .create_timeline_semaphore(initial_value)
            .map_err(Error::ResourceCreationFailed)?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkSemaphore (timeline) {handle:?}");
        Ok(Self {
            device,
            handle,
            last_signaled: AtomicU64::new(initial_value),
        })
    }

    /// Obtain the raw vulkan handle of the semaphore.
    pub unsafe fn handle(&self) -> vk::Semaphore {
        self.handle
    }

    /// Signal the semaphore to `value` from the host. Values must be monotonically increasing.
    pub fn signal(&self, value: u64) -> Result<()> {
        self.device
            .signal_semaphore(self.handle, value)
            .map_err(Error::VkError)?;
        self.last_signaled.fetch_max(value, Ordering::Release);
        Ok(())
    }

    /// Block until the counter reaches `value`, or fail with [`Error::Timeout`].
    pub fn wait(&self, value: u64, timeout: Duration) -> Result<()> {
        match self
            .device
            .wait_semaphore(self.handle, value, timeout.as_nanos() as u64)
        {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(Error::Timeout.into()),
            Err(e) => Err(Error::VkError(e).into()),
        }
    }

    /// Query the authoritative GPU-side counter value.
    pub fn value(&self) -> Result<u64> {
        Ok(self
            .device
            .semaphore_value(self.handle)
            .map_err(Error::VkError)?)
    }

    /// The last value signaled through this wrapper. A local cache, not authoritative.
    pub fn last_signaled(&self) -> u64 {
        self.last_signaled.load(Ordering::Acquire)
    }
}

impl<D: DeviceInterface> Drop for TimelineSemaphore<D> {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkSemaphore (timeline) {:?}", self.handle);
        self.device.destroy_semaphore(self.handle);
    }
}
