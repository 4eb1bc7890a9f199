//! Queue roles and metadata.

use ash::vk;

/// Abstraction over vulkan queue capabilities. Note that in raw Vulkan, there is no 'Graphics
/// queue'. Deimos will expose one, but behind the scenes the exposed e.g. graphics queue and
/// transfer queue could point to the same hardware queue.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Hash)]
pub enum QueueType {
    #[default]
    Graphics = vk::QueueFlags::GRAPHICS.as_raw() as isize,
    Compute = vk::QueueFlags::COMPUTE.as_raw() as isize,
    Transfer = vk::QueueFlags::TRANSFER.as_raw() as isize,
}

/// Stores all information of a queue that was found on the physical device.
#[derive(Default, Debug, Copy, Clone)]
pub struct QueueInfo {
    /// Functionality that this queue provides.
    pub queue_type: QueueType,
    /// Whether this is a dedicated queue or not.
    pub dedicated: bool,
    /// The queue family index.
    pub family_index: u32,
    /// All supported operations on this queue, instead of its primary type.
    pub flags: vk::QueueFlags,
}

/// A logical command queue: the native handle paired with its [`QueueInfo`]. Submission to the
/// handle goes through [`DeviceInterface::queue_submit`](crate::DeviceInterface::queue_submit);
/// this type carries no device state of its own.
#[derive(Debug, Copy, Clone)]
pub struct Queue {
    handle: vk::Queue,
    info: QueueInfo,
}

impl Queue {
    /// Wrap a device queue obtained from the application's device setup.
    pub fn new(handle: vk::Queue, info: QueueInfo) -> Self {
        Self {
            handle,
            info,
        }
    }

    /// Obtain the raw vulkan handle of the queue.
    /// # Safety
    /// Submissions through this handle bypass the pipeline's completion tracking.
    pub unsafe fn handle(&self) -> vk::Queue {
        self.handle
    }

    pub fn info(&self) -> &QueueInfo {
        &self.info
    }
}
