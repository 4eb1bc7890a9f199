//! Host-visible staging buffers backing the upload helpers.

use anyhow::Result;
use ash::vk;

use crate::{Allocation, Allocator, DeviceInterface, Error, MemoryType};

/// A mappable `TRANSFER_SRC` buffer used as the source of a staged upload.
///
/// The buffer handle is destroyed when this is dropped; the memory allocation releases itself
/// through the allocator. A staging buffer must stay alive until the copy reading from it has
/// completed on the GPU, which the pipeline guarantees by attaching it to the batch's cleanup.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct StagingBuffer<D: DeviceInterface, A: Allocator> {
    device: D,
    handle: vk::Buffer,
    #[derivative(Debug = "ignore")]
    memory: A::Allocation,
    size: vk::DeviceSize,
}

impl<D: DeviceInterface, A: Allocator> StagingBuffer<D, A> {
    /// Allocate a staging buffer of `size` bytes in mappable memory.
    pub fn new(device: D, allocator: &mut A, size: vk::DeviceSize) -> Result<Self> {
        let handle = device
            .create_buffer(size, vk::BufferUsageFlags::TRANSFER_SRC)
            .map_err(Error::ResourceCreationFailed)?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkBuffer {handle:?} (staging, size = {size} bytes)");

        let requirements = device.buffer_memory_requirements(handle);
        let memory = match allocator.allocate("staging buffer", &requirements, MemoryType::CpuToGpu)
        {
            Ok(memory) => memory,
            Err(e) => {
                device.destroy_buffer(handle);
                return Err(e);
            }
        };
        if let Err(e) =
            device.bind_buffer_memory(handle, unsafe { memory.memory() }, memory.offset())
        {
            device.destroy_buffer(handle);
            return Err(Error::VkError(e).into());
        }

        Ok(Self {
            device,
            handle,
            memory,
            size,
        })
    }

    /// Obtain the raw vulkan handle of the buffer.
    pub unsafe fn handle(&self) -> vk::Buffer {
        self.handle
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Copy `data` into the mapped memory, starting at offset 0.
    pub fn write<T: Copy>(&mut self, data: &[T]) -> Result<()> {
        let byte_len = std::mem::size_of_val(data);
        if byte_len as vk::DeviceSize > self.size {
            return Err(Error::Uncategorized("staging buffer write out of range").into());
        }
        let pointer = self.memory.mapped_ptr().ok_or(Error::UnmappableBuffer)?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr() as *const u8,
                pointer.as_ptr() as *mut u8,
                byte_len,
            );
        }
        Ok(())
    }
}

impl<D: DeviceInterface, A: Allocator> Drop for StagingBuffer<D, A> {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkBuffer {:?} (staging)", self.handle);
        self.device.destroy_buffer(self.handle);
    }
}
