//! The device interface consumed by every pool, and the production implementation over [`ash`].
//!
//! All pooling and completion-tracking logic in this crate talks to the GPU through
//! [`DeviceInterface`] instead of calling into `ash` directly. The submission primitives are an
//! external collaborator of the pooling subsystem, so they live behind a trait the same way the
//! memory allocator lives behind [`Allocator`](crate::Allocator). [`Device`] is the implementation
//! used in real programs; tests substitute their own.

use std::fmt::Debug;
use std::slice;
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;
use static_assertions::assert_impl_all;

/// The device/queue submission primitives the pools are built on.
///
/// Every method maps to exactly one native call and returns the raw [`VkResult`]; conversion into
/// the crate [`Error`](crate::Error) taxonomy happens at the call sites, which know whether a
/// failure is a creation failure, a submission failure or a timeout.
///
/// Implementations must be cheaply cloneable handles to shared device state
/// (see [`Device`] for the production shape).
pub trait DeviceInterface: Clone + Debug + Send + Sync + 'static {
    /// Create a new fence, possibly in the signaled status.
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    /// Reset a fence to the unsignaled status.
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;
    /// Query whether a fence is signaled, without blocking.
    fn fence_status(&self, fence: vk::Fence) -> VkResult<bool>;
    /// Block until the fence is signaled or `timeout` nanoseconds elapse.
    /// An elapsed timeout surfaces as `Err(vk::Result::TIMEOUT)`.
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()>;

    /// Create a new binary semaphore.
    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    /// Create a new timeline semaphore with the given initial counter value.
    fn create_timeline_semaphore(&self, initial_value: u64) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    /// Signal a timeline semaphore to `value` from the host.
    fn signal_semaphore(&self, semaphore: vk::Semaphore, value: u64) -> VkResult<()>;
    /// Block until a timeline semaphore reaches `value` or `timeout` nanoseconds elapse.
    fn wait_semaphore(&self, semaphore: vk::Semaphore, value: u64, timeout: u64) -> VkResult<()>;
    /// Query the current GPU-side counter value of a timeline semaphore.
    fn semaphore_value(&self, semaphore: vk::Semaphore) -> VkResult<u64>;

    /// Create a command pool for the given queue family. Pools are created transient and with
    /// per-buffer reset enabled, which the recycling logic relies on.
    fn create_command_pool(&self, family_index: u32) -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    /// Reset an entire command pool, returning every buffer allocated from it to the initial state.
    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()>;
    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer>;
    fn free_command_buffer(&self, pool: vk::CommandPool, cmd: vk::CommandBuffer);
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    );
    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    );
    fn cmd_copy_image_to_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Buffer,
        regions: &[vk::BufferImageCopy],
    );
    fn cmd_copy_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    );

    /// Submit command buffers to a queue, signaling `fence` on completion.
    fn queue_submit(
        &self,
        queue: vk::Queue,
        cmds: &[vk::CommandBuffer],
        fence: vk::Fence,
    ) -> VkResult<()>;
    /// Block until every submission on the queue has completed.
    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()>;

    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags)
        -> VkResult<vk::Buffer>;
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;
}

#[derive(Derivative)]
#[derivative(Debug)]
struct DeviceInner {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDevice {:p}", self.handle.handle());
        unsafe { self.handle.destroy_device(None) };
    }
}

/// Wrapper around a `VkDevice`. Internal state is wrapped in an `Arc<DeviceInner>`, so this is
/// safe to clone and hand to every pool. The wrapped `ash::Device` is destroyed when the last
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

assert_impl_all!(Device: Send, Sync, Clone);

impl Device {
    /// Take ownership of an already-created `ash::Device`. Device and queue creation is up to the
    /// application; this crate only orchestrates resources on top of them.
    pub fn new(device: ash::Device) -> Self {
        #[cfg(feature = "log-objects")]
        trace!("Registered VkDevice {:p}", device.handle());
        Self {
            inner: Arc::new(DeviceInner {
                handle: device,
            }),
        }
    }

    /// Get unsafe access to the underlying `ash::Device`.
    /// # Safety
    /// Any vulkan calls that mutate the device's state may lead to race conditions or undefined
    /// behavior when called through this handle.
    pub unsafe fn handle(&self) -> ash::Device {
        self.inner.handle.clone()
    }
}

impl DeviceInterface for Device {
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            p_next: std::ptr::null(),
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
        };
        unsafe { self.inner.handle.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.inner.handle.destroy_fence(fence, None) };
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.inner.handle.reset_fences(slice::from_ref(&fence)) }
    }

    fn fence_status(&self, fence: vk::Fence) -> VkResult<bool> {
        unsafe { self.inner.handle.get_fence_status(fence) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()> {
        unsafe {
            self.inner
                .handle
                .wait_for_fences(slice::from_ref(&fence), true, timeout)
        }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            p_next: std::ptr::null(),
            flags: vk::SemaphoreCreateFlags::empty(),
        };
        unsafe { self.inner.handle.create_semaphore(&info, None) }
    }

    fn create_timeline_semaphore(&self, initial_value: u64) -> VkResult<vk::Semaphore> {
        let type_info = vk::SemaphoreTypeCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_TYPE_CREATE_INFO,
            p_next: std::ptr::null(),
            semaphore_type: vk::SemaphoreType::TIMELINE,
            initial_value,
        };
        let info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            p_next: &type_info as *const _ as *const std::ffi::c_void,
            flags: vk::SemaphoreCreateFlags::empty(),
        };
        unsafe { self.inner.handle.create_semaphore(&info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.inner.handle.destroy_semaphore(semaphore, None) };
    }

    fn signal_semaphore(&self, semaphore: vk::Semaphore, value: u64) -> VkResult<()> {
        let info = vk::SemaphoreSignalInfo {
            s_type: vk::StructureType::SEMAPHORE_SIGNAL_INFO,
            p_next: std::ptr::null(),
            semaphore,
            value,
        };
        unsafe { self.inner.handle.signal_semaphore(&info) }
    }

    fn wait_semaphore(&self, semaphore: vk::Semaphore, value: u64, timeout: u64) -> VkResult<()> {
        let info = vk::SemaphoreWaitInfo {
            s_type: vk::StructureType::SEMAPHORE_WAIT_INFO,
            p_next: std::ptr::null(),
            flags: vk::SemaphoreWaitFlags::empty(),
            semaphore_count: 1,
            p_semaphores: &semaphore,
            p_values: &value,
        };
        unsafe { self.inner.handle.wait_semaphores(&info, timeout) }
    }

    fn semaphore_value(&self, semaphore: vk::Semaphore) -> VkResult<u64> {
        unsafe { self.inner.handle.get_semaphore_counter_value(semaphore) }
    }

    fn create_command_pool(&self, family_index: u32) -> VkResult<vk::CommandPool> {
        // Transient because buffers cycle through the pool frequently, resettable because reuse
        // resets individual buffers without tearing down the whole pool.
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            p_next: std::ptr::null(),
            flags: vk::CommandPoolCreateFlags::TRANSIENT
                | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: family_index,
        };
        unsafe { self.inner.handle.create_command_pool(&info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.inner.handle.destroy_command_pool(pool, None) };
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()> {
        unsafe {
            self.inner
                .handle
                .reset_command_pool(pool, vk::CommandPoolResetFlags::empty())
        }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            p_next: std::ptr::null(),
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
        };
        let mut buffers = unsafe { self.inner.handle.allocate_command_buffers(&info)? };
        buffers.pop().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn free_command_buffer(&self, pool: vk::CommandPool, cmd: vk::CommandBuffer) {
        unsafe {
            self.inner
                .handle
                .free_command_buffers(pool, slice::from_ref(&cmd))
        };
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            p_next: std::ptr::null(),
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            p_inheritance_info: std::ptr::null(),
        };
        unsafe { self.inner.handle.begin_command_buffer(cmd, &info) }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.inner.handle.end_command_buffer(cmd) }
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.inner
                .handle
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
    }

    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe { self.inner.handle.cmd_copy_buffer(cmd, src, dst, regions) };
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.inner
                .handle
                .cmd_copy_buffer_to_image(cmd, src, dst, dst_layout, regions)
        };
    }

    fn cmd_copy_image_to_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Buffer,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.inner
                .handle
                .cmd_copy_image_to_buffer(cmd, src, src_layout, dst, regions)
        };
    }

    fn cmd_copy_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    ) {
        unsafe {
            self.inner
                .handle
                .cmd_copy_image(cmd, src, src_layout, dst, dst_layout, regions)
        };
    }

    fn queue_submit(
        &self,
        queue: vk::Queue,
        cmds: &[vk::CommandBuffer],
        fence: vk::Fence,
    ) -> VkResult<()> {
        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            p_next: std::ptr::null(),
            wait_semaphore_count: 0,
            p_wait_semaphores: std::ptr::null(),
            p_wait_dst_stage_mask: std::ptr::null(),
            command_buffer_count: cmds.len() as u32,
            p_command_buffers: cmds.as_ptr(),
            signal_semaphore_count: 0,
            p_signal_semaphores: std::ptr::null(),
        };
        unsafe {
            self.inner
                .handle
                .queue_submit(queue, slice::from_ref(&info), fence)
        }
    }

    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()> {
        unsafe { self.inner.handle.queue_wait_idle(queue) }
    }

    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VkResult<vk::Buffer> {
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            p_next: std::ptr::null(),
            flags: vk::BufferCreateFlags::empty(),
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_index_count: 0,
            p_queue_family_indices: std::ptr::null(),
        };
        unsafe { self.inner.handle.create_buffer(&info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.inner.handle.destroy_buffer(buffer, None) };
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.inner.handle.get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        unsafe { self.inner.handle.bind_buffer_memory(buffer, memory, offset) }
    }
}
