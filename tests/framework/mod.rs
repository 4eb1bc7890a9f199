//! Shared test framework: an in-memory device implementing [`DeviceInterface`] plus a
//! host-memory allocator, so pool and pipeline behavior is observable without a GPU.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;

use deimos::{
    Allocation, Allocator, DeviceInterface, FencePool, MemoryType, Queue, QueueCommandManager,
    QueueInfo, QueueType, TransferPipeline,
};

/// One copy command recorded into a mock command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedCopy {
    Buffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        bytes: vk::DeviceSize,
    },
    BufferToImage {
        src: vk::Buffer,
        dst: vk::Image,
    },
    ImageToBuffer {
        src: vk::Image,
        dst: vk::Buffer,
    },
    Image {
        src: vk::Image,
        dst: vk::Image,
    },
}

#[derive(Debug, Clone)]
pub struct MockSubmit {
    pub queue: vk::Queue,
    pub cmds: Vec<vk::CommandBuffer>,
    pub fence: vk::Fence,
}

#[derive(Debug, Default)]
struct MockState {
    next_raw: u64,
    // fence raw handle -> signaled
    fences: HashMap<u64, bool>,
    fence_creates: usize,
    fence_destroys: usize,
    // semaphore raw handle -> timeline value (None for binary semaphores)
    semaphores: HashMap<u64, Option<u64>>,
    semaphore_creates: usize,
    semaphore_destroys: usize,
    // command pool raw handle -> buffers allocated from it
    pools: HashMap<u64, Vec<u64>>,
    recording: HashMap<u64, bool>,
    recorded: HashMap<u64, Vec<RecordedCopy>>,
    // buffer raw handle -> (size, usage)
    buffers: HashMap<u64, (vk::DeviceSize, vk::BufferUsageFlags)>,
    buffer_creates: usize,
    buffer_destroys: usize,
    submits: Vec<MockSubmit>,
    wait_idle_calls: usize,
    fail_next_submit: bool,
    double_destroys: usize,
}

/// A [`DeviceInterface`] backed by plain host state. Handles are generated from a counter;
/// fences are signaled explicitly by the test (or by `queue_wait_idle`, which drains everything).
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn fresh_raw(state: &mut MockState) -> u64 {
        state.next_raw += 1;
        state.next_raw
    }

    /// Simulate the GPU signaling a fence.
    pub fn signal_fence(&self, fence: vk::Fence) {
        self.with(|state| {
            state.fences.insert(fence.as_raw(), true);
        })
    }

    /// Signal the fence of every submission made so far.
    pub fn complete_submits(&self) {
        self.with(|state| {
            let fences: Vec<u64> = state.submits.iter().map(|s| s.fence.as_raw()).collect();
            for fence in fences {
                state.fences.insert(fence, true);
            }
        })
    }

    /// Make the next `queue_submit` fail with `ERROR_DEVICE_LOST`.
    pub fn fail_next_submit(&self) {
        self.with(|state| state.fail_next_submit = true)
    }

    pub fn fence_is_signaled(&self, fence: vk::Fence) -> bool {
        self.with(|state| state.fences.get(&fence.as_raw()).copied().unwrap_or(false))
    }

    pub fn fence_create_count(&self) -> usize {
        self.with(|state| state.fence_creates)
    }

    pub fn fence_destroy_count(&self) -> usize {
        self.with(|state| state.fence_destroys)
    }

    pub fn live_fence_count(&self) -> usize {
        self.with(|state| state.fences.len())
    }

    pub fn semaphore_create_count(&self) -> usize {
        self.with(|state| state.semaphore_creates)
    }

    pub fn live_semaphore_count(&self) -> usize {
        self.with(|state| state.semaphores.len())
    }

    /// Destroy calls that hit an already-destroyed or unknown handle.
    pub fn double_destroy_count(&self) -> usize {
        self.with(|state| state.double_destroys)
    }

    pub fn submit_count(&self) -> usize {
        self.with(|state| state.submits.len())
    }

    pub fn submits(&self) -> Vec<MockSubmit> {
        self.with(|state| state.submits.clone())
    }

    pub fn wait_idle_count(&self) -> usize {
        self.with(|state| state.wait_idle_calls)
    }

    pub fn recorded_ops(&self, cmd: vk::CommandBuffer) -> Vec<RecordedCopy> {
        self.with(|state| state.recorded.get(&cmd.as_raw()).cloned().unwrap_or_default())
    }

    pub fn live_buffer_count(&self) -> usize {
        self.with(|state| state.buffers.len())
    }

    pub fn buffer_create_count(&self) -> usize {
        self.with(|state| state.buffer_creates)
    }

    pub fn buffer_usage(&self, buffer: vk::Buffer) -> Option<vk::BufferUsageFlags> {
        self.with(|state| state.buffers.get(&buffer.as_raw()).map(|(_, usage)| *usage))
    }
}

impl DeviceInterface for MockDevice {
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        self.with(|state| {
            let raw = Self::fresh_raw(state);
            state.fences.insert(raw, signaled);
            state.fence_creates += 1;
            Ok(vk::Fence::from_raw(raw))
        })
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.with(|state| {
            if state.fences.remove(&fence.as_raw()).is_some() {
                state.fence_destroys += 1;
            } else {
                state.double_destroys += 1;
            }
        })
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.with(|state| {
            state.fences.insert(fence.as_raw(), false);
            Ok(())
        })
    }

    fn fence_status(&self, fence: vk::Fence) -> VkResult<bool> {
        self.with(|state| Ok(state.fences.get(&fence.as_raw()).copied().unwrap_or(false)))
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        // The mock never blocks: an unsignaled fence reports a timeout immediately.
        self.with(|state| {
            if state.fences.get(&fence.as_raw()).copied().unwrap_or(false) {
                Ok(())
            } else {
                Err(vk::Result::TIMEOUT)
            }
        })
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.with(|state| {
            let raw = Self::fresh_raw(state);
            state.semaphores.insert(raw, None);
            state.semaphore_creates += 1;
            Ok(vk::Semaphore::from_raw(raw))
        })
    }

    fn create_timeline_semaphore(&self, initial_value: u64) -> VkResult<vk::Semaphore> {
        self.with(|state| {
            let raw = Self::fresh_raw(state);
            state.semaphores.insert(raw, Some(initial_value));
            state.semaphore_creates += 1;
            Ok(vk::Semaphore::from_raw(raw))
        })
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.with(|state| {
            if state.semaphores.remove(&semaphore.as_raw()).is_some() {
                state.semaphore_destroys += 1;
            } else {
                state.double_destroys += 1;
            }
        })
    }

    fn signal_semaphore(&self, semaphore: vk::Semaphore, value: u64) -> VkResult<()> {
        self.with(|state| match state.semaphores.get_mut(&semaphore.as_raw()) {
            Some(Some(current)) => {
                *current = (*current).max(value);
                Ok(())
            }
            _ => Err(vk::Result::ERROR_UNKNOWN),
        })
    }

    fn wait_semaphore(&self, semaphore: vk::Semaphore, value: u64, _timeout: u64) -> VkResult<()> {
        self.with(
            |state| match state.semaphores.get(&semaphore.as_raw()).copied().flatten() {
                Some(current) if current >= value => Ok(()),
                Some(_) => Err(vk::Result::TIMEOUT),
                None => Err(vk::Result::ERROR_UNKNOWN),
            },
        )
    }

    fn semaphore_value(&self, semaphore: vk::Semaphore) -> VkResult<u64> {
        self.with(|state| {
            Ok(state
                .semaphores
                .get(&semaphore.as_raw())
                .copied()
                .flatten()
                .unwrap_or(0))
        })
    }

    fn create_command_pool(&self, _family_index: u32) -> VkResult<vk::CommandPool> {
        self.with(|state| {
            let raw = Self::fresh_raw(state);
            state.pools.insert(raw, vec![]);
            Ok(vk::CommandPool::from_raw(raw))
        })
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.with(|state| {
            if let Some(buffers) = state.pools.remove(&pool.as_raw()) {
                for cmd in buffers {
                    state.recording.remove(&cmd);
                    state.recorded.remove(&cmd);
                }
            } else {
                state.double_destroys += 1;
            }
        })
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()> {
        self.with(|state| {
            let buffers = state.pools.get(&pool.as_raw()).cloned().unwrap_or_default();
            for cmd in buffers {
                state.recording.insert(cmd, false);
                state.recorded.insert(cmd, vec![]);
            }
            Ok(())
        })
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        self.with(|state| {
            let raw = Self::fresh_raw(state);
            state
                .pools
                .get_mut(&pool.as_raw())
                .ok_or(vk::Result::ERROR_UNKNOWN)?
                .push(raw);
            state.recording.insert(raw, false);
            state.recorded.insert(raw, vec![]);
            Ok(vk::CommandBuffer::from_raw(raw))
        })
    }

    fn free_command_buffer(&self, pool: vk::CommandPool, cmd: vk::CommandBuffer) {
        self.with(|state| {
            if let Some(buffers) = state.pools.get_mut(&pool.as_raw()) {
                buffers.retain(|&raw| raw != cmd.as_raw());
            }
            state.recording.remove(&cmd.as_raw());
            state.recorded.remove(&cmd.as_raw());
        })
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        self.with(|state| {
            // The pools are created resettable, so beginning an executable buffer implicitly
            // resets it.
            state.recording.insert(cmd.as_raw(), true);
            state.recorded.insert(cmd.as_raw(), vec![]);
            Ok(())
        })
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        self.with(|state| {
            state.recording.insert(cmd.as_raw(), false);
            Ok(())
        })
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        self.with(|state| {
            state.recording.insert(cmd.as_raw(), false);
            state.recorded.insert(cmd.as_raw(), vec![]);
            Ok(())
        })
    }

    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        let bytes = regions.iter().map(|r| r.size).sum();
        self.with(|state| {
            state
                .recorded
                .entry(cmd.as_raw())
                .or_default()
                .push(RecordedCopy::Buffer {
                    src,
                    dst,
                    bytes,
                });
        })
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        _dst_layout: vk::ImageLayout,
        _regions: &[vk::BufferImageCopy],
    ) {
        self.with(|state| {
            state
                .recorded
                .entry(cmd.as_raw())
                .or_default()
                .push(RecordedCopy::BufferToImage {
                    src,
                    dst,
                });
        })
    }

    fn cmd_copy_image_to_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        _src_layout: vk::ImageLayout,
        dst: vk::Buffer,
        _regions: &[vk::BufferImageCopy],
    ) {
        self.with(|state| {
            state
                .recorded
                .entry(cmd.as_raw())
                .or_default()
                .push(RecordedCopy::ImageToBuffer {
                    src,
                    dst,
                });
        })
    }

    fn cmd_copy_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        _src_layout: vk::ImageLayout,
        dst: vk::Image,
        _dst_layout: vk::ImageLayout,
        _regions: &[vk::ImageCopy],
    ) {
        self.with(|state| {
            state
                .recorded
                .entry(cmd.as_raw())
                .or_default()
                .push(RecordedCopy::Image {
                    src,
                    dst,
                });
        })
    }

    fn queue_submit(
        &self,
        queue: vk::Queue,
        cmds: &[vk::CommandBuffer],
        fence: vk::Fence,
    ) -> VkResult<()> {
        self.with(|state| {
            if state.fail_next_submit {
                state.fail_next_submit = false;
                return Err(vk::Result::ERROR_DEVICE_LOST);
            }
            state.submits.push(MockSubmit {
                queue,
                cmds: cmds.to_vec(),
                fence,
            });
            Ok(())
        })
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VkResult<()> {
        self.with(|state| {
            state.wait_idle_calls += 1;
            let fences: Vec<u64> = state.submits.iter().map(|s| s.fence.as_raw()).collect();
            for fence in fences {
                state.fences.insert(fence, true);
            }
            Ok(())
        })
    }

    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VkResult<vk::Buffer> {
        self.with(|state| {
            let raw = Self::fresh_raw(state);
            state.buffers.insert(raw, (size, usage));
            state.buffer_creates += 1;
            Ok(vk::Buffer::from_raw(raw))
        })
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.with(|state| {
            if state.buffers.remove(&buffer.as_raw()).is_some() {
                state.buffer_destroys += 1;
            } else {
                state.double_destroys += 1;
            }
        })
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        self.with(|state| {
            let size = state
                .buffers
                .get(&buffer.as_raw())
                .map(|(size, _)| *size)
                .unwrap_or(0);
            vk::MemoryRequirements {
                size,
                alignment: 16,
                memory_type_bits: u32::MAX,
            }
        })
    }

    fn bind_buffer_memory(
        &self,
        _buffer: vk::Buffer,
        _memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        Ok(())
    }
}

/// Host-memory allocation with a real mappable pointer, so staged uploads can write through it.
#[derive(Debug, Default)]
pub struct MockAllocation {
    bytes: Vec<u8>,
    live: Option<Arc<Mutex<usize>>>,
}

impl Allocation for MockAllocation {
    unsafe fn memory(&self) -> vk::DeviceMemory {
        vk::DeviceMemory::from_raw(0xCAFE)
    }

    fn offset(&self) -> vk::DeviceSize {
        0
    }

    fn mapped_ptr(&self) -> Option<NonNull<c_void>> {
        if self.bytes.is_empty() {
            None
        } else {
            NonNull::new(self.bytes.as_ptr() as *mut c_void)
        }
    }
}

impl Drop for MockAllocation {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            *live.lock().unwrap() -= 1;
        }
    }
}

/// Allocator handing out [`MockAllocation`]s and counting how many are alive.
#[derive(Debug, Clone, Default)]
pub struct MockAllocator {
    live: Arc<Mutex<usize>>,
}

impl MockAllocator {
    pub fn live_allocations(&self) -> usize {
        *self.live.lock().unwrap()
    }
}

impl Allocator for MockAllocator {
    type Allocation = MockAllocation;

    fn allocate(
        &mut self,
        _name: &'static str,
        requirements: &vk::MemoryRequirements,
        _ty: MemoryType,
    ) -> Result<Self::Allocation> {
        *self.live.lock().unwrap() += 1;
        Ok(MockAllocation {
            bytes: vec![0u8; requirements.size as usize],
            live: Some(self.live.clone()),
        })
    }

    fn free(&mut self, allocation: Self::Allocation) -> Result<()> {
        drop(allocation);
        Ok(())
    }
}

pub fn transfer_queue() -> Queue {
    Queue::new(
        vk::Queue::from_raw(0x7),
        QueueInfo {
            queue_type: QueueType::Transfer,
            dedicated: true,
            family_index: 1,
            flags: vk::QueueFlags::TRANSFER,
        },
    )
}

/// Everything a transfer-pipeline test needs, with shared handles so pool state stays observable.
pub struct Context {
    pub device: MockDevice,
    pub allocator: MockAllocator,
    pub commands: QueueCommandManager<MockDevice>,
    pub fences: FencePool<MockDevice>,
    pub transfer: TransferPipeline<MockDevice, MockAllocator>,
}

pub fn make_transfer_context() -> Context {
    // Surface pool warnings (untracked releases, leaked in-use objects) in test output.
    let _ = pretty_env_logger::try_init();
    let device = MockDevice::new();
    let allocator = MockAllocator::default();
    let commands = QueueCommandManager::new(device.clone(), &transfer_queue());
    let fences = FencePool::new(device.clone());
    let transfer = TransferPipeline::new(
        device.clone(),
        allocator.clone(),
        commands.clone(),
        fences.clone(),
    );
    Context {
        device,
        allocator,
        commands,
        fences,
        transfer,
    }
}
