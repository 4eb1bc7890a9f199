//! The transfer pipeline: batched copy submission and reclamation of pooled resources.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::vk;

use crate::command_buffer::manager::QueueCommandManager;
use crate::command_buffer::state::ManagedCommandBuffer;
use crate::command_buffer::thread_pool::ThreadPool;
use crate::sync::fence_pool::FencePool;
use crate::transfer::batch::{CleanupFn, TransferBatch};
use crate::transfer::staging::StagingBuffer;
use crate::{Allocator, DeviceInterface, Error};

#[derive(Derivative)]
#[derivative(Debug)]
struct PendingBatch<D: DeviceInterface> {
    cmd: ManagedCommandBuffer,
    /// The thread pool the command buffer was acquired from. Kept here so a `poll()` running on
    /// any thread can return the buffer to the right pool; the pool's mutex is the
    /// re-synchronization point.
    pool: Arc<Mutex<ThreadPool<D>>>,
    fence: vk::Fence,
    #[derivative(Debug = "ignore")]
    cleanup: Vec<CleanupFn>,
    ops: usize,
}

/// Record of a batch whose completion has been observed.
#[derive(Debug, Copy, Clone)]
pub struct RetiredBatch {
    ops: usize,
}

impl RetiredBatch {
    /// Number of copy operations the batch carried.
    pub fn op_count(&self) -> usize {
        self.ops
    }
}

#[derive(Debug)]
struct PipelineState<D: DeviceInterface> {
    pending: Vec<PendingBatch<D>>,
    completed: Vec<RetiredBatch>,
}

/// Submits [`TransferBatch`]es to a transfer queue and reclaims the command buffer and fence of
/// each once the GPU signals completion.
///
/// Command buffers come from the submitting thread's pool in `commands`; fences come from the
/// shared `fences` pool (typically the one owned by a
/// [`SyncManager`](crate::SyncManager)). [`poll`](Self::poll) is non-blocking and safe to call
/// every frame; [`wait_idle`](Self::wait_idle) blocks until the whole queue drained.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TransferPipeline<D: DeviceInterface, A: Allocator> {
    device: D,
    #[derivative(Debug = "ignore")]
    allocator: A,
    commands: QueueCommandManager<D>,
    fences: FencePool<D>,
    state: Mutex<PipelineState<D>>,
}

impl<D: DeviceInterface, A: Allocator + 'static> TransferPipeline<D, A> {
    /// Create a pipeline over the given transfer-queue command manager and fence pool. Both are
    /// clone-shared handles, so they can simultaneously serve the rest of the application.
    pub fn new(
        device: D,
        allocator: A,
        commands: QueueCommandManager<D>,
        fences: FencePool<D>,
    ) -> Self {
        Self {
            device,
            allocator,
            commands,
            fences,
            state: Mutex::new(PipelineState {
                pending: vec![],
                completed: vec![],
            }),
        }
    }

    /// Returns an empty, mutable batch.
    pub fn create_batch(&self) -> TransferBatch {
        TransferBatch::new()
    }

    /// Submit a batch to the transfer queue. A no-op for an empty batch (attached staging
    /// resources are reclaimed immediately since no GPU work references them).
    ///
    /// On success the batch is tracked as pending until a [`poll`](Self::poll) or
    /// [`wait_idle`](Self::wait_idle) observes its fence. If the native submit call fails, the
    /// acquired command buffer and fence are returned to their pools before the error surfaces;
    /// no manual recovery is needed.
    pub fn submit_batch(&self, batch: TransferBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let pool = self.commands.thread_pool()?;
        let mut cmd = {
            let mut pool = pool.lock().map_err(|_| Error::PoisonError)?;
            pool.acquire()?
        };

        if let Err(e) = cmd.record(&self.device, |device, handle| {
            batch.record(device, handle);
            Ok(())
        }) {
            self.return_to_pool(&pool, cmd);
            return Err(e);
        }

        let fence = match self.fences.acquire(false) {
            Ok(fence) => fence,
            Err(e) => {
                self.return_to_pool(&pool, cmd);
                return Err(e);
            }
        };

        let handle = unsafe { cmd.handle() };
        match self
            .device
            .queue_submit(self.commands.queue(), std::slice::from_ref(&handle), fence)
        {
            Ok(()) => {
                cmd.mark_pending();
                let TransferBatch {
                    ops,
                    cleanup,
                } = batch;
                let mut state = self.state.lock().map_err(|_| Error::PoisonError)?;
                state.pending.push(PendingBatch {
                    cmd,
                    pool,
                    fence,
                    cleanup,
                    ops: ops.len(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Transfer submit failed ({e}), returning command buffer and fence to their pools");
                if let Err(release_err) = self.fences.release(fence) {
                    error!("Failed to recover fence after failed submit: {release_err}");
                }
                self.return_to_pool(&pool, cmd);
                Err(Error::SubmissionFailed(e).into())
            }
        }
    }

    /// Non-blocking: query every pending batch's fence and retire the signaled ones, releasing
    /// their fence and command buffer back to their pools. Batches whose fence is not yet
    /// signaled are left untouched and re-checked on the next call. Returns the number of
    /// batches retired.
    pub fn poll(&self) -> Result<usize> {
        let mut state = self.state.lock().map_err(|_| Error::PoisonError)?;
        let mut retired = 0;
        let mut index = 0;
        while index < state.pending.len() {
            let signaled = self
                .device
                .fence_status(state.pending[index].fence)
                .map_err(Error::VkError)?;
            if signaled {
                let batch = state.pending.remove(index);
                self.retire(batch, &mut state.completed)?;
                retired += 1;
            } else {
                index += 1;
            }
        }
        Ok(retired)
    }

    /// Blocking: wait for the entire transfer queue to go idle, then retire every pending batch
    /// in one sweep. Use when an upload must be guaranteed complete before proceeding.
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .queue_wait_idle(self.commands.queue())
            .map_err(Error::VkError)?;
        let mut state = self.state.lock().map_err(|_| Error::PoisonError)?;
        let pending = std::mem::take(&mut state.pending);
        for batch in pending {
            self.retire(batch, &mut state.completed)?;
        }
        Ok(())
    }

    /// Write `data` into a staging allocation and submit a one-operation batch copying it into
    /// `dst` at `dst_offset`. Does not wait for completion: call [`poll`](Self::poll) or
    /// [`wait_idle`](Self::wait_idle) before consuming the destination.
    pub fn upload_buffer<T: Copy>(
        &self,
        data: &[T],
        dst: vk::Buffer,
        dst_offset: vk::DeviceSize,
    ) -> Result<()> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;
        if size == 0 {
            return Ok(());
        }
        let staging = self.make_staging(data, size)?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset,
            size,
        };
        let mut batch = self.create_batch();
        batch.add_buffer_copy(unsafe { staging.handle() }, dst, vec![region]);
        batch.with_cleanup(move || drop(staging));
        self.submit_batch(batch)
    }

    /// Write `data` into a staging allocation and submit a one-operation batch copying it into
    /// `dst`, which must be in `dst_layout` on the transfer queue. The copy covers `extent` of
    /// the given subresource, tightly packed. Does not wait for completion.
    pub fn upload_image<T: Copy>(
        &self,
        data: &[T],
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        extent: vk::Extent3D,
        subresource: vk::ImageSubresourceLayers,
    ) -> Result<()> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;
        if size == 0 {
            return Ok(());
        }
        let staging = self.make_staging(data, size)?;
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: subresource,
            image_offset: vk::Offset3D::default(),
            image_extent: extent,
        };
        let mut batch = self.create_batch();
        batch.add_buffer_to_image(unsafe { staging.handle() }, dst, dst_layout, vec![region]);
        batch.with_cleanup(move || drop(staging));
        self.submit_batch(batch)
    }

    /// Number of batches submitted but not yet observed complete.
    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Number of retired batches not yet drained with [`take_completed`](Self::take_completed).
    pub fn completed_count(&self) -> usize {
        self.state.lock().unwrap().completed.len()
    }

    /// Drain and return the records of every retired batch.
    pub fn take_completed(&self) -> Vec<RetiredBatch> {
        std::mem::take(&mut self.state.lock().unwrap().completed)
    }

    fn make_staging(
        &self,
        data: &[impl Copy],
        size: vk::DeviceSize,
    ) -> Result<StagingBuffer<D, A>> {
        let mut allocator = self.allocator.clone();
        let mut staging = StagingBuffer::new(self.device.clone(), &mut allocator, size)?;
        staging.write(data)?;
        Ok(staging)
    }

    /// Release one batch's resources and record it as completed. The fence goes back first so a
    /// pool-release failure cannot leak it.
    fn retire(&self, batch: PendingBatch<D>, completed: &mut Vec<RetiredBatch>) -> Result<()> {
        let PendingBatch {
            mut cmd,
            pool,
            fence,
            cleanup,
            ops,
        } = batch;
        self.fences.release(fence)?;
        cmd.mark_complete();
        {
            let mut pool = pool.lock().map_err(|_| Error::PoisonError)?;
            pool.release(cmd)?;
        }
        for f in cleanup {
            f();
        }
        completed.push(RetiredBatch {
            ops,
        });
        Ok(())
    }

    /// Best-effort return of a command buffer whose submission never became pending.
    fn return_to_pool(&self, pool: &Arc<Mutex<ThreadPool<D>>>, cmd: ManagedCommandBuffer) {
        match pool.lock() {
            Ok(mut pool) => {
                if let Err(e) = pool.release(cmd) {
                    error!("Failed to return command buffer to its pool: {e}");
                }
            }
            Err(_) => error!("Thread pool mutex poisoned while recovering a command buffer"),
        }
    }
}
