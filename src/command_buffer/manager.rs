//! Multiplexes per-thread command pools over queues and queue roles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use anyhow::Result;

use ash::vk;

use crate::command_buffer::state::ManagedCommandBuffer;
use crate::command_buffer::thread_pool::ThreadPool;
use crate::core::queue::{Queue, QueueInfo, QueueType};
use crate::{DeviceInterface, Error};

#[derive(Derivative)]
#[derivative(Debug)]
struct QueueCommandManagerInner<D: DeviceInterface> {
    device: D,
    queue: vk::Queue,
    info: QueueInfo,
    #[derivative(Debug = "ignore")]
    pools: Mutex<HashMap<ThreadId, Arc<Mutex<ThreadPool<D>>>>>,
}

/// Hands every calling thread its own [`ThreadPool`] for one queue.
///
/// The internal mutex is scoped to map lookup/insert only. Once a thread has obtained its pool,
/// recording on it involves no contended locking; the pool's own mutex exists so that a
/// `poll()` running on another thread can return completed buffers, and is uncontended otherwise.
#[derive(Debug)]
pub struct QueueCommandManager<D: DeviceInterface> {
    inner: Arc<QueueCommandManagerInner<D>>,
}

impl<D: DeviceInterface> Clone for QueueCommandManager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: DeviceInterface> QueueCommandManager<D> {
    pub fn new(device: D, queue: &Queue) -> Self {
        Self {
            inner: Arc::new(QueueCommandManagerInner {
                device,
                queue: unsafe { queue.handle() },
                info: *queue.info(),
                pools: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Look up the calling thread's pool, creating it on first request.
    pub fn thread_pool(&self) -> Result<Arc<Mutex<ThreadPool<D>>>> {
        let id = std::thread::current().id();
        let mut pools = self.inner.pools.lock().map_err(|_| Error::PoisonError)?;
        if let Some(pool) = pools.get(&id) {
            return Ok(pool.clone());
        }
        let pool = Arc::new(Mutex::new(ThreadPool::new(
            self.inner.device.clone(),
            self.inner.info.family_index,
        )?));
        pools.insert(id, pool.clone());
        Ok(pool)
    }

    /// Acquire a command buffer from the calling thread's pool.
    pub fn acquire(&self) -> Result<ManagedCommandBuffer> {
        let pool = self.thread_pool()?;
        let mut pool = pool.lock().map_err(|_| Error::PoisonError)?;
        pool.acquire()
    }

    /// Return a command buffer to the calling thread's pool. Buffers must be released on the
    /// thread that acquired them; a buffer from another thread's pool fails with
    /// [`Error::HandleNotFound`].
    pub fn release(&self, cmd: ManagedCommandBuffer) -> Result<()> {
        let pool = self.thread_pool()?;
        let mut pool = pool.lock().map_err(|_| Error::PoisonError)?;
        pool.release(cmd)
    }

    /// Bulk-reset every thread's pool. See [`ThreadPool::reset_all`].
    pub fn reset_all(&self) -> Result<()> {
        let pools = self.inner.pools.lock().map_err(|_| Error::PoisonError)?;
        for pool in pools.values() {
            pool.lock().map_err(|_| Error::PoisonError)?.reset_all()?;
        }
        Ok(())
    }

    /// Number of per-thread pools created so far. Useful for leak diagnostics.
    pub fn thread_pool_count(&self) -> usize {
        self.inner.pools.lock().unwrap().len()
    }

    pub fn info(&self) -> &QueueInfo {
        &self.inner.info
    }

    pub(crate) fn queue(&self) -> vk::Queue {
        self.inner.queue
    }
}

/// Maps a logical queue role to its [`QueueCommandManager`]. Requesting a role with no backing
/// queue fails with [`Error::NoCapableQueue`].
#[derive(Debug)]
pub struct CommandManager<D: DeviceInterface> {
    managers: HashMap<QueueType, QueueCommandManager<D>>,
}

impl<D: DeviceInterface> CommandManager<D> {
    /// Create a manager for the given queues. The first queue of each type wins; duplicate roles
    /// are ignored.
    pub fn new(device: D, queues: &[Queue]) -> Self {
        let mut managers = HashMap::new();
        for queue in queues {
            let info = queue.info();
            managers.entry(info.queue_type).or_insert_with(|| {
                info!(
                    "Queue role {:?} backed by family {} (dedicated: {})",
                    info.queue_type, info.family_index, info.dedicated
                );
                QueueCommandManager::new(device.clone(), queue)
            });
        }
        Self {
            managers,
        }
    }

    /// Obtain the per-queue manager for a role.
    pub fn queue_manager(&self, ty: QueueType) -> Result<&QueueCommandManager<D>> {
        self.managers
            .get(&ty)
            .ok_or_else(|| Error::NoCapableQueue.into())
    }

    /// Acquire a command buffer for the given role from the calling thread's pool.
    pub fn allocate(&self, ty: QueueType) -> Result<ManagedCommandBuffer> {
        self.queue_manager(ty)?.acquire()
    }

    pub fn allocate_graphics(&self) -> Result<ManagedCommandBuffer> {
        self.allocate(QueueType::Graphics)
    }

    pub fn allocate_compute(&self) -> Result<ManagedCommandBuffer> {
        self.allocate(QueueType::Compute)
    }

    pub fn allocate_transfer(&self) -> Result<ManagedCommandBuffer> {
        self.allocate(QueueType::Transfer)
    }

    /// Return a command buffer to the calling thread's pool for the given role.
    pub fn release(&self, ty: QueueType, cmd: ManagedCommandBuffer) -> Result<()> {
        self.queue_manager(ty)?.release(cmd)
    }
}
