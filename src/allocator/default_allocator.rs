//! Contains a default allocator type based on the [`gpu_allocator`] crate that is good for most needs.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::vk::{DeviceMemory, DeviceSize, MemoryRequirements};
use gpu_allocator::vulkan as vk_alloc;
use gpu_allocator::vulkan::AllocationScheme;

use crate::allocator::memory_type::MemoryType;
use crate::allocator::traits;
use crate::{Allocator, Device, Error};

/// The default allocator. This calls into the `gpu_allocator` crate.
/// It's important to note that this allocator is `Clone`, `Send` and `Sync`. All its internal
/// state is safely wrapped inside an `Arc<Mutex<T>>`. This is to facilitate passing it around
/// everywhere.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct DefaultAllocator {
    #[derivative(Debug = "ignore")]
    alloc: Arc<Mutex<vk_alloc::Allocator>>,
}

/// Allocation returned from the default allocator. This allocation is automatically freed when it
/// is dropped, so it's not strictly necessary to call [`DefaultAllocator::free()`].
#[derive(Derivative)]
#[derivative(Default, Debug)]
pub struct Allocation {
    // These are wrapped in `Option`s so we can "move" out of them in `Drop`.
    // They are always Some(_)
    #[derivative(Debug = "ignore")]
    allocator: Option<DefaultAllocator>,
    allocation: Option<vk_alloc::Allocation>,
}

impl DefaultAllocator {
    /// Create a new default allocator.
    /// # Errors
    /// * May fail if creating the internal `gpu_allocator` fails.
    pub fn new(
        instance: &ash::Instance,
        device: &Device,
        physical_device: ash::vk::PhysicalDevice,
    ) -> Result<Self> {
        Ok(Self {
            alloc: Arc::new(Mutex::new(vk_alloc::Allocator::new(
                &vk_alloc::AllocatorCreateDesc {
                    instance: instance.clone(),
                    // SAFETY: The user passed in a valid Device reference.
                    device: unsafe { device.handle() },
                    physical_device,
                    debug_settings: Default::default(),
                    buffer_device_address: false,
                },
            )?)),
        })
    }

    fn free_impl(&mut self, allocation: &mut <Self as Allocator>::Allocation) -> Result<()> {
        let mut alloc = self.alloc.lock().map_err(|_| Error::PoisonError)?;
        match allocation.allocation.take() {
            None => {}
            Some(allocation) => {
                alloc.free(allocation)?;
            }
        }
        Ok(())
    }
}

impl Allocator for DefaultAllocator {
    type Allocation = Allocation;

    /// Allocates raw memory of a specific memory type. The given name is used for internal
    /// tracking and debug logging.
    fn allocate(
        &mut self,
        name: &'static str,
        requirements: &MemoryRequirements,
        ty: MemoryType,
    ) -> Result<Self::Allocation> {
        let mut alloc = self.alloc.lock().map_err(|_| Error::PoisonError)?;
        let allocation = alloc.allocate(&vk_alloc::AllocationCreateDesc {
            name,
            requirements: *requirements,
            location: gpu_allocator::MemoryLocation::from(ty),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        Ok(Allocation {
            allocator: Some(self.clone()),
            allocation: Some(allocation),
        })
    }

    /// Explicitly free memory owned by this allocator. This is generally not needed, since the
    /// implementation of [`Drop`] for [`Allocation`] already handles this.
    fn free(&mut self, mut allocation: Self::Allocation) -> Result<()> {
        self.free_impl(&mut allocation)
    }
}

impl traits::Allocation for Allocation {
    /// Get unsafe access to the underlying `VkDeviceMemory`. Should always be used together with
    /// [`Allocation::offset()`](traits::Allocation::offset()).
    /// # Safety
    /// The user must not free this memory or access a range outside of
    /// `allocation.offset()..allocation.offset() + size`.
    unsafe fn memory(&self) -> DeviceMemory {
        self.allocation.as_ref().unwrap().memory()
    }

    /// Get the offset in this `VkDeviceMemory` this allocation refers to. This is exposed because
    /// the allocator implementation may choose to subdivide large memory blocks into smaller
    /// allocations.
    fn offset(&self) -> DeviceSize {
        self.allocation.as_ref().unwrap().offset()
    }

    /// Obtain a mapped pointer to this allocation. Returns `None` if this memory was not mappable.
    /// Memory allocated with [`MemoryType::CpuToGpu`] is always mappable.
    fn mapped_ptr(&self) -> Option<NonNull<c_void>> {
        self.allocation.as_ref().unwrap().mapped_ptr()
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if self.allocation.is_some() {
            let mut allocator = self.allocator.clone().unwrap();
            let _ = allocator.free_impl(self);
        }
    }
}
