//! An ordered sequence of copy operations, immutable once submitted.

use ash::vk;

use crate::DeviceInterface;

#[derive(Debug, Clone)]
pub(crate) enum CopyOp {
    BufferToBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: Vec<vk::BufferCopy>,
    },
    BufferToImage {
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: Vec<vk::BufferImageCopy>,
    },
    ImageToBuffer {
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Buffer,
        regions: Vec<vk::BufferImageCopy>,
    },
    ImageToImage {
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: Vec<vk::ImageCopy>,
    },
}

pub(crate) type CleanupFn = Box<dyn FnOnce() + Send>;

/// A batch of copy operations to be submitted as one command buffer.
///
/// Operations are recorded in the order they were appended; encoding any producer/consumer
/// ordering between them is the caller's responsibility.
/// [`TransferPipeline::submit_batch`](crate::TransferPipeline::submit_batch) consumes the batch,
/// so appending to an already-submitted batch is not representable.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct TransferBatch {
    pub(crate) ops: Vec<CopyOp>,
    #[derivative(Debug = "ignore")]
    pub(crate) cleanup: Vec<CleanupFn>,
}

impl TransferBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer → buffer copy.
    pub fn add_buffer_copy(
        &mut self,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: Vec<vk::BufferCopy>,
    ) -> &mut Self {
        self.ops.push(CopyOp::BufferToBuffer {
            src,
            dst,
            regions,
        });
        self
    }

    /// Append a buffer → image copy. The image must be in `dst_layout` when the batch executes.
    pub fn add_buffer_to_image(
        &mut self,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: Vec<vk::BufferImageCopy>,
    ) -> &mut Self {
        self.ops.push(CopyOp::BufferToImage {
            src,
            dst,
            dst_layout,
            regions,
        });
        self
    }

    /// Append an image → buffer copy.
    pub fn add_image_to_buffer(
        &mut self,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Buffer,
        regions: Vec<vk::BufferImageCopy>,
    ) -> &mut Self {
        self.ops.push(CopyOp::ImageToBuffer {
            src,
            src_layout,
            dst,
            regions,
        });
        self
    }

    /// Append an image → image copy.
    pub fn add_image_copy(
        &mut self,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: Vec<vk::ImageCopy>,
    ) -> &mut Self {
        self.ops.push(CopyOp::ImageToImage {
            src,
            src_layout,
            dst,
            dst_layout,
            regions,
        });
        self
    }

    /// Attach a function to be called when the batch retires (its fence was observed signaled).
    /// Used to keep staging resources alive until the GPU is done reading them. If the batch is
    /// dropped without being submitted, the captured resources are simply dropped.
    pub fn with_cleanup(&mut self, f: impl FnOnce() + Send + 'static) -> &mut Self {
        self.cleanup.push(Box::new(f));
        self
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Record every operation, in order, into `cmd`.
    pub(crate) fn record<D: DeviceInterface>(&self, device: &D, cmd: vk::CommandBuffer) {
        for op in &self.ops {
            match op {
                CopyOp::BufferToBuffer {
                    src,
                    dst,
                    regions,
                } => device.cmd_copy_buffer(cmd, *src, *dst, regions),
                CopyOp::BufferToImage {
                    src,
                    dst,
                    dst_layout,
                    regions,
                } => device.cmd_copy_buffer_to_image(cmd, *src, *dst, *dst_layout, regions),
                CopyOp::ImageToBuffer {
                    src,
                    src_layout,
                    dst,
                    regions,
                } => device.cmd_copy_image_to_buffer(cmd, *src, *src_layout, *dst, regions),
                CopyOp::ImageToImage {
                    src,
                    src_layout,
                    dst,
                    dst_layout,
                    regions,
                } => device.cmd_copy_image(cmd, *src, *src_layout, *dst, *dst_layout, regions),
            }
        }
    }
}
