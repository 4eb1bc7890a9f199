//! The explicit command-buffer lifecycle machine.

use anyhow::Result;
use ash::vk;

use crate::{DeviceInterface, Error};

/// Lifecycle state of a command buffer, mirroring the states the native API defines.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandBufferState {
    /// Freshly allocated or reset. Ready for `begin()`.
    Initial,
    /// Between `begin()` and `end()`. Commands can be recorded.
    Recording,
    /// Recording finished. Ready to submit, or to `begin()` again.
    Executable,
    /// Referenced by an unresolved GPU submission. Nothing is legal until completion is observed.
    Pending,
    /// A recording error left the buffer contents undefined. Only `reset()` is legal.
    Invalid,
}

/// A single pooled command buffer with its lifecycle tag.
///
/// Obtained from [`ThreadPool::acquire`](crate::ThreadPool::acquire). The wrapper owns no device
/// reference; every transition takes the device so the type stays a plain value that can be moved
/// into a pending batch and released from another thread.
#[derive(Debug)]
pub struct ManagedCommandBuffer {
    handle: vk::CommandBuffer,
    state: CommandBufferState,
}

impl ManagedCommandBuffer {
    pub(crate) fn new(handle: vk::CommandBuffer) -> Self {
        Self {
            handle,
            state: CommandBufferState::Initial,
        }
    }

    /// Obtain the raw vulkan handle of the command buffer.
    /// # Safety
    /// Recording or submitting through this handle bypasses the state machine.
    pub unsafe fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    /// Start recording. Legal from `Initial` or `Executable` (re-recording implicitly resets,
    /// which the pool's native pools are created to allow).
    pub fn begin<D: DeviceInterface>(&mut self, device: &D) -> Result<()> {
        match self.state {
            CommandBufferState::Initial | CommandBufferState::Executable => {}
            state => return Err(Error::InvalidState(state).into()),
        }
        device
            .begin_command_buffer(self.handle)
            .map_err(Error::VkError)?;
        self.state = CommandBufferState::Recording;
        Ok(())
    }

    /// Finish recording. Legal only from `Recording`.
    pub fn end<D: DeviceInterface>(&mut self, device: &D) -> Result<()> {
        if self.state != CommandBufferState::Recording {
            return Err(Error::InvalidState(self.state).into());
        }
        device
            .end_command_buffer(self.handle)
            .map_err(Error::VkError)?;
        self.state = CommandBufferState::Executable;
        Ok(())
    }

    /// Reset the buffer back to `Initial`. Illegal while `Pending`: the GPU may still be reading
    /// the buffer, so the completion must be observed first.
    pub fn reset<D: DeviceInterface>(&mut self, device: &D) -> Result<()> {
        if self.state == CommandBufferState::Pending {
            return Err(Error::InvalidState(self.state).into());
        }
        device
            .reset_command_buffer(self.handle)
            .map_err(Error::VkError)?;
        self.state = CommandBufferState::Initial;
        Ok(())
    }

    /// Record commands through a closure, guaranteeing a balanced `begin`/`end` pair on every
    /// exit path. If the closure fails, recording is still ended (best effort) and the buffer is
    /// marked `Invalid` so it cannot be submitted with undefined contents.
    pub fn record<D, F>(&mut self, device: &D, f: F) -> Result<()>
    where
        D: DeviceInterface,
        F: FnOnce(&D, vk::CommandBuffer) -> Result<()>,
    {
        self.begin(device)?;
        match f(device, self.handle) {
            Ok(()) => self.end(device),
            Err(e) => {
                if let Err(end_err) = device.end_command_buffer(self.handle) {
                    warn!("Failed to end command buffer after recording error: {end_err}");
                }
                self.state = CommandBufferState::Invalid;
                Err(e)
            }
        }
    }

    /// Called by the transfer pipeline when the buffer is handed to a queue submission.
    pub(crate) fn mark_pending(&mut self) {
        debug_assert_eq!(self.state, CommandBufferState::Executable);
        self.state = CommandBufferState::Pending;
    }

    /// Called when a `poll()` or `wait_idle()` observed the submission's fence as signaled.
    pub(crate) fn mark_complete(&mut self) {
        if self.state == CommandBufferState::Pending {
            self.state = CommandBufferState::Executable;
        }
    }
}
