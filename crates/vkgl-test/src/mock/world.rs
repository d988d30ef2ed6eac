//! Shared state behind the mock driver and the mock GL backend.
//!
//! Models physical memory as byte blocks that Vulkan allocations and GL
//! memory objects both reference, so a write through one API is visible
//! through the other exactly when they alias the same block.

use std::collections::HashMap;
#[cfg(unix)]
use std::io::{ErrorKind, Read};
#[cfg(unix)]
use std::os::fd::OwnedFd;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use ash::vk;
use parking_lot::{Mutex, MutexGuard};
use vkgl_core::{Extent2D, HandleType, PixelFormat};

/// Driver and GL calls with a visible effect, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockEvent {
    CreateInstance,
    DestroyInstance,
    CreateDevice,
    DestroyDevice,
    CreateImage,
    DestroyImage,
    AllocateMemory,
    FreeMemory,
    BindMemory,
    ExportHandle,
    Upload,
    CreateTexture,
    CreateMemoryObject,
    ImportMemory,
    DeleteTexture,
    DeleteMemoryObject,
    /// The GL side closed a native handle it took ownership of.
    ReleaseHandle,
}

impl MockEvent {
    /// Events that release an object.
    pub const fn is_teardown(self) -> bool {
        matches!(
            self,
            Self::DestroyInstance
                | Self::DestroyDevice
                | Self::DestroyImage
                | Self::FreeMemory
                | Self::DeleteTexture
                | Self::DeleteMemoryObject
                | Self::ReleaseHandle
        )
    }
}

#[derive(Debug)]
pub(crate) struct MockImage {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub export: Option<HandleType>,
    pub memory: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct MockMemory {
    pub export: Option<HandleType>,
    pub block: u64,
}

#[derive(Debug)]
pub(crate) struct Block {
    pub bytes: Vec<u8>,
    pub refs: usize,
}

/// A descriptor handed out by the exporter and not yet imported.
///
/// The exporter keeps the peer end of the socket pair so it can tell when the
/// handle side has been closed.
#[cfg(unix)]
#[derive(Debug)]
pub(crate) struct ExportedFd {
    pub block: u64,
    pub peer: UnixStream,
}

#[cfg(unix)]
impl ExportedFd {
    fn is_open(&self) -> bool {
        let mut byte = [0u8; 1];
        // Nothing is ever written, so a non-blocking read either would block
        // (peer open) or reports end of stream (peer closed).
        matches!((&self.peer).read(&mut byte), Err(e) if e.kind() == ErrorKind::WouldBlock)
    }
}

#[derive(Debug)]
pub(crate) struct MockTexture {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub block: Option<u64>,
    /// Source component for each of red, green, blue and alpha when sampled.
    pub swizzle: Option<[u32; 4]>,
}

#[derive(Debug, Default)]
pub(crate) struct MockMemoryObject {
    pub dedicated: bool,
    pub block: Option<u64>,
    #[cfg(unix)]
    pub fd: Option<OwnedFd>,
}

#[derive(Debug, Default)]
pub(crate) struct WorldState {
    next_id: u64,
    pub instances: usize,
    pub devices: usize,
    pub images: HashMap<u64, MockImage>,
    pub memories: HashMap<u64, MockMemory>,
    pub blocks: HashMap<u64, Block>,
    /// Raw fd numbers handed out by the exporter and the block they reference.
    #[cfg(unix)]
    pub exported_fds: HashMap<i32, ExportedFd>,
    pub textures: HashMap<u32, MockTexture>,
    pub memory_objects: HashMap<u32, MockMemoryObject>,
    pub events: Vec<MockEvent>,
}

impl WorldState {
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn next_gl_name(&mut self) -> u32 {
        // GL names are small positive integers; the mock never wraps.
        u32::try_from(self.next_id()).unwrap_or(u32::MAX)
    }

    pub fn record(&mut self, event: MockEvent) {
        self.events.push(event);
    }

    pub fn new_block(&mut self, size: usize) -> u64 {
        let id = self.next_id();
        self.blocks.insert(
            id,
            Block {
                bytes: vec![0; size],
                refs: 1,
            },
        );
        id
    }

    /// Forget exported descriptors whose handle was closed without an import.
    pub fn prune_exports(&mut self) {
        #[cfg(unix)]
        self.exported_fds.retain(|_, exported| exported.is_open());
    }

    #[cfg(unix)]
    fn open_exports(&self) -> usize {
        self.exported_fds.len()
    }

    #[cfg(not(unix))]
    fn open_exports(&self) -> usize {
        0
    }

    pub fn retain_block(&mut self, id: u64) {
        if let Some(block) = self.blocks.get_mut(&id) {
            block.refs += 1;
        }
    }

    pub fn release_block(&mut self, id: u64) {
        if let Some(block) = self.blocks.get_mut(&id) {
            block.refs -= 1;
            if block.refs == 0 {
                self.blocks.remove(&id);
            }
        }
    }
}

/// Number of objects currently alive in the mock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveCounts {
    pub instances: usize,
    pub devices: usize,
    pub images: usize,
    pub memories: usize,
    pub textures: usize,
    pub memory_objects: usize,
    /// Byte blocks still referenced by either API.
    pub blocks: usize,
    /// Exported handles still open and not yet imported.
    pub exported_handles: usize,
}

impl LiveCounts {
    pub fn total(&self) -> usize {
        self.instances
            + self.devices
            + self.images
            + self.memories
            + self.textures
            + self.memory_objects
            + self.blocks
            + self.exported_handles
    }
}

/// Handle to the shared mock state. Cloning shares it.
#[derive(Debug, Clone, Default)]
pub struct MockWorld {
    state: Arc<Mutex<WorldState>>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock()
    }

    /// Every event recorded so far.
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    /// Only the events that release objects, in order.
    pub fn teardown_events(&self) -> Vec<MockEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.is_teardown())
            .collect()
    }

    /// Forget recorded events.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    pub fn live(&self) -> LiveCounts {
        let mut state = self.state.lock();
        state.prune_exports();
        LiveCounts {
            instances: state.instances,
            devices: state.devices,
            images: state.images.len(),
            memories: state.memories.len(),
            textures: state.textures.len(),
            memory_objects: state.memory_objects.len(),
            blocks: state.blocks.len(),
            exported_handles: state.open_exports(),
        }
    }

    /// Memory objects created with the dedicated flag set.
    pub fn dedicated_memory_objects(&self) -> usize {
        self.state
            .lock()
            .memory_objects
            .values()
            .filter(|m| m.dedicated)
            .count()
    }

    /// Contents of the memory bound to `image`, if any.
    pub fn image_bytes(&self, image: vk::Image) -> Option<Vec<u8>> {
        use ash::vk::Handle;

        let state = self.state.lock();
        let memory = state.images.get(&image.as_raw())?.memory?;
        let block = state.memories.get(&memory)?.block;
        state.blocks.get(&block).map(|b| b.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_live_until_last_reference() {
        let world = MockWorld::new();
        let id = {
            let mut state = world.lock();
            let id = state.new_block(16);
            state.retain_block(id);
            id
        };
        world.lock().release_block(id);
        assert_eq!(world.live().blocks, 1);
        world.lock().release_block(id);
        assert_eq!(world.live().blocks, 0);
    }

    #[test]
    fn teardown_filter_keeps_order() {
        let world = MockWorld::new();
        {
            let mut state = world.lock();
            state.record(MockEvent::CreateImage);
            state.record(MockEvent::DestroyImage);
            state.record(MockEvent::AllocateMemory);
            state.record(MockEvent::FreeMemory);
        }
        assert_eq!(
            world.teardown_events(),
            vec![MockEvent::DestroyImage, MockEvent::FreeMemory]
        );
    }
}
