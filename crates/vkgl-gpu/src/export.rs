//! Native handle export.

use std::sync::Arc;

use vkgl_core::{HandleType, NativeMemoryHandle};

use crate::context::LogicalDevice;
use crate::driver::MemoryExportFns;
use crate::error::{GpuError, Result};
use crate::memory::BoundImage;

struct Loaded {
    fns: Arc<dyn MemoryExportFns>,
    // Keeps the device alive for as long as the entry point may be called.
    _device: LogicalDevice,
}

/// Exports device memory as an OS handle.
///
/// Created unloaded; [`HandleExporter::load`] resolves the entry point
/// against a logical device. Exporting before that fails with
/// [`GpuError::FunctionNotLoaded`].
pub struct HandleExporter {
    handle_type: HandleType,
    loaded: Option<Loaded>,
}

impl HandleExporter {
    /// Create an unloaded exporter for `handle_type`.
    pub fn new(handle_type: HandleType) -> Self {
        Self {
            handle_type,
            loaded: None,
        }
    }

    /// Handle type this exporter produces.
    pub fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    /// Returns true once the entry point has been resolved.
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Resolve the export entry point against `device`.
    pub fn load(&mut self, device: &LogicalDevice) -> Result<()> {
        if !device.is_extension_enabled(self.handle_type.vulkan_extension()) {
            return Err(GpuError::FunctionNotLoaded(
                self.handle_type.vulkan_entry_point(),
            ));
        }

        let fns = device.driver().load_memory_export(self.handle_type)?;
        tracing::debug!("Loaded {}", self.handle_type.vulkan_entry_point());
        self.loaded = Some(Loaded {
            fns,
            _device: device.clone(),
        });
        Ok(())
    }

    /// Export the memory backing `bound` as a new OS handle.
    ///
    /// The returned handle holds its own reference to the memory.
    pub fn export_handle(&self, bound: &BoundImage) -> Result<NativeMemoryHandle> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or(GpuError::FunctionNotLoaded(self.handle_type.vulkan_entry_point()))?;

        let declared = bound.allocation().handle_type();
        if declared != Some(self.handle_type) {
            return Err(GpuError::ExportImportMismatch(format!(
                "Exporter produces {} but allocation declares {declared:?}",
                self.handle_type
            )));
        }

        let handle = loaded.fns.export(bound.allocation().raw())?;
        if handle.handle_type() != self.handle_type {
            return Err(GpuError::ExportImportMismatch(format!(
                "Driver exported {} instead of {}",
                handle.handle_type(),
                self.handle_type
            )));
        }
        tracing::debug!("Exported {handle:?} for memory {:?}", bound.allocation().raw());
        Ok(handle)
    }
}

impl std::fmt::Debug for HandleExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleExporter")
            .field("handle_type", &self.handle_type)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
