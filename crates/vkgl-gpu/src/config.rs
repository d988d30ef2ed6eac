//! Instance and device configuration.

use vkgl_core::constants::{APP_NAME, VALIDATION_LAYER};
use vkgl_core::HandleType;

use crate::selection::SelectionStrategy;

/// Parameters for [`create_instance`](crate::context::create_instance).
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable the Khronos validation layer
    pub enable_validation: bool,
    /// Additional layers that must be present
    pub required_layers: Vec<String>,
    /// Instance extensions that must be present
    pub required_instance_extensions: Vec<String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            enable_validation: cfg!(debug_assertions),
            required_layers: Vec::new(),
            required_instance_extensions: Vec::new(),
        }
    }
}

impl InstanceConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Require an additional layer.
    pub fn with_layer(mut self, name: impl Into<String>) -> Self {
        self.required_layers.push(name.into());
        self
    }

    /// Require an instance extension.
    pub fn with_instance_extension(mut self, name: impl Into<String>) -> Self {
        self.required_instance_extensions.push(name.into());
        self
    }

    /// Every layer the instance will be created with.
    pub fn layers(&self) -> Vec<String> {
        let mut layers = Vec::with_capacity(self.required_layers.len() + 1);
        if self.enable_validation {
            layers.push(VALIDATION_LAYER.to_string());
        }
        for layer in &self.required_layers {
            if !layers.contains(layer) {
                layers.push(layer.clone());
            }
        }
        layers
    }
}

/// Parameters for device selection and logical device creation.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    /// How to pick a physical device
    pub strategy: SelectionStrategy,
    /// Handle type the exported memory will use
    pub handle_type: HandleType,
    /// Device extensions needed beyond the export extension
    pub extra_extensions: Vec<String>,
}

impl DeviceConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device selection strategy.
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the handle type used for export.
    pub fn with_handle_type(mut self, handle_type: HandleType) -> Self {
        self.handle_type = handle_type;
        self
    }

    /// Require an additional device extension.
    pub fn with_extension(mut self, name: impl Into<String>) -> Self {
        self.extra_extensions.push(name.into());
        self
    }

    /// Device extensions to enable, export extension first.
    pub fn required_extensions(&self) -> Vec<String> {
        let mut extensions = vec![
            "VK_KHR_external_memory".to_string(),
            self.handle_type.vulkan_extension().to_string(),
        ];
        for ext in &self.extra_extensions {
            if !extensions.contains(ext) {
                extensions.push(ext.clone());
            }
        }
        extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_layer_is_added_once() {
        let config = InstanceConfig::new()
            .with_validation(true)
            .with_layer(VALIDATION_LAYER);
        assert_eq!(config.layers(), vec![VALIDATION_LAYER.to_string()]);

        let config = InstanceConfig::new().with_validation(false);
        assert!(config.layers().is_empty());
    }

    #[test]
    fn device_extensions_follow_handle_type() {
        let config = DeviceConfig::new()
            .with_handle_type(HandleType::OpaqueFd)
            .with_extension("VK_KHR_external_memory_fd");
        assert_eq!(
            config.required_extensions(),
            vec![
                "VK_KHR_external_memory".to_string(),
                "VK_KHR_external_memory_fd".to_string()
            ]
        );
    }
}
