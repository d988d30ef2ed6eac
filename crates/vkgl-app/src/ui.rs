//! ImGui windows drawn each frame.

use imgui::{Condition, TextureId, Ui};
use vkgl_gpu::PhysicalDeviceDescriptor;
use vkgl_interop::InteropChain;

/// Extensions whose names contain `filter`, in their original order.
///
/// Matching is a case-sensitive substring test; an empty filter keeps
/// everything.
pub fn filter_extensions<'a>(extensions: &'a [String], filter: &str) -> Vec<&'a str> {
    extensions
        .iter()
        .map(String::as_str)
        .filter(|name| name.contains(filter))
        .collect()
}

/// Filterable, single-selection list of device extensions.
#[derive(Debug, Default)]
pub struct ExtensionPanel {
    extensions: Vec<String>,
    filter: String,
    selected: Option<String>,
}

impl ExtensionPanel {
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions,
            ..Default::default()
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    /// Currently selected extension, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Select `name`; selecting the current selection again clears it.
    pub fn toggle(&mut self, name: &str) {
        if self.selected.as_deref() == Some(name) {
            self.selected = None;
        } else {
            self.selected = Some(name.to_string());
        }
    }

    /// Entries visible under the current filter.
    pub fn visible(&self) -> Vec<&str> {
        filter_extensions(&self.extensions, &self.filter)
    }

    pub fn draw(&mut self, ui: &Ui) {
        ui.window("Extensions")
            .size([360.0, 420.0], Condition::FirstUseEver)
            .position([660.0, 20.0], Condition::FirstUseEver)
            .build(|| {
                ui.input_text("Filter", &mut self.filter).build();
                ui.text(format!(
                    "{} of {} extensions",
                    self.visible().len(),
                    self.extensions.len()
                ));
                ui.separator();

                let mut clicked = None;
                ui.child_window("extension_list").border(true).build(|| {
                    for name in filter_extensions(&self.extensions, &self.filter) {
                        let is_selected = self.selected.as_deref() == Some(name);
                        if ui.selectable_config(name).selected(is_selected).build() {
                            clicked = Some(name.to_string());
                        }
                    }
                });

                if let Some(name) = clicked {
                    self.toggle(&name);
                }
            });
    }
}

/// Window showing the shared texture at its native size.
pub fn draw_image_window(ui: &Ui, chain: &InteropChain) {
    let Some(texture) = chain.texture_id() else {
        return;
    };
    let size = chain
        .import_desc()
        .map(|desc| [desc.extent.width as f32, desc.extent.height as f32])
        .unwrap_or([128.0, 128.0]);

    ui.window("Shared image")
        .size([size[0] + 32.0, size[1] + 48.0], Condition::FirstUseEver)
        .position([20.0, 20.0], Condition::FirstUseEver)
        .build(|| {
            imgui::Image::new(TextureId::new(texture as usize), size).build(ui);
        });
}

/// Window describing the selected GPU and the chain's state.
pub fn draw_device_window(ui: &Ui, device: &PhysicalDeviceDescriptor, chain: &InteropChain) {
    ui.window("Device")
        .size([420.0, 160.0], Condition::FirstUseEver)
        .position([20.0, 320.0], Condition::FirstUseEver)
        .build(|| {
            ui.text_wrapped(device.summary());
            ui.separator();
            ui.text(format!("State: {:?}", chain.state()));
            if let Some(desc) = chain.import_desc() {
                ui.text(format!("Image: {} {}", desc.extent, desc.format));
                ui.text(format!(
                    "Allocation: {} bytes via {}",
                    desc.allocation_size, desc.handle_type
                ));
            }
            if let Some(id) = chain.texture_id() {
                ui.text(format!("GL texture: {id}"));
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        [
            "VK_KHR_external_memory",
            "VK_KHR_external_memory_fd",
            "VK_KHR_swapchain",
            "VK_EXT_memory_budget",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let list = names();
        assert_eq!(filter_extensions(&list, ""), list.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn filter_is_case_sensitive_substring() {
        let list = names();
        assert_eq!(
            filter_extensions(&list, "external_memory"),
            vec!["VK_KHR_external_memory", "VK_KHR_external_memory_fd"]
        );
        assert!(filter_extensions(&list, "EXTERNAL").is_empty());
        assert_eq!(filter_extensions(&list, "memory_b"), vec!["VK_EXT_memory_budget"]);
    }

    #[test]
    fn selection_toggles() {
        let mut panel = ExtensionPanel::new(names());
        panel.toggle("VK_KHR_swapchain");
        assert_eq!(panel.selected(), Some("VK_KHR_swapchain"));
        panel.toggle("VK_KHR_external_memory");
        assert_eq!(panel.selected(), Some("VK_KHR_external_memory"));
        panel.toggle("VK_KHR_external_memory");
        assert_eq!(panel.selected(), None);
    }

    #[test]
    fn filter_does_not_clear_selection() {
        let mut panel = ExtensionPanel::new(names());
        panel.toggle("VK_KHR_swapchain");
        panel.set_filter("fd");
        assert_eq!(panel.visible(), vec!["VK_KHR_external_memory_fd"]);
        assert_eq!(panel.selected(), Some("VK_KHR_swapchain"));
    }
}
