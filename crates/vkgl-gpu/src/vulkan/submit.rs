//! One-shot transfer submissions and the barriers around an image fill.

use ash::vk;

use crate::error::{GpuError, Result};

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// UNDEFINED to TRANSFER_DST_OPTIMAL. Previous contents are discarded.
pub fn acquire_for_transfer(image: vk::Image) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .image(image)
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .subresource_range(COLOR_RANGE)
}

/// TRANSFER_DST_OPTIMAL to GENERAL, handing ownership from `queue_family`
/// to `VK_QUEUE_FAMILY_EXTERNAL` when `external` is set.
pub fn release_after_transfer(
    image: vk::Image,
    queue_family: u32,
    external: bool,
) -> vk::ImageMemoryBarrier<'static> {
    let (src, dst) = if external {
        (queue_family, vk::QUEUE_FAMILY_EXTERNAL)
    } else {
        (vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED)
    };
    vk::ImageMemoryBarrier::default()
        .image(image)
        .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .new_layout(vk::ImageLayout::GENERAL)
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .src_queue_family_index(src)
        .dst_queue_family_index(dst)
        .subresource_range(COLOR_RANGE)
}

/// Transient pool, command buffer and fence for a single blocking submit.
///
/// Everything is destroyed on drop.
pub struct OneShot<'a> {
    device: &'a ash::Device,
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
}

impl<'a> OneShot<'a> {
    /// # Safety
    /// `device` must be valid and `queue_family` must exist on it.
    pub unsafe fn begin(device: &'a ash::Device, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { device.create_command_pool(&pool_info, None)? };

        let mut one_shot = Self {
            device,
            pool,
            cmd: vk::CommandBuffer::null(),
            fence: vk::Fence::null(),
        };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        one_shot.cmd = unsafe { device.allocate_command_buffers(&alloc_info)? }
            .into_iter()
            .next()
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY))?;
        one_shot.fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None)? };

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(one_shot.cmd, &begin_info)? };
        Ok(one_shot)
    }

    /// Command buffer in the recording state.
    pub fn cmd(&self) -> vk::CommandBuffer {
        self.cmd
    }

    /// End recording, submit to `queue` and block until the fence signals.
    ///
    /// # Safety
    /// `queue` must belong to the family the pool was created for.
    pub unsafe fn submit_and_wait(self, queue: vk::Queue) -> Result<()> {
        unsafe {
            self.device.end_command_buffer(self.cmd)?;
            let cmds = [self.cmd];
            let submit = vk::SubmitInfo::default().command_buffers(&cmds);
            self.device.queue_submit(queue, &[submit], self.fence)?;
            self.device.wait_for_fences(&[self.fence], true, u64::MAX)?;
        }
        Ok(())
    }
}

impl Drop for OneShot<'_> {
    fn drop(&mut self) {
        unsafe {
            if self.fence != vk::Fence::null() {
                self.device.destroy_fence(self.fence, None);
            }
            // Frees the command buffer with it.
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_discards_contents() {
        let barrier = acquire_for_transfer(vk::Image::null());
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(barrier.subresource_range.level_count, 1);
    }

    #[test]
    fn exported_images_are_released_to_the_external_family() {
        let barrier = release_after_transfer(vk::Image::null(), 2, true);
        assert_eq!(barrier.src_queue_family_index, 2);
        assert_eq!(barrier.dst_queue_family_index, vk::QUEUE_FAMILY_EXTERNAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::GENERAL);

        let local = release_after_transfer(vk::Image::null(), 2, false);
        assert_eq!(local.dst_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }
}
