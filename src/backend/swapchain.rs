// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Owns the surface: recreation rebuilds the swapchain for a new extent
// against the same surface, invalidating previously acquired indices.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;
use crate::gpu::{AcquireOutcome, PresentOutcome};

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::extensions::khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    surface: vk::SurfaceKHR,
    surface_loader: ash::extensions::khr::Surface,
    preferred_present_mode: vk::PresentModeKHR,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    pub fn new(
        device: Arc<VulkanDevice>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::extensions::khr::Surface,
        preferred_present_mode: vk::PresentModeKHR,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let swapchain_loader =
            ash::extensions::khr::Swapchain::new(&device.instance, &device.device);

        let (swapchain, images, format, extent) = create_raw(
            &device,
            surface,
            &surface_loader,
            &swapchain_loader,
            preferred_present_mode,
            width,
            height,
            vk::SwapchainKHR::null(),
        )?;

        Ok(Self {
            swapchain,
            swapchain_loader,
            images,
            format,
            extent,
            surface,
            surface_loader,
            preferred_present_mode,
            device,
        })
    }

    /// Rebuild the swapchain for a new extent. Any image index acquired
    /// before this call is invalid afterwards.
    pub fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        // The GPU may still reference old images; drain it first
        self.device.wait_idle()?;

        let old = self.swapchain;
        let (swapchain, images, format, extent) = create_raw(
            &self.device,
            self.surface,
            &self.surface_loader,
            &self.swapchain_loader,
            self.preferred_present_mode,
            width,
            height,
            old,
        )?;

        unsafe { self.swapchain_loader.destroy_swapchain(old, None) };

        self.swapchain = swapchain;
        self.images = images;
        self.format = format;
        self.extent = extent;
        Ok(())
    }

    /// Acquire next image for rendering, signaling `semaphore` when the
    /// presentation engine is done with it. Suboptimal still acquires; only
    /// OUT_OF_DATE comes back without an image.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e).context("vkAcquireNextImageKHR failed"),
        }
    }

    /// Present rendered image to screen once `wait_semaphore` signals.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };

        match result {
            Ok(suboptimal) => Ok(PresentOutcome::Presented { suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e).context("vkQueuePresentKHR failed"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn create_raw(
    device: &VulkanDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::extensions::khr::Surface,
    swapchain_loader: &ash::extensions::khr::Swapchain,
    preferred_present_mode: vk::PresentModeKHR,
    width: u32,
    height: u32,
    old_swapchain: vk::SwapchainKHR,
) -> Result<(vk::SwapchainKHR, Vec<vk::Image>, vk::Format, vk::Extent2D)> {
    log::info!("Creating swapchain: {}x{}", width, height);

    let surface_caps = unsafe {
        surface_loader.get_physical_device_surface_capabilities(device.physical_device, surface)
    }?;

    let formats = unsafe {
        surface_loader.get_physical_device_surface_formats(device.physical_device, surface)
    }?;

    let present_modes = unsafe {
        surface_loader.get_physical_device_surface_present_modes(device.physical_device, surface)
    }?;

    // Choose surface format (prefer SRGB)
    let surface_format = formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .context("No suitable surface format")?;

    // FIFO is the only mode Vulkan guarantees; fall back to it if the
    // configured preference is unavailable
    let present_mode = present_modes
        .iter()
        .copied()
        .find(|&mode| mode == preferred_present_mode)
        .unwrap_or(vk::PresentModeKHR::FIFO);

    log::info!("Present mode: {:?}", present_mode);

    // Choose extent
    let extent = if surface_caps.current_extent.width != u32::MAX {
        surface_caps.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(
                surface_caps.min_image_extent.width,
                surface_caps.max_image_extent.width,
            ),
            height: height.clamp(
                surface_caps.min_image_extent.height,
                surface_caps.max_image_extent.height,
            ),
        }
    };

    // One spare image over the minimum keeps acquisition from stalling
    let mut image_count = surface_caps.min_image_count + 1;
    if surface_caps.max_image_count > 0 && image_count > surface_caps.max_image_count {
        image_count = surface_caps.max_image_count;
    }

    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(surface_caps.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain);

    let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }?;
    let images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }?;

    log::info!("Created swapchain with {} images", images.len());

    Ok((swapchain, images, surface_format.format, extent))
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
