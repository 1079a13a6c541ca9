// =============================================================================
// vk-frames demo - clear-screen renderer driven by the frame controller
// =============================================================================
//
// FRAME FLOW:
// 1. push_extent (surface dimensions, required every frame)
// 2. acquire swapchain image (skip frame if the surface was invalidated)
// 3. wait + reset the slot's graphics work
// 4. record a clear pass, optionally preceded by a compute pass
// 5. submit with the frame's compute plan, present, rotate
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use std::time::Instant;
use vk_frames::backend::{FrameCommands, Swapchain, VulkanContext, VulkanDevice};
use vk_frames::{AcquiredImage, Config, FrameSync, GpuContext, SubmissionPlan};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

fn main() -> Result<()> {
    let config = Config::load();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    log::info!("Starting vk-frames demo");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// Demo application state.
///
/// Field order matters for Drop: the controller (which owns the context,
/// swapchain and command buffers) must go before the device.
struct App {
    config: Config,
    window: Option<Arc<Window>>,

    frames: Option<FrameSync<VulkanContext>>,
    device: Option<Arc<VulkanDevice>>,

    is_fullscreen: bool,
    is_minimized: bool,
    /// Frames alternate between compute-fed and graphics-only, exercising
    /// both shapes of the graphics wait set.
    frame_parity: bool,

    // FPS tracking
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        let now = Instant::now();
        Self {
            config,
            window: None,
            frames: None,
            device: None,
            is_fullscreen,
            is_minimized: false,
            frame_parity: false,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    fn init_vulkan(&mut self, window: Arc<Window>) -> Result<()> {
        log::info!("Initializing Vulkan...");

        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let device = VulkanDevice::new(&self.config.window.title, enable_validation)?;

        let surface = create_surface(&device, &window)?;
        let surface_loader =
            ash::extensions::khr::Surface::new(&device.entry, &device.instance);

        // Verify the GPU supports presenting to this surface
        let surface_support = unsafe {
            surface_loader.get_physical_device_surface_support(
                device.physical_device,
                device.graphics_queue_family,
                surface,
            )?
        };
        if !surface_support {
            anyhow::bail!("GPU doesn't support presenting to this surface");
        }

        let size = window.inner_size();
        let swapchain = Swapchain::new(
            device.clone(),
            surface,
            surface_loader,
            self.config.get_present_mode(),
            size.width,
            size.height,
        )?;

        let commands = FrameCommands::new(device.clone())?;
        let context = VulkanContext::new(device.clone(), swapchain, commands);
        let frames = FrameSync::new(context, self.config.sync.options())?;

        self.device = Some(device);
        self.frames = Some(frames);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    fn render_frame(&mut self) -> Result<bool> {
        if self.is_minimized {
            return Ok(false);
        }

        let window = self.window.as_ref().context("Window not initialized")?.clone();
        let frames = self.frames.as_mut().context("Vulkan not initialized")?;

        // The controller needs fresh dimensions before every submission;
        // recreation on an invalidated surface reads them
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            self.is_minimized = true;
            return Ok(false);
        }
        frames.push_extent(size.width, size.height);

        let image_index = match frames.acquire_next_image()? {
            AcquiredImage::Ready(index) => index,
            // Surface was recreated; abandon this frame, no submission
            AcquiredImage::SkipFrame => return Ok(false),
        };

        // Make sure the GPU retired this slot's previous frame before
        // touching its command buffers
        frames.wait_graphics()?;
        frames.reset_graphics()?;

        let use_compute = self.frame_parity;
        self.frame_parity = !self.frame_parity;

        let plan = if use_compute {
            frames.wait_compute()?;
            frames.reset_compute()?;
            frames.begin_compute()?;
            // Nothing to dispatch in the demo; an empty pass still
            // exercises the compute-to-graphics dependency
            frames.end_compute()?;
            frames.submit_compute()?
        } else {
            SubmissionPlan::default()
        };

        frames.begin_graphics()?;
        record_clear_pass(
            frames.gpu(),
            frames.gpu().graphics_buffer(frames.current_slot()),
            frames.gpu().image(image_index),
            self.config.graphics.clear_color,
        );
        frames.end_graphics()?;

        frames.submit(image_index, plan)?;
        frames.present(image_index)?;

        Ok(true)
    }

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }
        }
    }

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        if now.duration_since(self.last_fps_update).as_secs_f32() >= 1.0 {
            let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms)",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0,
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

/// Create a surface for the window's native handle (platform-specific).
fn create_surface(device: &VulkanDevice, window: &Window) -> Result<vk::SurfaceKHR> {
    use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};

    let display_handle = window
        .display_handle()
        .context("Failed to get display handle")?
        .as_raw();
    let window_handle = window
        .window_handle()
        .context("Failed to get window handle")?
        .as_raw();

    match (display_handle, window_handle) {
        #[cfg(target_os = "windows")]
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
            let hinstance =
                handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const std::ffi::c_void;
            let hwnd = handle.hwnd.get() as *const std::ffi::c_void;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            let loader =
                ash::extensions::khr::Win32Surface::new(&device.entry, &device.instance);
            Ok(unsafe { loader.create_win32_surface(&create_info, None) }?)
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(handle)) => {
            let dpy = display
                .display
                .map(|d| d.as_ptr())
                .unwrap_or(std::ptr::null_mut());
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy as *mut _)
                .window(handle.window);
            let loader = ash::extensions::khr::XlibSurface::new(&device.entry, &device.instance);
            Ok(unsafe { loader.create_xlib_surface(&create_info, None) }?)
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(handle)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr())
                .surface(handle.surface.as_ptr());
            let loader =
                ash::extensions::khr::WaylandSurface::new(&device.entry, &device.instance);
            Ok(unsafe { loader.create_wayland_surface(&create_info, None) }?)
        }
        _ => anyhow::bail!("Unsupported window handle type"),
    }
}

/// Record layout transitions + clear for one swapchain image.
///
/// UNDEFINED -> TRANSFER_DST for vkCmdClearColorImage, then
/// TRANSFER_DST -> PRESENT_SRC so the image can be handed to the
/// presentation engine.
fn record_clear_pass(
    context: &VulkanContext,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    clear_color: [f32; 4],
) {
    let device = &context.device().device;
    let clear_value = vk::ClearColorValue { float32: clear_color };

    let subresource_range = vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    };

    unsafe {
        let barrier_to_transfer = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range)
            .build();

        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier_to_transfer],
        );

        device.cmd_clear_color_image(
            cmd,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &clear_value,
            &[subresource_range],
        );

        let barrier_to_present = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::empty())
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range)
            .build();

        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier_to_present],
        );
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_vulkan(window.clone()) {
            log::error!("Failed to initialize Vulkan: {:?}", e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                if let Some(ref device) = self.device {
                    let _ = device.wait_idle();
                }
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                // A stale swapchain surfaces as OutOfDate on the next
                // acquire or present; the controller recreates it there
                self.is_minimized = size.width == 0 || size.height == 0;
            }

            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(rendered) => {
                    if rendered {
                        self.update_fps();
                    }
                }
                Err(e) => {
                    log::error!("Render error: {:?}", e);
                    event_loop.exit();
                }
            },

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        match key {
                            KeyCode::Escape => {
                                log::info!("ESC pressed, exiting...");
                                event_loop.exit();
                            }
                            KeyCode::F11 => {
                                self.toggle_fullscreen();
                            }
                            _ => {}
                        }
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
