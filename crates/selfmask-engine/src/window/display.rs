use std::time::Duration;

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use wgpu::SurfaceError;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::device::GraphicsDevice;
use crate::render::{FrameIngestor, MosaicRenderer, RenderTarget};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: "selfmask".to_string(),
            initial_size: LogicalSize::new(960.0, 480.0),
        }
    }
}

/// Result of one presentation attempt.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DisplayStatus {
    Presented,
    /// Transient condition (no window yet, minimized, surface timeout).
    Skipped,
    /// The window is gone; the display should be dropped.
    Closed,
}

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum SurfaceErrorAction {
    Reconfigured,
    SkipFrame,
    Fatal,
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    surface: wgpu::Surface<'this>,
}

struct DisplayState {
    config: DisplayConfig,

    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,

    entry: Option<WindowEntry>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    closed: bool,
}

/// Debug window presenting the attachment mosaic.
///
/// Must be created and used on the thread that owns the platform event loop.
pub struct DebugDisplay {
    event_loop: EventLoop<()>,
    state: DisplayState,
    mosaic: MosaicRenderer,
}

impl DebugDisplay {
    pub fn new(gpu: &GraphicsDevice, config: DisplayConfig) -> Result<Self> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut display = Self {
            event_loop,
            state: DisplayState {
                config,
                instance: gpu.instance().clone(),
                adapter: gpu.adapter().clone(),
                device: gpu.device().clone(),
                entry: None,
                surface_config: None,
                closed: false,
            },
            mosaic: MosaicRenderer::new(),
        };
        // First pump delivers `resumed`, which creates the window.
        display.pump();
        Ok(display)
    }

    /// Pumps pending window events, then draws and presents the mosaic.
    pub fn present(
        &mut self,
        gpu: &GraphicsDevice,
        target: &RenderTarget,
        ingestor: &FrameIngestor,
        far: f32,
    ) -> DisplayStatus {
        self.pump();
        if self.state.closed {
            return DisplayStatus::Closed;
        }

        let (Some(entry), Some(surface_config)) =
            (self.state.entry.as_ref(), self.state.surface_config.as_ref())
        else {
            return DisplayStatus::Skipped;
        };
        if surface_config.width == 0 || surface_config.height == 0 {
            return DisplayStatus::Skipped;
        }

        let surface_texture = match entry.with_surface(|s| s.get_current_texture()) {
            Ok(t) => t,
            Err(e) => {
                return match self.state.handle_surface_error(e.clone()) {
                    SurfaceErrorAction::Fatal => {
                        log::error!("debug display surface failed: {e}; closing window");
                        self.state.close();
                        DisplayStatus::Closed
                    }
                    _ => DisplayStatus::Skipped,
                };
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("selfmask display encoder"),
            });

        let format = surface_config.format;
        if let Err(e) = self.mosaic.render(
            gpu.device(),
            gpu.queue(),
            &mut encoder,
            &view,
            format,
            target,
            ingestor,
            far,
        ) {
            log::debug!("debug display skipped: {e}");
            return DisplayStatus::Skipped;
        }

        gpu.queue().submit(std::iter::once(encoder.finish()));
        entry.with_window(|w| w.pre_present_notify());
        surface_texture.present();
        DisplayStatus::Presented
    }

    fn pump(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            log::debug!("debug display event loop exited with code {code}");
            self.state.close();
        }
    }
}

impl DisplayState {
    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create debug window")?;

        let instance = &self.instance;
        let entry = WindowEntryTryBuilder {
            window,
            surface_builder: |w| instance.create_surface(w),
        }
        .try_build()
        .context("failed to create wgpu surface")?;

        let size = entry.with_window(|w| w.inner_size());
        let caps = entry.with_surface(|s| s.get_capabilities(&self.adapter));
        let format = choose_surface_format(&caps).context("no supported surface formats")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        if size.width > 0 && size.height > 0 {
            entry.with_surface(|s| s.configure(&self.device, &surface_config));
        }

        log::info!("debug display opened ({}x{}, {format:?})", size.width, size.height);
        self.entry = Some(entry);
        self.surface_config = Some(surface_config);
        Ok(())
    }

    /// Reconfigures after a resize. A 0×0 size defers configuration.
    fn resize(&mut self, size: PhysicalSize<u32>) {
        let (Some(entry), Some(config)) = (self.entry.as_ref(), self.surface_config.as_mut()) else {
            return;
        };
        config.width = size.width;
        config.height = size.height;
        if size.width > 0 && size.height > 0 {
            entry.with_surface(|s| s.configure(&self.device, config));
        }
    }

    fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => {
                if let (Some(entry), Some(config)) = (self.entry.as_ref(), self.surface_config.as_ref()) {
                    if config.width > 0 && config.height > 0 {
                        entry.with_surface(|s| s.configure(&self.device, config));
                    }
                }
                SurfaceErrorAction::Reconfigured
            }
            SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
            SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }

    fn close(&mut self) {
        self.entry = None;
        self.surface_config = None;
        self.closed = true;
    }
}

impl ApplicationHandler for DisplayState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.closed {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            log::error!("debug display unavailable: {e:#}");
            self.close();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("debug display closed by user");
                self.close();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resize(size),
            _ => {}
        }
    }
}

fn choose_surface_format(caps: &wgpu::SurfaceCapabilities) -> Option<wgpu::TextureFormat> {
    let preferred = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ];
    preferred
        .into_iter()
        .find(|f| caps.formats.contains(f))
        .or_else(|| caps.formats.first().copied())
}
