use anyhow::{Context, Result};

use super::GpuInit;

/// Owns wgpu core objects for offscreen rendering.
///
/// This type is the low-level rendering context:
/// - creates and stores Instance/Adapter/Device/Queue
/// - has no surface; the optional debug window creates its own against
///   the same instance and device
pub struct GraphicsDevice {
    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// wgpu instance used to create the adapter and any surface.
    ///
    /// Declared last so it is dropped after the device and queue.
    instance: wgpu::Instance,
}

impl GraphicsDevice {
    /// Creates a headless GPU context.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks on it.
    pub fn new(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new_async(init))
    }

    /// Async variant of [`GraphicsDevice::new`].
    pub async fn new_async(init: GpuInit) -> Result<Self> {
        let GpuInit {
            backends,
            power_preference,
            force_fallback_adapter,
            required_features,
            required_limits,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!(
            "using GPU adapter {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let required_limits = required_limits.unwrap_or_else(|| {
            wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits())
        });

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("selfmask device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        Ok(Self {
            device,
            queue,
            adapter,
            instance,
        })
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the adapter the device was created from.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns the instance, for creating window surfaces.
    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    /// Largest width/height accepted for 2D textures on this device.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Blocks until all submitted work has completed.
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("device poll failed: {e}"))
    }
}
