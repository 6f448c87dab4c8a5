/// Initialization parameters for the GPU layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Backends wgpu may select from.
    pub backends: wgpu::Backends,

    /// Adapter power preference.
    ///
    /// High performance is preferred; the filter runs every sensor frame.
    pub power_preference: wgpu::PowerPreference,

    /// Accept a software adapter (llvmpipe, WARP). Useful on headless CI.
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    ///
    /// `None` requests the downlevel defaults raised to the adapter's texture
    /// size limits, so large depth frames fit.
    pub required_limits: Option<wgpu::Limits>,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: None,
        }
    }
}
