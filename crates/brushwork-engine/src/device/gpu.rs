use crate::device::RenderError;

/// Adapter and device requirements for headless evaluation.
#[derive(Debug, Clone)]
pub struct GpuInit {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Ask for the platform's software adapter (lavapipe, WARP) instead of real hardware.
    pub force_fallback_adapter: bool,
    pub required_limits: wgpu::Limits,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_limits: wgpu::Limits::default(),
        }
    }
}

impl GpuInit {
    /// Software adapter with downlevel limits, for machines without a GPU.
    pub fn fallback() -> Self {
        Self {
            force_fallback_adapter: true,
            required_limits: wgpu::Limits::downlevel_defaults(),
            ..Self::default()
        }
    }
}

/// Headless device and queue. There is no surface; every pixel lands in a slot target.
///
/// Both handles are `Send + Sync`: scoring workers poll the device while they wait
/// on a submission.
pub struct Gpu {
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Gpu {
    pub async fn new(init: GpuInit) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .map_err(|e| RenderError::resource("gpu adapter", e))?;

        let info = adapter.get_info();
        log::info!("adapter {} on {:?} ({:?})", info.name, info.backend, info.device_type);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("brushwork device"),
                required_features: wgpu::Features::empty(),
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| RenderError::resource("gpu device", e))?;

        Ok(Self { _instance: instance, adapter, device, queue })
    }

    /// [`Gpu::new`] driven to completion on the calling thread.
    pub fn new_blocking(init: GpuInit) -> Result<Self, RenderError> {
        pollster::block_on(Self::new(init))
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }
}
