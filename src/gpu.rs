//! GPU adapter enumeration for `--list-gpus`.

pub struct AdapterInfo {
    pub index: usize,
    pub name: String,
    pub backend: &'static str,
    pub device_type: &'static str,
}

pub fn enumerate_adapters() -> Vec<AdapterInfo> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .enumerate()
        .map(|(index, adapter)| {
            let info = adapter.get_info();
            AdapterInfo {
                index,
                name: info.name,
                backend: match info.backend {
                    wgpu::Backend::Vulkan => "vulkan",
                    wgpu::Backend::Metal => "metal",
                    wgpu::Backend::Dx12 => "dx12",
                    wgpu::Backend::Gl => "gl",
                    wgpu::Backend::BrowserWebGpu => "webgpu",
                    _ => "unknown",
                },
                device_type: match info.device_type {
                    wgpu::DeviceType::DiscreteGpu => "discrete",
                    wgpu::DeviceType::IntegratedGpu => "integrated",
                    wgpu::DeviceType::VirtualGpu => "virtual",
                    wgpu::DeviceType::Cpu => "cpu",
                    wgpu::DeviceType::Other => "other",
                },
            }
        })
        .collect()
}
