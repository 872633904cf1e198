//! Compile-time backend selection. NdArray on the CPU unless the
//! `backend-wgpu` feature is enabled.

#[cfg(feature = "backend-wgpu")]
pub use burn_wgpu::Wgpu as InnerBackend;

#[cfg(all(feature = "backend-ndarray", not(feature = "backend-wgpu")))]
pub use burn_ndarray::NdArray as InnerBackend;

/// Training backend. Inference and evaluation run on [`InnerBackend`].
pub type Backend = burn::backend::Autodiff<InnerBackend>;

#[cfg(feature = "backend-wgpu")]
pub type Device = burn_wgpu::WgpuDevice;

#[cfg(all(feature = "backend-ndarray", not(feature = "backend-wgpu")))]
pub type Device = burn_ndarray::NdArrayDevice;

pub fn default_device() -> Device {
    #[cfg(feature = "backend-wgpu")]
    tracing::info!("Using WGPU backend");

    #[cfg(all(feature = "backend-ndarray", not(feature = "backend-wgpu")))]
    tracing::info!("Using NdArray (CPU) backend");

    let device = Device::default();
    tracing::debug!(device = ?device, "Device ready");
    device
}
