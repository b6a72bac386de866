//! Error types for the video renderer

use thiserror::Error;

/// Result type alias for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Renderer error type
#[derive(Error, Debug)]
pub enum Error {
    // Device errors
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    #[error("Swap chain error: {0}")]
    SwapChain(String),

    #[error("Device lost: {0}")]
    DeviceLost(String),

    #[error("Renderer not initialized")]
    NotInitialized,

    #[error("Backend not supported on this platform: {0}")]
    UnsupportedBackend(String),

    // Resource errors
    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    #[error("Shader creation failed: {0}")]
    ShaderCreation(String),

    #[error("Shader bytecode missing: {0}")]
    ShaderMissing(String),

    #[error("Texture map failed: {0}")]
    Map(String),

    // Frame errors
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Hardware surface error: {0}")]
    Surface(String),

    #[error("Present failed: {0}")]
    Present(String),

    // Window errors
    #[error("Window error: {0}")]
    Window(String),

    // General errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if the device behind this error is gone and must be recreated
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }

    /// Check if this error only costs the current frame
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Map(_)
                | Error::InvalidFrame(_)
                | Error::Surface(_)
                | Error::Present(_)
                | Error::UnsupportedFormat(_)
                | Error::TextureCreation(_)
        )
    }

    /// Check if this error happened while bringing the device up
    pub fn is_initialization_failure(&self) -> bool {
        matches!(
            self,
            Error::DeviceCreation(_)
                | Error::SwapChain(_)
                | Error::ShaderCreation(_)
                | Error::ShaderMissing(_)
                | Error::Window(_)
                | Error::UnsupportedBackend(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::DeviceLost("removed".into()).is_device_lost());
        assert!(!Error::DeviceLost("removed".into()).is_recoverable());
        assert!(Error::Map("busy".into()).is_recoverable());
        assert!(Error::InvalidFrame("short plane".into()).is_recoverable());
        assert!(Error::SwapChain("no window".into()).is_initialization_failure());
        assert!(!Error::NotInitialized.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedFormat("NV12 render target".into());
        assert_eq!(err.to_string(), "Unsupported pixel format: NV12 render target");
    }
}
