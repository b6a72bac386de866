//! Window seam
//!
//! The renderer never owns a message loop. It needs a native handle when the
//! device is created and the current client size when the owner asks it to
//! resize.

use crate::error::{Error, Result};
use crate::types::Resolution;
use parking_lot::Mutex;
use raw_window_handle::RawWindowHandle;

/// A presentation target owned by the surrounding application
pub trait RenderWindow: Send + Sync {
    /// Current client area size in pixels
    fn client_size(&self) -> Result<Resolution>;

    /// Native handle for swap chain creation; `None` for offscreen targets
    fn raw_handle(&self) -> Option<RawWindowHandle> {
        None
    }
}

/// Offscreen target with a settable client size
#[derive(Debug)]
pub struct HeadlessWindow {
    size: Mutex<Resolution>,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new(Resolution::new(width, height)),
        }
    }

    /// Simulate the user dragging the window border
    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock() = Resolution::new(width, height);
    }
}

impl RenderWindow for HeadlessWindow {
    fn client_size(&self) -> Result<Resolution> {
        Ok(*self.size.lock())
    }
}

#[cfg(windows)]
pub use win32::{hwnd_of, Win32Window};

#[cfg(windows)]
mod win32 {
    use super::*;
    use raw_window_handle::Win32WindowHandle;
    use std::num::NonZeroIsize;
    use windows::Win32::Foundation::{HWND, RECT};
    use windows::Win32::UI::WindowsAndMessaging::GetClientRect;

    /// A Win32 window identified by its HWND
    #[derive(Debug, Clone, Copy)]
    pub struct Win32Window {
        hwnd: NonZeroIsize,
    }

    impl Win32Window {
        pub fn from_hwnd(hwnd: isize) -> Result<Self> {
            let hwnd = NonZeroIsize::new(hwnd).ok_or_else(|| Error::Window("null HWND".into()))?;
            Ok(Self { hwnd })
        }

        pub fn from_raw(handle: RawWindowHandle) -> Result<Self> {
            match handle {
                RawWindowHandle::Win32(h) => Ok(Self { hwnd: h.hwnd }),
                other => Err(Error::Window(format!("not a Win32 window: {:?}", other))),
            }
        }

        pub fn hwnd(&self) -> HWND {
            HWND(self.hwnd.get() as *mut _)
        }
    }

    impl RenderWindow for Win32Window {
        fn client_size(&self) -> Result<Resolution> {
            let mut rect = RECT::default();
            unsafe { GetClientRect(self.hwnd(), &mut rect) }
                .map_err(|e| Error::Window(format!("GetClientRect failed: {}", e)))?;
            Ok(Resolution::new(
                (rect.right - rect.left).max(0) as u32,
                (rect.bottom - rect.top).max(0) as u32,
            ))
        }

        fn raw_handle(&self) -> Option<RawWindowHandle> {
            Some(RawWindowHandle::Win32(Win32WindowHandle::new(self.hwnd)))
        }
    }

    /// HWND behind a window, required by the D3D swap chains
    pub fn hwnd_of(window: &dyn RenderWindow) -> Result<HWND> {
        match window.raw_handle() {
            Some(handle) => Ok(Win32Window::from_raw(handle)?.hwnd()),
            None => Err(Error::Window("window has no native handle".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_resize() {
        let window = HeadlessWindow::new(800, 600);
        assert_eq!(window.client_size().unwrap(), Resolution::SVGA);
        window.set_size(1024, 768);
        assert_eq!(window.client_size().unwrap(), Resolution::XGA);
        assert!(window.raw_handle().is_none());
    }
}
