//! Contains logic for observing the user's environment.
//! [GenericSampler] is the main artifact of this module that abstracts
//! over the platform backends.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use std::sync::Arc;

use anyhow::Result;

/// Reference to the focused window of an application. Backends encode the platform window id,
/// so a handle produced by one sampler resolves in any other sampler of the same backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontmostApp {
    /// Display name, for example 'firefox' or 'Terminal'.
    pub name: Arc<str>,
    /// Stable identifier of the application. Backends use the full path to the executable.
    pub bundle_id: Option<Arc<str>>,
    pub handle: AppHandle,
}

/// Intended to serve as a contract every platform must implement.
///
/// Every call may come back empty. That means there was nothing to observe this time and is never
/// treated as an error by the caller.
#[cfg_attr(test, mockall::automock)]
pub trait Sampler {
    fn frontmost_app(&mut self) -> Option<FrontmostApp>;

    /// Title of the focused window of the application behind `handle`.
    fn window_title(&mut self, handle: AppHandle) -> Option<String>;

    /// Seconds since the last keyboard or mouse input.
    fn idle_seconds(&mut self) -> Option<u64>;
}

/// Serves as a cross-compatible Sampler implementation.
pub struct GenericSampler {
    inner: Box<dyn Sampler>,
}

impl GenericSampler {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsSampler;
                Ok(Self {
                    inner: Box::new(WindowsSampler::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::X11Sampler;
                Ok(Self {
                    inner: Box::new(X11Sampler::new()?),
                })
            }
            else {
                Err(anyhow::anyhow!(
                    "No sampler backend was compiled in. Build with --features x11 or --features win"
                ))
            }
        }
    }
}

impl Sampler for GenericSampler {
    fn frontmost_app(&mut self) -> Option<FrontmostApp> {
        self.inner.frontmost_app()
    }

    fn window_title(&mut self, handle: AppHandle) -> Option<String> {
        self.inner.window_title(handle)
    }

    fn idle_seconds(&mut self) -> Option<u64> {
        self.inner.idle_seconds()
    }
}

/// Display name of an executable path, for example `/usr/bin/nvim` becomes `nvim`.
pub fn app_name_from_path(value: &str) -> String {
    std::path::PathBuf::from(value)
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| value.to_string())
}
