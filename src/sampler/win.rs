use anyhow::{Result, anyhow};
use tracing::{error, warn};
use windows::{
    Win32::{
        Foundation::{BOOL, CloseHandle, GetLastError, HANDLE, HWND},
        System::{
            Diagnostics::Debug::{
                FORMAT_MESSAGE_FROM_SYSTEM,
                FORMAT_MESSAGE_IGNORE_INSERTS, FormatMessageW,
            },
            SystemInformation::GetTickCount,
            SystemServices::{LANG_ENGLISH, SUBLANG_ENGLISH_US},
            Threading::{
                OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
                QueryFullProcessImageNameW,
            },
        },
        UI::{
            Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO},
            WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId},
        },
    },
    core::PWSTR,
};

use super::{AppHandle, FrontmostApp, Sampler, app_name_from_path};

fn last_error_message() -> String {
    let err = unsafe { GetLastError() };
    let mut message_buffer = [0u16; 2048];
    let size = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            None,
            err.0,
            LANG_ENGLISH | (SUBLANG_ENGLISH_US << 10),
            PWSTR::from_raw(message_buffer.as_mut_ptr()),
            2048,
            None,
        )
    };
    String::from_utf16_lossy(&message_buffer[0..size as usize])
}

/// Returns the foreground window together with the path of the executable that owns it.
#[tracing::instrument]
fn get_foreground() -> Result<Option<(HWND, String)>> {
    let window = unsafe { GetForegroundWindow() };

    if window.is_invalid() {
        return Ok(None);
    }

    let mut id = 0u32;
    unsafe { GetWindowThreadProcessId(window, Some(&mut id)) };
    if id == 0 {
        return Err(anyhow!("Failed to get active window {}", last_error_message()));
    }
    let process_handle = unsafe {
        OpenProcess(
            PROCESS_QUERY_INFORMATION | PROCESS_VM_READ,
            BOOL::from(false),
            id,
        )
    }
    .inspect_err(|e| error!("Failed to open process {e:?}"))?;

    let mut text: [u16; 4096] = [0; 4096];
    let process_path = unsafe { get_window_process_path(process_handle, &mut text) }
        .inspect_err(|e| error!("Failed to get window process path {e:?}"));

    unsafe { CloseHandle(process_handle) }
        .inspect_err(|e| error!("Failed to close handle {e:?}"))?;

    Ok(Some((window, process_path?)))
}

unsafe fn get_window_process_path(window_handle: HANDLE, text: &mut [u16]) -> Result<String> {
    unsafe {
        let mut length = text.len() as u32;
        QueryFullProcessImageNameW(
            window_handle,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(text.as_mut_ptr()),
            &mut length,
        )?;
        Ok(String::from_utf16_lossy(&text[..length as usize]))
    }
}

unsafe fn get_window_title(window_handle: HWND, text: &mut [u16]) -> String {
    let len = unsafe { GetWindowTextW(window_handle, text) };
    String::from_utf16_lossy(&text[..len as usize])
}

/// `GetTickCount` and `LASTINPUTINFO::dwTime` share the same 32-bit counter, which wraps
/// every 49.7 days.
fn idle_millis(now: u32, last_input: u32) -> u32 {
    now.wrapping_sub(last_input)
}

/// Handles carry the raw window handle, so any sampler instance can resolve them.
fn window_handle(window: HWND) -> AppHandle {
    AppHandle(window.0 as usize as u64)
}

fn handle_window(handle: AppHandle) -> Option<HWND> {
    let window = HWND(usize::try_from(handle.0).ok()? as *mut core::ffi::c_void);
    (!window.is_invalid()).then_some(window)
}

fn get_idle_millis() -> Result<u32> {
    let mut last: LASTINPUTINFO = LASTINPUTINFO {
        cbSize: size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    let is_success = unsafe { GetLastInputInfo(&mut last) };
    if !is_success.as_bool() {
        return Err(anyhow!("Failed to retrieve user idle time {}", last_error_message()));
    }

    let tick_count = unsafe { GetTickCount() };
    Ok(idle_millis(tick_count, last.dwTime))
}

/// [Sampler] backed by the Win32 API.
#[derive(Default)]
pub struct WindowsSampler;

impl WindowsSampler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sampler for WindowsSampler {
    fn frontmost_app(&mut self) -> Option<FrontmostApp> {
        let (window, path) = get_foreground()
            .inspect_err(|e| warn!("Failed to get active window {e:?}"))
            .ok()
            .flatten()?;

        Some(FrontmostApp {
            name: app_name_from_path(&path).into(),
            bundle_id: Some(path.into()),
            handle: window_handle(window),
        })
    }

    fn window_title(&mut self, handle: AppHandle) -> Option<String> {
        let window = handle_window(handle)?;
        let mut text: [u16; 4096] = [0; 4096];
        Some(unsafe { get_window_title(window, &mut text) }).filter(|v| !v.is_empty())
    }

    fn idle_seconds(&mut self) -> Option<u64> {
        get_idle_millis()
            .inspect_err(|e| warn!("Failed to get idle time {e:?}"))
            .ok()
            .map(|v| v as u64 / 1000)
    }
}
