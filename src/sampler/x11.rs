use anyhow::{anyhow, Result};
use sysinfo::Pid;
use tracing::{instrument, warn};
use xcb::{
    Connection, Xid, XidNew,
    screensaver::{QueryInfo, QueryInfoReply},
    x::{
        self, ATOM_ANY, Atom, Drawable, GetProperty, GrabServer, InternAtom, UngrabServer, Window,
    },
};

use super::{AppHandle, FrontmostApp, Sampler, app_name_from_path};

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

fn get_pid(conn: &Connection, window: Window, pid_atom: Atom) -> Result<Option<u32>> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property: pid_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    Ok(result.value::<u32>().first().copied())
}

fn get_process_path(id: u32) -> Option<String> {
    let system = sysinfo::System::new_all();
    let process = system.process(Pid::from_u32(id))?;

    process
        .exe()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string())
}

fn get_active_window(conn: &Connection, root: &Window, active_window_atom: Atom) -> Result<Option<Window>> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window: *root,
        property: active_window_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    Ok(result.value::<Window>().first().copied().filter(|v| !v.is_none()))
}

/// Handles carry the X window id, so any connection can resolve them.
fn window_handle(window: Window) -> AppHandle {
    AppHandle(window.resource_id() as u64)
}

fn handle_window(handle: AppHandle) -> Option<Window> {
    let id = u32::try_from(handle.0).ok().filter(|v| *v != 0)?;
    // SAFETY: a stale id only makes the following request fail with BadWindow.
    Some(unsafe { Window::new(id) })
}

fn get_name(conn: &Connection, window: Window, wm_name_atom: Atom) -> Result<String> {
    let wm_name = conn.wait_for_reply(conn.send_request(&x::GetProperty {
        delete: false,
        window,
        property: wm_name_atom,
        r#type: x::ATOM_ANY,
        long_offset: 0,
        long_length: 1024,
    }))?;
    Ok(String::from_utf8_lossy(wm_name.value::<u8>()).into_owned())
}

/// [Sampler] for X11 sessions. Window titles come from `_NET_WM_NAME`, idle time from the
/// screensaver extension.
pub struct X11Sampler {
    connection: Connection,
    preferred_screen: i32,
    active_window_atom: Atom,
    window_name_atom: Atom,
    pid_atom: Atom,
}

impl X11Sampler {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = xcb::Connection::connect(None)?;
        let active_window_atom = intern_atom(&connection, b"_NET_ACTIVE_WINDOW")?;
        let window_name_atom = intern_atom(&connection, b"_NET_WM_NAME")?;
        let pid_atom = intern_atom(&connection, b"_NET_WM_PID")?;
        Ok(Self {
            connection,
            preferred_screen,
            active_window_atom,
            window_name_atom,
            pid_atom,
        })
    }

    fn root(&self) -> Result<Window> {
        // Currently the application only supports 1 x11 screen.
        self.connection
            .get_setup()
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .map(|v| v.root())
            .ok_or_else(|| anyhow!("Screen {} is not available", self.preferred_screen))
    }

    #[instrument(skip(self))]
    fn frontmost_inner(&self) -> Result<Option<FrontmostApp>> {
        let root = self.root()?;
        let Some(window) = get_active_window(&self.connection, &root, self.active_window_atom)?
        else {
            return Ok(None);
        };
        let Some(pid) = get_pid(&self.connection, window, self.pid_atom)? else {
            return Ok(None);
        };
        let Some(path) = get_process_path(pid) else {
            return Ok(None);
        };

        Ok(Some(FrontmostApp {
            name: app_name_from_path(&path).into(),
            bundle_id: Some(path.into()),
            handle: window_handle(window),
        }))
    }
}

impl Sampler for X11Sampler {
    #[instrument(skip(self))]
    fn frontmost_app(&mut self) -> Option<FrontmostApp> {
        let _ = self.connection.send_request(&GrabServer {});
        let result = self.frontmost_inner();
        let _ = self.connection.send_request(&UngrabServer {});
        result
            .inspect_err(|e| warn!("Failed to sample active window {e:?}"))
            .ok()
            .flatten()
    }

    #[instrument(skip(self))]
    fn window_title(&mut self, handle: AppHandle) -> Option<String> {
        let window = handle_window(handle)?;
        get_name(&self.connection, window, self.window_name_atom)
            .inspect_err(|e| warn!("Failed to read window title {e:?}"))
            .ok()
            .filter(|v| !v.is_empty())
    }

    #[instrument(skip(self))]
    fn idle_seconds(&mut self) -> Option<u64> {
        let root = self.root().ok()?;
        let idle = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(root),
        });
        let reply: QueryInfoReply = self
            .connection
            .wait_for_reply(idle)
            .inspect_err(|e| warn!("Failed to query idle time {e:?}"))
            .ok()?;
        Some(reply.ms_since_user_input() as u64 / 1000)
    }
}

#[cfg(test)]
mod tests {
    use xcb::{Xid, XidNew, x::Window};

    use super::{AppHandle, handle_window, window_handle};

    #[test]
    fn handles_resolve_without_the_sampler_that_made_them() {
        let window = unsafe { Window::new(0x0340_0007) };
        let handle = window_handle(window);
        assert_eq!(handle, AppHandle(0x0340_0007));
        assert_eq!(handle_window(handle).map(|v| v.resource_id()), Some(0x0340_0007));
    }

    #[test]
    fn invalid_handles_resolve_to_nothing() {
        assert!(handle_window(AppHandle(0)).is_none());
        assert!(handle_window(AppHandle(u64::MAX)).is_none());
    }
}
