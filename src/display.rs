//! Xlib/RandR access.
//!
//! Two independent connections are used: [`Backlight`] stays on the main
//! thread and answers property queries, [`XlibEvents`] is moved into the relay
//! thread and only ever waits for events. Xlib connections are not shared
//! between threads.

use crate::error::{Result, StatusError};
use crate::relay::{DisplayEvent, DisplayEventSource};
use log::{debug, warn};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::ffi::{CStr, CString};
use std::os::fd::BorrowedFd;
use std::os::raw::{c_int, c_long, c_uchar, c_ulong, c_void};
use std::ptr;
use std::sync::Once;
use x11::{xlib, xrandr};

/// Valid backlight values as advertised by the output property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklightRange {
    pub min: i64,
    pub max: i64,
}

/// Rescale a raw backlight level to 0..=100.
pub fn backlight_percent(level: i64, range: BacklightRange) -> Option<u8> {
    let span = range.max - range.min;
    if span <= 0 {
        return None;
    }
    let percent = ((level - range.min) * 100 / span).clamp(0, 100);
    u8::try_from(percent).ok()
}

/// State of a display connection socket as reported by `poll(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Readable,
    Quiet,
    Lost,
}

/// Poll a connection socket without touching Xlib.
///
/// Xlib's I/O error handler exits the process, so every blocking Xlib call
/// is preceded by this check.
pub fn poll_connection(fd: BorrowedFd<'_>, timeout: PollTimeout) -> ConnectionState {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, timeout) {
        Ok(_) => {
            let revents = fds[0].revents().unwrap_or(PollFlags::empty());
            if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL) {
                ConnectionState::Lost
            } else if revents.contains(PollFlags::POLLIN) {
                ConnectionState::Readable
            } else {
                ConnectionState::Quiet
            }
        }
        Err(nix::errno::Errno::EINTR) => ConnectionState::Quiet,
        Err(err) => {
            warn!("poll on display connection failed: {err}");
            ConnectionState::Lost
        }
    }
}

static XLIB_SETUP: Once = Once::new();

// The default Xlib handler exits the process on any protocol error, e.g. a
// key grab that another client already holds.
unsafe extern "C" fn log_x_error(_display: *mut xlib::Display, event: *mut xlib::XErrorEvent) -> c_int {
    if let Some(event) = event.as_ref() {
        warn!(
            "X protocol error {} (request {}.{})",
            event.error_code, event.request_code, event.minor_code
        );
    }
    0
}

/// Owned Xlib connection, closed on drop.
struct DisplayHandle {
    raw: *mut xlib::Display,
}

impl DisplayHandle {
    fn open() -> Result<Self> {
        // Both connections are used from different threads.
        XLIB_SETUP.call_once(|| unsafe {
            xlib::XInitThreads();
            xlib::XSetErrorHandler(Some(log_x_error));
        });

        let raw = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if raw.is_null() {
            return Err(StatusError::unavailable("display", "cannot connect to display"));
        }
        Ok(Self { raw })
    }

    fn root(&self) -> xlib::Window {
        unsafe { xlib::XDefaultRootWindow(self.raw) }
    }

    /// Event base of the RandR extension, checking for version 1.2 or later.
    fn randr_event_base(&self) -> Result<c_int> {
        let (mut event_base, mut error_base) = (0, 0);
        if unsafe { xrandr::XRRQueryExtension(self.raw, &mut event_base, &mut error_base) } == 0 {
            return Err(StatusError::unavailable("RandR", "extension not present"));
        }

        let (mut major, mut minor) = (0, 0);
        if unsafe { xrandr::XRRQueryVersion(self.raw, &mut major, &mut minor) } == 0 {
            return Err(StatusError::display("cannot query RandR version"));
        }
        if major != 1 || minor < 2 {
            return Err(StatusError::unavailable(
                "RandR",
                format!("version {major}.{minor} is too old"),
            ));
        }
        Ok(event_base)
    }

    fn intern_existing_atom(&self, name: &str) -> Result<xlib::Atom> {
        let c_name = CString::new(name).map_err(|_| StatusError::display("atom name contains NUL"))?;
        let atom = unsafe { xlib::XInternAtom(self.raw, c_name.as_ptr(), xlib::True) };
        if atom == 0 {
            return Err(StatusError::unavailable(
                "backlight",
                format!("no output has a {name} property"),
            ));
        }
        Ok(atom)
    }

    fn find_output(&self, name: &str) -> Result<xrandr::RROutput> {
        let resources = unsafe { xrandr::XRRGetScreenResources(self.raw, self.root()) };
        if resources.is_null() {
            return Err(StatusError::display("cannot get screen resources"));
        }

        let mut found = None;
        unsafe {
            let count = usize::try_from((*resources).noutput).unwrap_or(0);
            for i in 0..count {
                let output = *(*resources).outputs.add(i);
                let info = xrandr::XRRGetOutputInfo(self.raw, resources, output);
                if info.is_null() {
                    continue;
                }
                let output_name = CStr::from_ptr((*info).name).to_string_lossy().into_owned();
                xrandr::XRRFreeOutputInfo(info);
                if output_name == name {
                    found = Some(output);
                    break;
                }
            }
            xrandr::XRRFreeScreenResources(resources);
        }

        found.ok_or_else(|| StatusError::unavailable("backlight", format!("RandR output {name} not found")))
    }

    fn property_range(&self, output: xrandr::RROutput, atom: xlib::Atom) -> Result<BacklightRange> {
        let info = unsafe { xrandr::XRRQueryOutputProperty(self.raw, output, atom) };
        if info.is_null() {
            return Err(StatusError::display("cannot query brightness limit property"));
        }

        let range = unsafe {
            let limits = if (*info).range != 0 && (*info).num_values == 2 {
                let values = (*info).values;
                Some(BacklightRange {
                    min: i64::from(*values),
                    max: i64::from(*values.add(1)),
                })
            } else {
                None
            };
            xlib::XFree(info as *mut c_void);
            limits
        };

        range.ok_or_else(|| StatusError::unavailable("backlight", "could not get brightness min and max values"))
    }

    fn connection_state(&self, timeout: PollTimeout) -> ConnectionState {
        // SAFETY: the descriptor stays open for as long as the display.
        let fd = unsafe { BorrowedFd::borrow_raw(xlib::XConnectionNumber(self.raw)) };
        poll_connection(fd, timeout)
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        unsafe {
            xlib::XCloseDisplay(self.raw);
        }
    }
}

/// Query side of the display connection: reads the backlight property.
pub struct Backlight {
    display: DisplayHandle,
    output: xrandr::RROutput,
    atom: xlib::Atom,
    range: BacklightRange,
}

impl Backlight {
    pub fn open(output_name: &str, atom_name: &str) -> Result<Self> {
        let display = DisplayHandle::open()?;
        display.randr_event_base()?;
        let atom = display.intern_existing_atom(atom_name)?;
        let output = display.find_output(output_name)?;
        let range = display.property_range(output, atom)?;
        debug!("backlight on {output_name}: {}..={}", range.min, range.max);

        Ok(Self {
            display,
            output,
            atom,
            range,
        })
    }

    pub fn range(&self) -> BacklightRange {
        self.range
    }

    /// Current raw backlight value.
    pub fn level(&self) -> Result<i64> {
        if self.display.connection_state(PollTimeout::ZERO) == ConnectionState::Lost {
            return Err(StatusError::display("display connection lost"));
        }

        let mut actual_type: xlib::Atom = 0;
        let mut actual_format: c_int = 0;
        let mut nitems: c_ulong = 0;
        let mut bytes_after: c_ulong = 0;
        let mut data: *mut c_uchar = ptr::null_mut();

        let status = unsafe {
            xrandr::XRRGetOutputProperty(
                self.display.raw,
                self.output,
                self.atom,
                0,
                4,
                xlib::False,
                xlib::False,
                xlib::AnyPropertyType as xlib::Atom,
                &mut actual_type,
                &mut actual_format,
                &mut nitems,
                &mut bytes_after,
                &mut data,
            )
        };
        if status != 0 || data.is_null() {
            return Err(StatusError::display("cannot get output backlight property"));
        }

        // Format-32 property data is delivered as an array of C longs.
        let level = if actual_type == xlib::XA_INTEGER && nitems == 1 && actual_format == 32 {
            Some(i64::from(unsafe { *(data as *const c_long) }))
        } else {
            None
        };
        unsafe {
            xlib::XFree(data as *mut c_void);
        }

        level.ok_or_else(|| StatusError::display("backlight property has unexpected shape"))
    }
}

/// Event side of the display connection, owned by the relay thread.
pub struct XlibEvents {
    display: DisplayHandle,
    randr_notify: c_int,
}

// The connection is created on the main thread and then used exclusively by
// the relay thread.
unsafe impl Send for XlibEvents {}

impl XlibEvents {
    /// Subscribe to RandR output notifications and grab the given keys.
    pub fn open(keycodes: &[u8]) -> Result<Self> {
        let display = DisplayHandle::open()?;
        let event_base = display.randr_event_base()?;
        let root = display.root();

        unsafe {
            xrandr::XRRSelectInput(
                display.raw,
                root,
                xrandr::RROutputPropertyNotifyMask | xrandr::RROutputChangeNotifyMask,
            );
            for keycode in keycodes {
                xlib::XGrabKey(
                    display.raw,
                    c_int::from(*keycode),
                    xlib::AnyModifier,
                    root,
                    xlib::True,
                    xlib::GrabModeAsync,
                    xlib::GrabModeAsync,
                );
            }
            xlib::XFlush(display.raw);
        }

        Ok(Self {
            display,
            randr_notify: event_base + xrandr::RRNotify,
        })
    }

    fn decode(&self, event: xlib::XEvent) -> DisplayEvent {
        let kind = event.get_type();
        if kind == self.randr_notify {
            DisplayEvent::OutputNotify
        } else if kind == xlib::KeyRelease {
            let key = xlib::XKeyEvent::from(event);
            DisplayEvent::KeyRelease {
                keycode: u8::try_from(key.keycode).unwrap_or(0),
            }
        } else {
            DisplayEvent::Other { kind }
        }
    }

    /// Block until the connection socket is readable. `false` means it is gone.
    fn wait_readable(&self) -> bool {
        self.display.connection_state(PollTimeout::NONE) != ConnectionState::Lost
    }
}

impl DisplayEventSource for XlibEvents {
    fn next_event(&mut self) -> Option<DisplayEvent> {
        loop {
            if unsafe { xlib::XPending(self.display.raw) } > 0 {
                let mut event: xlib::XEvent = unsafe { std::mem::zeroed() };
                unsafe {
                    xlib::XNextEvent(self.display.raw, &mut event);
                }
                return Some(self.decode(event));
            }
            // Checking for hang-up first keeps Xlib's fatal I/O error handler
            // from running when the server goes away.
            if !self.wait_readable() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlight_percent_rescales_range() {
        let range = BacklightRange { min: 0, max: 976 };
        assert_eq!(backlight_percent(0, range), Some(0));
        assert_eq!(backlight_percent(488, range), Some(50));
        assert_eq!(backlight_percent(976, range), Some(100));
    }

    #[test]
    fn backlight_percent_honours_nonzero_minimum() {
        let range = BacklightRange { min: 10, max: 110 };
        assert_eq!(backlight_percent(60, range), Some(50));
        assert_eq!(backlight_percent(5, range), Some(0));
    }

    #[test]
    fn poll_connection_reports_peer_hang_up() {
        use std::io::Write;
        use std::os::fd::AsFd;
        use std::os::unix::net::UnixStream;

        let (mut server, client) = UnixStream::pair().unwrap();
        assert_eq!(poll_connection(client.as_fd(), PollTimeout::ZERO), ConnectionState::Quiet);

        server.write_all(b"x").unwrap();
        assert_eq!(poll_connection(client.as_fd(), PollTimeout::ZERO), ConnectionState::Readable);

        drop(server);
        assert_eq!(poll_connection(client.as_fd(), PollTimeout::ZERO), ConnectionState::Lost);
    }

    #[test]
    fn backlight_percent_rejects_empty_range() {
        assert_eq!(backlight_percent(3, BacklightRange { min: 7, max: 7 }), None);
    }
}
