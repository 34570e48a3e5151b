//! Panic detail capture for engine managed threads.
//!
//! A caught panic payload only carries the message. The location and the
//! backtrace are only known inside the panic hook, so a hook installed once
//! for the whole process stores them in a thread local from where the code
//! that caught the unwind can pick them up.

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    cell::{Cell, RefCell},
    fmt::{self, Display},
    panic::{self, PanicHookInfo},
    sync::Once,
};

thread_local! {
    static MANAGED: Cell<bool> = const { Cell::new(false) };
    static PANIC_DETAIL: RefCell<Option<PanicDetail>> = const { RefCell::new(None) };
}

/// Everything the panic hook knew about the last panic on this thread.
#[derive(Debug)]
pub struct PanicDetail {
    pub location: Option<String>,
    pub backtrace: Backtrace,
}

impl PanicDetail {
    fn from_hook(info: &PanicHookInfo<'_>) -> Self {
        Self {
            location: info.location().map(|location| location.to_string()),
            backtrace: Backtrace::capture(),
        }
    }
}

impl Display for PanicDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "at {location}")?;
        }
        if self.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\n{}", self.backtrace)?;
        }
        Ok(())
    }
}

/// Install the capturing panic hook, once per process.
///
/// Threads that are not managed by the engine keep getting the previous hook.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| match MANAGED.get() {
            true => PANIC_DETAIL.set(Some(PanicDetail::from_hook(info))),
            false => previous(info),
        }));
    });
}

/// Take the detail recorded for the last panic on this thread.
pub fn take_panic_detail() -> Option<PanicDetail> {
    PANIC_DETAIL.take()
}

/// Convert a panic payload into a string.
///
/// This matches the common payload types produced by `panic!` (`&'static str` and `String`).
/// Other payload types are formatted as a generic placeholder.
pub fn payload_as_string(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("Box<dyn Any>"))
}

/// Marks the current thread as engine managed while alive.
///
/// Panics on managed threads are captured silently instead of being printed.
pub struct ManagedThreadGuard(bool);

impl ManagedThreadGuard {
    pub fn enter() -> Self {
        install_panic_hook();
        Self(MANAGED.replace(true))
    }
}

impl Drop for ManagedThreadGuard {
    fn drop(&mut self) {
        MANAGED.set(self.0);
    }
}
