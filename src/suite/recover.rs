//! The recovery boundary around every hook and test body.

use std::panic::{self, AssertUnwindSafe, catch_unwind};

use crate::{
    capture::{self, ManagedThreadGuard},
    handle::TestHandle,
};

/// Call `f`, turning a panic into a failure of the node behind `t`.
///
/// A panic is reported with its message, location and (if enabled via
/// `RUST_BACKTRACE`) backtrace, then the node is stopped with
/// [`fail_now`](TestHandle::fail_now). Nothing else of the node's chain runs,
/// its cleanups and every other node are unaffected.
///
/// Control unwinds of the engine (skip, fail now) are passed on untouched.
pub fn guard<H, R, F>(t: &H, f: F) -> R
where
    H: TestHandle,
    F: FnOnce() -> R,
{
    let result = {
        let _managed = ManagedThreadGuard::enter();
        catch_unwind(AssertUnwindSafe(f))
    };

    match result {
        Ok(value) => value,
        Err(payload) if H::is_exit(payload.as_ref()) => panic::resume_unwind(payload),
        Err(payload) => {
            let message = capture::payload_as_string(payload.as_ref());
            match capture::take_panic_detail() {
                Some(detail) => t.error(&format!("test panicked: {message}\n{detail}")),
                None => t.error(&format!("test panicked: {message}")),
            }
            t.fail_now()
        }
    }
}
