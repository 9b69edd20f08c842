//! The invocation currently being served on this thread.
//!
//! While a wrapped handler runs, its [`Context`] is installed here so that
//! log lines written from anywhere in the handler can be tagged with the
//! request id.

use std::cell::RefCell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lambda_runtime::Context;

thread_local! {
    static CURRENT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

struct Restore(Option<Context>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

/// Runs `f` with `context` installed as the thread's current invocation.
///
/// The previous invocation (if any) is restored afterwards, including when
/// `f` unwinds.
pub fn scope<R, F: FnOnce() -> R>(context: &Context, f: F) -> R {
    let previous = CURRENT.with(|current| current.replace(Some(context.clone())));
    let _guard = Restore(previous);
    f()
}

/// Calls `f` with the thread's current invocation.
pub fn with_current<R, F: FnOnce(Option<&Context>) -> R>(f: F) -> R {
    CURRENT.with(|current| f(current.borrow().as_ref()))
}

/// A copy of the thread's current invocation.
pub fn current() -> Option<Context> {
    with_current(|context| context.cloned())
}

/// Time left before the invocation's deadline, zero once it has passed.
///
/// `None` when the runtime reported no deadline.
pub fn remaining(context: &Context) -> Option<Duration> {
    if context.deadline == 0 {
        return None;
    }
    let deadline = UNIX_EPOCH + Duration::from_millis(context.deadline);
    Some(deadline.duration_since(SystemTime::now()).unwrap_or_default())
}
