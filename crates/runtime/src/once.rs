//! At-most-once initialization over a caller-owned flag cell.
//!
//! Generated code owns the 64-bit cell and must zero-initialize it. The cell
//! moves 0 -> 1 while the winning thread runs the initializer and 1 -> 2 once
//! its side effects are published; late callers wait on state 1 so every
//! return happens-after the initializer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

const INCOMPLETE: u64 = 0;
const RUNNING: u64 = 1;
const COMPLETE: u64 = 2;

/// Run `initializer` the first time this is called with a given cell.
///
/// # Safety
/// `predicate` must point to a live `u64` that was zero-initialized before
/// its first use and is only ever passed to this function afterwards.
pub unsafe fn once(predicate: *mut u64, initializer: unsafe extern "C" fn()) {
    let cell = predicate as *const AtomicU64;
    loop {
        let state = unsafe {
            (*cell).compare_exchange(INCOMPLETE, RUNNING, Ordering::Acquire, Ordering::Acquire)
        };
        match state {
            Ok(_) => {
                unsafe { initializer() };
                unsafe { (*cell).store(COMPLETE, Ordering::Release) };
                return;
            }
            Err(COMPLETE) => return,
            Err(_) => thread::yield_now(),
        }
    }
}
