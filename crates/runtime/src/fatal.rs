//! Fatal-error path: diagnostic banner, symbolized stack trace, signal
//! forwarding, and the zero-filling allocator.
//!
//! The runtime has a single failure mode. Every invalid input funnels into
//! [`fatal_error`], which writes `fatal error: <msg>` to stderr, prints a
//! stack trace with demangled symbols, and exits with a nonzero status.

use libc::{c_char, c_int, c_void, size_t};
use std::ffi::CStr;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

const MAX_STACK_DEPTH: usize = 256;

/// Set once the crash path has been entered. A second fault while crashing
/// terminates immediately without another trace.
static CRASHING: AtomicBool = AtomicBool::new(false);

macro_rules! rt_assert {
    ($cond:expr) => {
        if !$cond {
            $crate::fatal::assertion_failure(
                stringify!($cond),
                file!(),
                line!(),
                module_path!(),
            );
        }
    };
}
pub(crate) use rt_assert;

/// Write `fatal error: <message>` and a stack trace to stderr, then exit.
pub fn fatal_error(message: &str) -> ! {
    if CRASHING.swap(true, Ordering::SeqCst) {
        // Crashed while crashing. Do not attempt a second trace.
        unsafe { libc::_exit(1) }
    }
    let mut err = io::stderr().lock();
    let _ = writeln!(err, "fatal error: {}", message);
    write_stack_trace(&mut err);
    drop(err);
    process::exit(1);
}

/// Assertion failures report the failed expression and its location through
/// the fatal-error path.
pub fn assertion_failure(message: &str, file: &str, line: u32, function: &str) -> ! {
    fatal_error(&format!("{} at {}:{} in {}", message, file, line, function));
}

/// Allocate `size` zero-filled bytes. Aborts via [`fatal_error`] on failure;
/// the caller never sees null.
pub fn alloc(size: size_t) -> *mut c_void {
    let p = unsafe { libc::malloc(size) };
    if p.is_null() {
        fatal_error("malloc failed");
    }
    unsafe { ptr::write_bytes(p as *mut u8, 0, size) };
    p
}

/// Print the current stack trace to stderr.
pub fn print_stack_trace() {
    let mut err = io::stderr().lock();
    write_stack_trace(&mut err);
}

fn write_stack_trace(err: &mut dyn Write) {
    let _ = err.write_all(b"Current stack trace:\n");

    let mut ips: Vec<*mut c_void> = Vec::with_capacity(MAX_STACK_DEPTH);
    backtrace::trace(|frame| {
        ips.push(frame.ip());
        ips.len() < MAX_STACK_DEPTH
    });

    for (i, ip) in ips.iter().enumerate() {
        unsafe {
            let mut info: libc::Dl_info = std::mem::zeroed();
            if libc::dladdr(*ip as *const c_void, &mut info) == 0 {
                continue;
            }
            if info.dli_sname.is_null() || info.dli_saddr.is_null() {
                continue;
            }
            let raw = CStr::from_ptr(info.dli_sname).to_string_lossy();
            let symbol = demangle_frame_symbol(&raw);
            let module = if info.dli_fname.is_null() {
                String::from("???")
            } else {
                let fname = CStr::from_ptr(info.dli_fname).to_string_lossy().into_owned();
                Path::new(&fname)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or(fname)
            };
            let offset = (*ip as isize) - (info.dli_saddr as isize);
            let _ = writeln!(
                err,
                "{:<4} {:<34} 0x{:016x} {} + {}",
                i, module, info.dli_saddr as usize, symbol, offset
            );
        }
    }
}

/// Demangle a symbol for trace output: runtime-mangled names first, then the
/// host (Rust) demangler, then the raw symbol.
pub(crate) fn demangle_frame_symbol(raw: &str) -> String {
    if let Some(pretty) = crate::demangle::demangle(raw) {
        return pretty;
    }
    if let Ok(demangled) = rustc_demangle::try_demangle(raw) {
        return format!("{:#}", demangled);
    }
    raw.to_string()
}

extern "C" fn handle_signal(signum: c_int) {
    let name = unsafe {
        let s = libc::strsignal(signum);
        if s.is_null() {
            format!("signal {}", signum)
        } else {
            CStr::from_ptr(s as *const c_char).to_string_lossy().into_owned()
        }
    };
    fatal_error(&name);
}

/// Install the crash signal handlers. Installing twice is harmless.
pub fn init() {
    let handler = handle_signal as extern "C" fn(c_int);
    unsafe {
        libc::signal(libc::SIGABRT, handler as libc::sighandler_t);
        libc::signal(libc::SIGSEGV, handler as libc::sighandler_t);
        libc::signal(libc::SIGILL, handler as libc::sighandler_t);
    }
    if crate::log_enabled() {
        let _ = writeln!(io::stderr(), "[trill runtime] signal handlers installed");
    }
}
