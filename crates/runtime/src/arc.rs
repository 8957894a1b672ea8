//! Reference counting for indirect types.
//!
//! Every indirect value lives in a heap box laid out as
//! `[retain count | deinit fn | payload]`. Generated code only ever holds the
//! payload pointer; the header is recovered by subtracting its size. The
//! count is a lock-free atomic; the final release runs the deinitializer on
//! the payload and then frees the whole box.

use libc::c_void;
use std::io::{self, Write};
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering, fence};

use crate::fatal;

/// Teardown hook invoked with the payload pointer right before the box is
/// freed.
pub type Deinitializer = unsafe extern "C" fn(*mut c_void);

/// Hidden header preceding every indirect payload. `#[repr(C)]` padding puts
/// the payload at pointer alignment.
#[repr(C)]
pub struct RefCountBox {
    retain_count: AtomicU32,
    deinit: Option<Deinitializer>,
}

const HEADER_SIZE: usize = mem::size_of::<RefCountBox>();

impl RefCountBox {
    /// Recover the header from a payload pointer handed out by
    /// [`allocate_indirect`].
    #[inline]
    unsafe fn from_payload(payload: *mut c_void) -> *mut RefCountBox {
        unsafe { (payload as *mut u8).sub(HEADER_SIZE) as *mut RefCountBox }
    }

    #[inline]
    unsafe fn payload(this: *mut RefCountBox) -> *mut c_void {
        unsafe { (this as *mut u8).add(HEADER_SIZE) as *mut c_void }
    }
}

/// Allocate a box with a payload of `size` bytes and a retain count of 1.
///
/// The returned pointer addresses the payload, not the box; the payload is
/// zero-filled.
pub fn allocate_indirect(size: usize, deinit: Option<Deinitializer>) -> *mut c_void {
    let box_ptr = fatal::alloc(HEADER_SIZE + size) as *mut RefCountBox;
    unsafe {
        // Plain stores are fine before the pointer is published.
        (*box_ptr).retain_count = AtomicU32::new(1);
        (*box_ptr).deinit = deinit;
        RefCountBox::payload(box_ptr)
    }
}

/// Atomically increment the retain count of an indirect instance.
///
/// # Safety
/// `instance` must be a live payload pointer returned by
/// [`allocate_indirect`].
pub unsafe fn retain(instance: *mut c_void) {
    let header = unsafe { &*RefCountBox::from_payload(instance) };
    loop {
        let count = header.retain_count.load(Ordering::Relaxed);
        if count == u32::MAX {
            fatal::fatal_error(&format!("retain count overflowed for {:p}", instance));
        }
        match header.retain_count.compare_exchange_weak(
            count,
            count + 1,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(_) => continue,
        }
    }
}

/// Atomically decrement the retain count, deinitializing and freeing the box
/// when it reaches zero.
///
/// # Safety
/// `instance` must be a live payload pointer returned by
/// [`allocate_indirect`]. After the releasing call that drops the count to
/// zero the pointer is invalid.
pub unsafe fn release(instance: *mut c_void) {
    let box_ptr = unsafe { RefCountBox::from_payload(instance) };
    let header = unsafe { &*box_ptr };
    loop {
        let count = header.retain_count.load(Ordering::Relaxed);
        if count == 0 {
            fatal::fatal_error("attempting to release object with retain count 0");
        }
        match header.retain_count.compare_exchange_weak(
            count,
            count - 1,
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                if count == 1 {
                    // Make every write from other releasing threads visible
                    // before the payload is torn down.
                    fence(Ordering::Acquire);
                    if crate::log_enabled() {
                        let _ = writeln!(
                            io::stderr(),
                            "[trill runtime] freeing indirect instance {:p}",
                            instance
                        );
                    }
                    if let Some(deinit) = header.deinit {
                        unsafe { deinit(instance) };
                    }
                    unsafe { libc::free(box_ptr as *mut c_void) };
                }
                return;
            }
            Err(_) => continue,
        }
    }
}

/// True iff the current retain count is exactly 1, for copy-on-write checks.
///
/// # Safety
/// `instance` must be a live payload pointer returned by
/// [`allocate_indirect`].
pub unsafe fn is_uniquely_referenced(instance: *mut c_void) -> bool {
    let header = unsafe { &*RefCountBox::from_payload(instance) };
    header.retain_count.load(Ordering::SeqCst) == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    unsafe fn retain_count(instance: *mut c_void) -> u32 {
        let header = unsafe { &*RefCountBox::from_payload(instance) };
        header.retain_count.load(Ordering::SeqCst)
    }

    #[test]
    fn payload_is_zero_filled_and_pointer_aligned() {
        let p = allocate_indirect(24, None);
        assert_eq!(p as usize % mem::align_of::<*const c_void>(), 0);
        unsafe {
            for i in 0..24 {
                assert_eq!(*(p as *const u8).add(i), 0);
            }
            assert_eq!(retain_count(p), 1);
            release(p);
        }
    }

    static DEINIT_LOG: Mutex<Vec<usize>> = Mutex::new(Vec::new());

    unsafe extern "C" fn logging_deinit(p: *mut c_void) {
        DEINIT_LOG.lock().unwrap().push(p as usize);
    }

    #[test]
    fn deinit_runs_exactly_once_with_the_payload_pointer() {
        let p = allocate_indirect(16, Some(logging_deinit));
        unsafe {
            retain(p);
            retain(p);
            release(p);
            release(p);
            assert!(DEINIT_LOG.lock().unwrap().is_empty());
            release(p);
        }
        let log = DEINIT_LOG.lock().unwrap();
        assert_eq!(*log, vec![p as usize]);
    }

    #[test]
    fn release_to_zero_without_deinit_frees_quietly() {
        let p = allocate_indirect(8, None);
        unsafe { release(p) };
    }

    #[test]
    fn uniqueness_tracks_the_retain_count() {
        let p = allocate_indirect(8, None);
        unsafe {
            assert!(is_uniquely_referenced(p));
            retain(p);
            assert!(!is_uniquely_referenced(p));
            release(p);
            assert!(is_uniquely_referenced(p));
            release(p);
        }
    }

    static RACED_DEINITS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_deinit(_p: *mut c_void) {
        RACED_DEINITS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn contended_retain_release_stays_balanced() {
        struct Shared(*mut c_void);
        unsafe impl Send for Shared {}
        unsafe impl Sync for Shared {}

        let p = allocate_indirect(8, Some(counting_deinit));
        let shared = Shared(p);
        let shared = &shared;
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(move || unsafe {
                    for _ in 0..1000 {
                        retain(shared.0);
                    }
                    for _ in 0..1000 {
                        release(shared.0);
                    }
                });
            }
        });
        unsafe {
            assert_eq!(retain_count(p), 1);
            assert!(is_uniquely_referenced(p));
            assert_eq!(RACED_DEINITS.load(Ordering::SeqCst), 0);
            release(p);
        }
        assert_eq!(RACED_DEINITS.load(Ordering::SeqCst), 1);
    }
}
