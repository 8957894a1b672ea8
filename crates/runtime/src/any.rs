//! The `Any` existential container: a heap box pairing a type descriptor
//! with a payload of that type.
//!
//! Layout is `[metadata pointer | payload]`. For reference-typed contents the
//! payload holds the pointer into the ARC box payload; for value-typed
//! contents the payload holds the bytes themselves. `Any` boxes are never
//! freed by the runtime.

use libc::c_void;
use std::fmt::Write;
use std::mem;
use std::ptr;

use crate::fatal::{self, rt_assert};
use crate::metadata::{self, TypeMetadata};

/// Header of an `Any` box; the payload follows it in the same allocation.
#[repr(C)]
pub struct AnyBox {
    pub type_metadata: *const TypeMetadata,
}

const HEADER_SIZE: usize = mem::size_of::<AnyBox>();

/// Allocate an `Any` box for `metadata` with an uninitialized (zero-filled)
/// payload.
///
/// # Safety
/// `metadata` must point to a valid descriptor.
pub unsafe fn create(metadata: *const TypeMetadata) -> *mut AnyBox {
    rt_assert!(!metadata.is_null());
    let size = unsafe { (*metadata).size_in_bytes() };
    let any = fatal::alloc(HEADER_SIZE + size) as *mut AnyBox;
    unsafe { (*any).type_metadata = metadata };
    any
}

/// Pointer to the payload, immediately after the header.
///
/// # Safety
/// `any` must be a box returned by [`create`].
pub unsafe fn value_ptr(any: *mut AnyBox) -> *mut c_void {
    unsafe { (any as *mut u8).add(HEADER_SIZE) as *mut c_void }
}

/// Copy an `Any` according to its contents' semantics: reference types share
/// the box, value types get fresh storage with the payload bytes copied.
///
/// # Safety
/// `any` must be a valid box with a valid descriptor.
pub unsafe fn copy(any: *mut AnyBox) -> *mut AnyBox {
    let metadata = unsafe { (*any).type_metadata };
    if unsafe { (*metadata).is_reference_type } != 0 {
        return any;
    }
    let fresh = unsafe { create(metadata) };
    unsafe {
        ptr::copy_nonoverlapping(
            value_ptr(any) as *const u8,
            value_ptr(fresh) as *mut u8,
            (*metadata).size_in_bytes(),
        );
    }
    fresh
}

/// Pointer to field `field` of the contained value. Reference-typed contents
/// are dereferenced one level first, so the offset lands inside the ARC
/// payload.
///
/// # Safety
/// `any` must be a valid box; for reference-typed contents the payload must
/// hold a live ARC payload pointer.
pub unsafe fn field_value_ptr(any: *mut AnyBox, field: u64) -> *mut c_void {
    let metadata = unsafe { (*any).type_metadata };
    let field_meta = unsafe { (*metadata).field_metadata(field) };
    let mut base = unsafe { value_ptr(any) };
    if unsafe { (*metadata).is_reference_type } != 0 {
        base = unsafe { *(base as *mut *mut c_void) };
        rt_assert!(!base.is_null());
    }
    unsafe { (base as *mut u8).add(field_meta.offset) as *mut c_void }
}

/// Extract field `field` into its own freshly allocated `Any`.
///
/// # Safety
/// Same requirements as [`field_value_ptr`].
pub unsafe fn extract_field(any: *mut AnyBox, field: u64) -> *mut AnyBox {
    let metadata = unsafe { (*any).type_metadata };
    let field_meta = unsafe { (*metadata).field_metadata(field) };
    let fresh = unsafe { create(field_meta.type_metadata) };
    unsafe {
        ptr::copy_nonoverlapping(
            field_value_ptr(any, field) as *const u8,
            value_ptr(fresh) as *mut u8,
            (*field_meta.type_metadata).size_in_bytes(),
        );
    }
    fresh
}

/// Overwrite field `field` with the value inside `new_value`. The static
/// field type must match `new_value`'s descriptor exactly.
///
/// # Safety
/// Same requirements as [`field_value_ptr`]; `new_value` must be a valid box.
pub unsafe fn update_field(any: *mut AnyBox, field: u64, new_value: *mut AnyBox) {
    let metadata = unsafe { (*any).type_metadata };
    let field_meta = unsafe { (*metadata).field_metadata(field) };
    let new_metadata = unsafe { (*new_value).type_metadata };
    if !ptr::eq(field_meta.type_metadata, new_metadata) {
        unsafe { metadata::report_cast_error(field_meta.type_metadata, new_metadata) };
    }
    unsafe {
        ptr::copy_nonoverlapping(
            value_ptr(new_value) as *const u8,
            field_value_ptr(any, field) as *mut u8,
            (*new_metadata).size_in_bytes(),
        );
    }
}

/// True iff the box's descriptor is pointer-equal to `metadata`.
///
/// # Safety
/// `any` must be a valid box.
pub unsafe fn check_types(any: *mut AnyBox, metadata: *const TypeMetadata) -> bool {
    ptr::eq(unsafe { (*any).type_metadata }, metadata)
}

/// Return the payload pointer if the descriptor matches, abort otherwise.
///
/// # Safety
/// `any` must be a valid box; `metadata` must be a valid descriptor.
pub unsafe fn checked_cast(any: *mut AnyBox, metadata: *const TypeMetadata) -> *mut c_void {
    if !unsafe { check_types(any, metadata) } {
        unsafe { metadata::report_cast_error((*any).type_metadata, metadata) };
    }
    unsafe { value_ptr(any) }
}

/// Nil test: pointer-typed contents are never nil; otherwise the first
/// machine word of the payload decides.
///
/// # Safety
/// `any` must be a valid box with a payload of at least one machine word.
pub unsafe fn is_nil(any: *mut AnyBox) -> bool {
    let metadata = unsafe { (*any).type_metadata };
    rt_assert!(!metadata.is_null());
    if unsafe { (*metadata).pointer_level } > 0 {
        return false;
    }
    unsafe { *(value_ptr(any) as *const usize) == 0 }
}

/// Render the box for debug inspection. `Int`, `Bool`, and pointer-named
/// payloads are rendered as values; other payloads are left opaque.
///
/// # Safety
/// `any` must be a valid box with a valid descriptor graph.
pub unsafe fn dump(any: *mut AnyBox) -> String {
    let metadata = unsafe { (*any).type_metadata };
    let mut out = String::new();
    let _ = writeln!(out, "AnyBox {{");
    for line in unsafe { (*metadata).dump() }.lines() {
        let _ = writeln!(out, "  {}", line);
    }
    let name = unsafe { (*metadata).name() }.to_string_lossy();
    let value = unsafe { value_ptr(any) };
    if name == "Int" {
        let _ = writeln!(out, "  value: {}", unsafe { *(value as *const i64) });
    } else if name == "Bool" {
        let _ = writeln!(out, "  value: {}", unsafe { *(value as *const u8) } != 0);
    } else if name.starts_with('*') {
        let _ = writeln!(out, "  value: {:p}", unsafe { *(value as *const *const c_void) });
    }
    out.push('}');
    out
}
