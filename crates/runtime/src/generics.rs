//! Witness boxes for protocol-constrained generics.
//!
//! Layout is `[metadata | witness table | payload]`. The box carries no
//! retain count; generated code governs its lifetime.

use libc::c_void;
use std::mem;

use crate::fatal::{self, rt_assert};
use crate::metadata::TypeMetadata;

#[repr(C)]
pub struct GenericBox {
    pub type_metadata: *const TypeMetadata,
    pub witness_table: *const *const c_void,
}

const HEADER_SIZE: usize = mem::size_of::<GenericBox>();

/// Allocate a witness box for `metadata`, dispatching through
/// `witness_table`.
///
/// # Safety
/// `metadata` must point to a valid descriptor and `witness_table` to the
/// protocol's method table for that type.
pub unsafe fn create_generic_box(
    metadata: *const TypeMetadata,
    witness_table: *const *const c_void,
) -> *mut GenericBox {
    rt_assert!(!metadata.is_null());
    rt_assert!(!witness_table.is_null());
    let size = unsafe { (*metadata).size_in_bytes() };
    let generic = fatal::alloc(HEADER_SIZE + size) as *mut GenericBox;
    unsafe {
        (*generic).type_metadata = metadata;
        (*generic).witness_table = witness_table;
    }
    generic
}

/// Pointer to the payload, immediately after the two descriptor words.
///
/// # Safety
/// `generic` must be a box returned by [`create_generic_box`].
pub unsafe fn generic_box_value_ptr(generic: *mut GenericBox) -> *mut c_void {
    rt_assert!(!generic.is_null());
    unsafe { (generic as *mut u8).add(HEADER_SIZE) as *mut c_void }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn box_carries_metadata_witnesses_and_payload() {
        let int = testutil::int_type();
        let witnesses: [*const c_void; 2] = [std::ptr::null(), std::ptr::null()];
        unsafe {
            let generic = create_generic_box(int, witnesses.as_ptr());
            assert!(std::ptr::eq((*generic).type_metadata, int));
            assert_eq!((*generic).witness_table, witnesses.as_ptr());

            let value = generic_box_value_ptr(generic);
            assert_eq!(value as usize, generic as usize + HEADER_SIZE);
            *(value as *mut i64) = 21;
            assert_eq!(*(value as *const i64), 21);
        }
    }
}
