//! C ABI exports. This module centralizes every C-callable symbol
//! (`#[unsafe(no_mangle)] extern "C"` functions) so the public ABI stays easy
//! to audit; each export is a thin façade over a component module.
#![allow(non_snake_case)]

use libc::{c_char, c_int, c_void, size_t};
use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::ptr;

use crate::any::AnyBox;
use crate::arc::Deinitializer;
use crate::fatal::rt_assert;
use crate::generics::GenericBox;
use crate::metadata::{FieldMetadata, ProtocolMetadata, TypeMetadata};
use crate::{any, arc, demangle, fatal, generics, once};

// --- Process setup and failure ---

#[unsafe(no_mangle)]
pub extern "C" fn trill_init() {
    fatal::init();
}

#[unsafe(no_mangle)]
pub extern "C" fn trill_alloc(size: size_t) -> *mut c_void {
    fatal::alloc(size)
}

/// # Safety
/// `message` must be a valid nul-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_fatalError(message: *const c_char) -> ! {
    rt_assert!(!message.is_null());
    let message = unsafe { CStr::from_ptr(message) }.to_string_lossy();
    fatal::fatal_error(&message)
}

#[unsafe(no_mangle)]
pub extern "C" fn trill_printStackTrace() {
    fatal::print_stack_trace();
}

/// # Safety
/// All three string arguments must be valid nul-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_assertionFailure(
    message: *const c_char,
    file: *const c_char,
    line: c_int,
    function: *const c_char,
) -> ! {
    let message = unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned();
    let file = unsafe { CStr::from_ptr(file) }.to_string_lossy().into_owned();
    let function = unsafe { CStr::from_ptr(function) }.to_string_lossy().into_owned();
    fatal::assertion_failure(&message, &file, line as u32, &function)
}

/// # Safety
/// See [`once::once`]: the cell must be caller-owned and zero-initialized.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_once(predicate: *mut u64, initializer: unsafe extern "C" fn()) {
    rt_assert!(!predicate.is_null());
    unsafe { once::once(predicate, initializer) }
}

// --- ARC ---

#[unsafe(no_mangle)]
pub extern "C" fn trill_allocateIndirectType(
    size: size_t,
    deinit: Option<Deinitializer>,
) -> *mut c_void {
    arc::allocate_indirect(size, deinit)
}

/// # Safety
/// `instance` must be a live payload pointer from
/// `trill_allocateIndirectType`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_retain(instance: *mut c_void) {
    rt_assert!(!instance.is_null());
    unsafe { arc::retain(instance) }
}

/// # Safety
/// `instance` must be a live payload pointer from
/// `trill_allocateIndirectType`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_release(instance: *mut c_void) {
    rt_assert!(!instance.is_null());
    unsafe { arc::release(instance) }
}

/// # Safety
/// `instance` must be a live payload pointer from
/// `trill_allocateIndirectType`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_isUniquelyReferenced(instance: *mut c_void) -> bool {
    rt_assert!(!instance.is_null());
    unsafe { arc::is_uniquely_referenced(instance) }
}

/// Placeholder: deinitializers are attached at allocation time.
#[unsafe(no_mangle)]
pub extern "C" fn trill_registerDeinitializer(
    _object: *mut c_void,
    _deinitializer: Option<Deinitializer>,
) {
}

// --- Type metadata ---

/// # Safety
/// `type_meta` must point to a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getTypeName(type_meta: *const TypeMetadata) -> *const c_char {
    rt_assert!(!type_meta.is_null());
    unsafe { (*type_meta).name }
}

/// # Safety
/// `type_meta` must point to a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getTypeSizeInBits(type_meta: *const TypeMetadata) -> u64 {
    rt_assert!(!type_meta.is_null());
    unsafe { (*type_meta).size_in_bits }
}

/// # Safety
/// `type_meta` must point to a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getTypePointerLevel(type_meta: *const TypeMetadata) -> u64 {
    rt_assert!(!type_meta.is_null());
    unsafe { (*type_meta).pointer_level }
}

/// # Safety
/// `type_meta` must point to a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_isReferenceType(type_meta: *const TypeMetadata) -> u8 {
    rt_assert!(!type_meta.is_null());
    unsafe { (*type_meta).is_reference_type }
}

/// # Safety
/// `type_meta` must point to a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getTypeFieldCount(type_meta: *const TypeMetadata) -> u64 {
    rt_assert!(!type_meta.is_null());
    unsafe { (*type_meta).field_count }
}

/// # Safety
/// `type_meta` must point to a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getFieldMetadata(
    type_meta: *const TypeMetadata,
    field: u64,
) -> *const FieldMetadata {
    rt_assert!(!type_meta.is_null());
    unsafe { (*type_meta).field_metadata(field) }
}

/// # Safety
/// `field_meta` must point to a valid field descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getFieldName(field_meta: *const FieldMetadata) -> *const c_char {
    rt_assert!(!field_meta.is_null());
    unsafe { (*field_meta).name }
}

/// # Safety
/// `field_meta` must point to a valid field descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getFieldType(
    field_meta: *const FieldMetadata,
) -> *const TypeMetadata {
    rt_assert!(!field_meta.is_null());
    unsafe { (*field_meta).type_metadata }
}

/// # Safety
/// `field_meta` must point to a valid field descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getFieldOffset(field_meta: *const FieldMetadata) -> size_t {
    rt_assert!(!field_meta.is_null());
    unsafe { (*field_meta).offset }
}

/// # Safety
/// `proto` must point to a valid protocol descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_dumpProtocol(proto: *const ProtocolMetadata) {
    rt_assert!(!proto.is_null());
    let rendered = unsafe { (*proto).dump() };
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{}", rendered);
}

// --- Any ---

/// # Safety
/// `type_meta` must point to a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_allocateAny(type_meta: *const TypeMetadata) -> *mut AnyBox {
    rt_assert!(!type_meta.is_null());
    unsafe { any::create(type_meta) }
}

/// # Safety
/// `any_value` must be a valid `Any` box.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_copyAny(any_value: *mut AnyBox) -> *mut AnyBox {
    rt_assert!(!any_value.is_null());
    unsafe { any::copy(any_value) }
}

/// # Safety
/// `any_value` must be a valid `Any` box.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getAnyValuePtr(any_value: *mut AnyBox) -> *mut c_void {
    rt_assert!(!any_value.is_null());
    unsafe { any::value_ptr(any_value) }
}

/// # Safety
/// `any_value` must be a valid `Any` box.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getAnyTypeMetadata(
    any_value: *mut AnyBox,
) -> *const TypeMetadata {
    rt_assert!(!any_value.is_null());
    unsafe { (*any_value).type_metadata }
}

/// # Safety
/// `any_value` must be a valid `Any` box; reference-typed contents must hold
/// a live ARC payload pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_getAnyFieldValuePtr(
    any_value: *mut AnyBox,
    field: u64,
) -> *mut c_void {
    rt_assert!(!any_value.is_null());
    unsafe { any::field_value_ptr(any_value, field) }
}

/// # Safety
/// Same requirements as `trill_getAnyFieldValuePtr`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_extractAnyField(
    any_value: *mut AnyBox,
    field: u64,
) -> *mut AnyBox {
    rt_assert!(!any_value.is_null());
    unsafe { any::extract_field(any_value, field) }
}

/// # Safety
/// Same requirements as `trill_getAnyFieldValuePtr`; `new_any` must be a
/// valid `Any` box.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_updateAny(
    any_value: *mut AnyBox,
    field: u64,
    new_any: *mut AnyBox,
) {
    rt_assert!(!any_value.is_null());
    rt_assert!(!new_any.is_null());
    unsafe { any::update_field(any_value, field, new_any) }
}

/// # Safety
/// `any_value` must be a valid `Any` box; `type_metadata` a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_checkTypes(
    any_value: *mut AnyBox,
    type_metadata: *const TypeMetadata,
) -> u8 {
    rt_assert!(!any_value.is_null());
    rt_assert!(!type_metadata.is_null());
    unsafe { any::check_types(any_value, type_metadata) as u8 }
}

/// # Safety
/// `any_value` must be a valid `Any` box; `type_metadata` a valid descriptor.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_checkedCast(
    any_value: *mut AnyBox,
    type_metadata: *const TypeMetadata,
) -> *mut c_void {
    rt_assert!(!any_value.is_null());
    rt_assert!(!type_metadata.is_null());
    unsafe { any::checked_cast(any_value, type_metadata) }
}

/// # Safety
/// `any_value` must be a valid `Any` box.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_anyIsNil(any_value: *mut AnyBox) -> u8 {
    rt_assert!(!any_value.is_null());
    unsafe { any::is_nil(any_value) as u8 }
}

// --- Generics ---

/// # Safety
/// `type_metadata` must be a valid descriptor and `witness_table` the
/// protocol method table for that type.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_createGenericBox(
    type_metadata: *const TypeMetadata,
    witness_table: *const *const c_void,
) -> *mut GenericBox {
    unsafe { generics::create_generic_box(type_metadata, witness_table) }
}

/// # Safety
/// `generic` must be a box from `trill_createGenericBox`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_genericBoxValuePtr(generic: *mut GenericBox) -> *mut c_void {
    unsafe { generics::generic_box_value_ptr(generic) }
}

// --- Demangling ---

/// Demangle a runtime symbol into a freshly allocated C string, or null if
/// the symbol is not a well-formed mangled name. The caller owns the string.
///
/// # Safety
/// `symbol` must be a valid nul-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn trill_demangle(symbol: *const c_char) -> *mut c_char {
    rt_assert!(!symbol.is_null());
    let Ok(symbol) = unsafe { CStr::from_ptr(symbol) }.to_str() else {
        return ptr::null_mut();
    };
    match demangle::demangle(symbol) {
        Some(pretty) => match CString::new(pretty) {
            Ok(pretty) => pretty.into_raw(),
            Err(_) => ptr::null_mut(),
        },
        None => ptr::null_mut(),
    }
}
