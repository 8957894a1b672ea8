//! Reflection schema: type, field, and protocol descriptors.
//!
//! Descriptors are emitted by the compiler as read-only data in the program
//! image; the runtime only ever reads them. The `#[repr(C)]` layouts here are
//! part of the stable ABI and must match what the code generator emits.

use libc::c_char;
use std::ffi::CStr;
use std::fmt::Write;

use crate::fatal::{self, rt_assert};

/// One field of a record type: name, type, and byte offset into the payload.
#[repr(C)]
pub struct FieldMetadata {
    pub name: *const c_char,
    pub type_metadata: *const TypeMetadata,
    pub offset: usize,
}

/// A type descriptor. `size_in_bits` is the payload storage size and never
/// includes the reference-count header of indirect types.
#[repr(C)]
pub struct TypeMetadata {
    pub name: *const c_char,
    pub fields: *const FieldMetadata,
    pub is_reference_type: u8,
    pub size_in_bits: u64,
    pub field_count: u64,
    pub pointer_level: u64,
}

/// A protocol descriptor: name plus method names, used for dumping.
#[repr(C)]
pub struct ProtocolMetadata {
    pub name: *const c_char,
    pub method_names: *const *const c_char,
    pub method_count: usize,
}

impl TypeMetadata {
    /// # Safety
    /// `self.name` must point to a valid nul-terminated string, as emitted
    /// descriptors guarantee.
    pub unsafe fn name(&self) -> &CStr {
        rt_assert!(!self.name.is_null());
        unsafe { CStr::from_ptr(self.name) }
    }

    pub fn size_in_bytes(&self) -> usize {
        (self.size_in_bits / 8) as usize
    }

    /// Look up a field descriptor, aborting on an out-of-bounds index.
    ///
    /// # Safety
    /// `self.fields` must point to `self.field_count` valid descriptors.
    pub unsafe fn field_metadata(&self, index: u64) -> &FieldMetadata {
        if self.field_count <= index {
            fatal::fatal_error(&format!(
                "field index {} out of bounds for type {} with {} fields",
                index,
                unsafe { self.name() }.to_string_lossy(),
                self.field_count
            ));
        }
        unsafe { &*self.fields.add(index as usize) }
    }

    /// Render the descriptor for debug inspection.
    ///
    /// # Safety
    /// All name and field pointers in the descriptor graph must be valid.
    pub unsafe fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "TypeMetadata {{");
        let _ = writeln!(out, "  name: {:?}", unsafe { self.name() }.to_string_lossy());
        let _ = writeln!(out, "  fields: [");
        for i in 0..self.field_count {
            let field = unsafe { self.field_metadata(i) };
            let _ = writeln!(
                out,
                "    {}: {}",
                unsafe { field.name() }.to_string_lossy(),
                unsafe { (*field.type_metadata).name() }.to_string_lossy()
            );
        }
        let _ = writeln!(out, "  ]");
        let _ = writeln!(out, "  isReferenceType: {}", self.is_reference_type != 0);
        let _ = writeln!(out, "  sizeInBits: {}", self.size_in_bits);
        let _ = writeln!(out, "  fieldCount: {}", self.field_count);
        let _ = writeln!(out, "  pointerLevel: {}", self.pointer_level);
        out.push('}');
        out
    }
}

impl FieldMetadata {
    /// # Safety
    /// `self.name` must point to a valid nul-terminated string.
    pub unsafe fn name(&self) -> &CStr {
        rt_assert!(!self.name.is_null());
        unsafe { CStr::from_ptr(self.name) }
    }
}

impl ProtocolMetadata {
    /// Render the protocol as a brace block, one method per line.
    ///
    /// # Safety
    /// `self.method_names` must point to `self.method_count` valid strings.
    pub unsafe fn dump(&self) -> String {
        rt_assert!(!self.name.is_null());
        let mut out = String::new();
        let name = unsafe { CStr::from_ptr(self.name) };
        let _ = writeln!(out, "{} {{", name.to_string_lossy());
        for i in 0..self.method_count {
            let method = unsafe { *self.method_names.add(i) };
            rt_assert!(!method.is_null());
            let method = unsafe { CStr::from_ptr(method) };
            let _ = writeln!(out, "  {}", method.to_string_lossy());
        }
        out.push('}');
        out
    }
}

/// Abort with the standard cast-failure message.
pub(crate) unsafe fn report_cast_error(
    from: *const TypeMetadata,
    to: *const TypeMetadata,
) -> ! {
    let from_name = unsafe { (*from).name() }.to_string_lossy().into_owned();
    let to_name = unsafe { (*to).name() }.to_string_lossy().into_owned();
    fatal::fatal_error(&format!(
        "checked cast failed: cannot convert {} to {}",
        from_name, to_name
    ));
}
