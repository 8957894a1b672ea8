//! Builders for descriptor graphs used across the unit tests.
//!
//! Real descriptors are read-only data in the program image, so the builders
//! leak everything they allocate; each call returns a fresh descriptor with
//! its own identity, which the identity-sensitive tests rely on.

use libc::c_char;
use std::ffi::CString;

use crate::metadata::{FieldMetadata, ProtocolMetadata, TypeMetadata};

pub(crate) fn leak_cstr(s: &str) -> *const c_char {
    CString::new(s).unwrap().into_raw() as *const c_char
}

fn leak_type(
    name: &str,
    fields: Vec<FieldMetadata>,
    is_reference_type: u8,
    size_in_bits: u64,
    pointer_level: u64,
) -> &'static TypeMetadata {
    let field_count = fields.len() as u64;
    let fields = Box::leak(fields.into_boxed_slice());
    Box::leak(Box::new(TypeMetadata {
        name: leak_cstr(name),
        fields: fields.as_ptr(),
        is_reference_type,
        size_in_bits,
        field_count,
        pointer_level,
    }))
}

/// A fresh 64-bit `Int` descriptor.
pub(crate) fn int_type() -> &'static TypeMetadata {
    leak_type("Int", Vec::new(), 0, 64, 0)
}

/// A fresh `*Int` descriptor.
pub(crate) fn int_pointer_type() -> &'static TypeMetadata {
    leak_type("*Int", Vec::new(), 0, 64, 1)
}

/// A fresh value-typed `Point { x: Int @0, y: Int @8 }` descriptor.
pub(crate) fn point_type() -> &'static TypeMetadata {
    point_like("Point", 0)
}

/// A fresh reference-typed point descriptor; `Any` payloads for it hold a
/// pointer into an ARC box payload carrying the two fields.
pub(crate) fn ref_point_type() -> &'static TypeMetadata {
    point_like("PointRef", 1)
}

fn point_like(name: &str, is_reference_type: u8) -> &'static TypeMetadata {
    // Both fields share one Int descriptor, the way emitted metadata shares
    // descriptors per type.
    let int = int_type();
    let fields = vec![
        FieldMetadata {
            name: leak_cstr("x"),
            type_metadata: int,
            offset: 0,
        },
        FieldMetadata {
            name: leak_cstr("y"),
            type_metadata: int,
            offset: 8,
        },
    ];
    leak_type(name, fields, is_reference_type, 128, 0)
}

/// A fresh protocol descriptor named `Printable` with the given methods.
pub(crate) fn protocol(methods: &[&str]) -> &'static ProtocolMetadata {
    let names: Vec<*const c_char> = methods.iter().map(|m| leak_cstr(m)).collect();
    let method_count = names.len();
    let names = Box::leak(names.into_boxed_slice());
    Box::leak(Box::new(ProtocolMetadata {
        name: leak_cstr("Printable"),
        method_names: names.as_ptr(),
        method_count,
    }))
}
