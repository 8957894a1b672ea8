// Small host binary that exercises the runtime's fatal paths on demand.
// Each subcommand drives one path to termination so the integration tests
// can assert on exit status and diagnostic output; `trace` and
// `dump-protocol` are the only modes that return.

use std::ffi::CString;
use std::os::raw::c_char;
use std::process;

use trill_runtime::{FieldMetadata, TypeMetadata};

fn leak_cstr(s: &str) -> *const c_char {
    CString::new(s).unwrap().into_raw() as *const c_char
}

fn leak_primitive(name: &str) -> &'static TypeMetadata {
    Box::leak(Box::new(TypeMetadata {
        name: leak_cstr(name),
        fields: std::ptr::null::<FieldMetadata>(),
        is_reference_type: 0,
        size_in_bits: 64,
        field_count: 0,
        pointer_level: 0,
    }))
}

fn leak_pair(name: &str, field_type: &'static TypeMetadata) -> &'static TypeMetadata {
    let fields = vec![
        FieldMetadata {
            name: leak_cstr("x"),
            type_metadata: field_type,
            offset: 0,
        },
        FieldMetadata {
            name: leak_cstr("y"),
            type_metadata: field_type,
            offset: 8,
        },
    ];
    let fields = Box::leak(fields.into_boxed_slice());
    Box::leak(Box::new(TypeMetadata {
        name: leak_cstr(name),
        fields: fields.as_ptr(),
        is_reference_type: 0,
        size_in_bits: 128,
        field_count: 2,
        pointer_level: 0,
    }))
}

fn main() {
    trill_runtime::trill_init();

    let mode = std::env::args().nth(1).unwrap_or_default();
    unsafe {
        match mode.as_str() {
            // Checked cast between distinct descriptors.
            "cast-mismatch" => {
                let int = leak_primitive("Int");
                let bool_meta = leak_primitive("Bool");
                let a = trill_runtime::trill_allocateAny(int);
                trill_runtime::trill_checkedCast(a, bool_meta);
            }
            // Field update where the descriptors share a name but not an
            // identity; must still be rejected.
            "update-mismatch" => {
                let field_int = leak_primitive("Int");
                let other_int = leak_primitive("Int");
                let pair = leak_pair("Pair", field_int);
                let a = trill_runtime::trill_allocateAny(pair);
                let b = trill_runtime::trill_allocateAny(other_int);
                trill_runtime::trill_updateAny(a, 0, b);
            }
            // Field lookup on a type with no fields.
            "field-oob" => {
                let int = leak_primitive("Int");
                trill_runtime::trill_getFieldMetadata(int, 0);
            }
            "release-underflow" => {
                let p = trill_runtime::trill_allocateIndirectType(8, None);
                trill_runtime::trill_release(p);
                trill_runtime::trill_release(p);
            }
            "retain-overflow" => {
                let p = trill_runtime::trill_allocateIndirectType(8, None);
                // The retain count is the first word of the 16-byte box
                // header that precedes the payload (stable ABI layout).
                let count = (p as *mut u8).sub(16) as *mut u32;
                *count = u32::MAX;
                trill_runtime::trill_retain(p);
            }
            "fatal" => {
                let message = CString::new("boom").unwrap();
                trill_runtime::trill_fatalError(message.as_ptr());
            }
            "signal" => {
                libc::raise(libc::SIGSEGV);
            }
            "trace" => {
                trill_runtime::trill_printStackTrace();
                return;
            }
            "dump-protocol" => {
                let methods: Vec<*const c_char> =
                    vec![leak_cstr("describe"), leak_cstr("compare")];
                let methods = Box::leak(methods.into_boxed_slice());
                let proto = trill_runtime::ProtocolMetadata {
                    name: leak_cstr("Printable"),
                    method_names: methods.as_ptr(),
                    method_count: methods.len(),
                };
                trill_runtime::trill_dumpProtocol(&proto);
                return;
            }
            _ => {
                eprintln!(
                    "usage: rt_check <cast-mismatch|update-mismatch|field-oob|\
                     release-underflow|retain-overflow|fatal|signal|trace|dump-protocol>"
                );
                process::exit(2);
            }
        }
    }
    // Every fatal mode should have terminated the process above.
    process::exit(3);
}
