//! Native support layer.
//!
//! This is the always-available call-through boundary the accessors fall
//! back on: bulk memory operations bound from the C runtime, scalar
//! load/store primitives, view fabrication, and the platform byte order.
//!
//! The bulk-op symbols are resolved from the current process image at first
//! use; if resolution fails the statically linked `libc` bindings take over,
//! so the layer can never fail to come up.

use crate::{
    error::Error,
    view::{Address, View},
};
use std::{
    ffi::{c_int, c_void},
    ptr,
    sync::OnceLock,
};

type MemsetFn = unsafe extern "C" fn(*mut c_void, c_int, usize) -> *mut c_void;
type MemmoveFn = unsafe extern "C" fn(*mut c_void, *const c_void, usize) -> *mut c_void;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

pub fn native_order() -> ByteOrder {
    if cfg!(target_endian = "little") {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    }
}

struct Support {
    // Keeps the dlopen handle alive for as long as the raw symbols are used.
    #[cfg(unix)]
    _library: Option<libloading::os::unix::Library>,
    memset: MemsetFn,
    memmove: MemmoveFn,
    source: &'static str,
}

static SUPPORT: OnceLock<Support> = OnceLock::new();

fn support() -> &'static Support {
    SUPPORT.get_or_init(|| match dynamic_support() {
        Ok(s) => s,
        Err(e) => {
            crate::access_msg!("{e}; using static libc bindings");
            static_support()
        }
    })
}

#[cfg(unix)]
fn dynamic_support() -> Result<Support, Error> {
    use libloading::os::unix::Library;

    let library = Library::this();
    let memset = unsafe { library.get::<MemsetFn>(b"memset\0") }
        .map_err(|_| Error::SymbolUnavailable("memset"))?;
    let memmove = unsafe { library.get::<MemmoveFn>(b"memmove\0") }
        .map_err(|_| Error::SymbolUnavailable("memmove"))?;
    Ok(Support {
        memset: *memset,
        memmove: *memmove,
        _library: Some(library),
        source: "process image",
    })
}

#[cfg(not(unix))]
fn dynamic_support() -> Result<Support, Error> {
    Err(Error::SymbolUnavailable("memset"))
}

fn static_support() -> Support {
    Support {
        #[cfg(unix)]
        _library: None,
        memset: libc::memset,
        memmove: libc::memmove,
        source: "static libc",
    }
}

/// Where the bulk-op symbols were bound from. Diagnostic only.
pub fn support_source() -> &'static str {
    support().source
}

pub fn n_new_view(address: Address, capacity: usize) -> View {
    View::wrap(address, capacity)
}

pub fn n_get_address(view: &View) -> Address {
    view.address()
}

pub fn n_mem_set(dst: Address, value: u8, bytes: usize) {
    let support = support();
    unsafe {
        (support.memset)(dst as usize as *mut c_void, value as c_int, bytes);
    }
}

/// memmove semantics: overlapping regions are handled for a single
/// unchunked transfer.
pub fn n_mem_copy(dst: Address, src: Address, bytes: usize) {
    let support = support();
    unsafe {
        (support.memmove)(
            dst as usize as *mut c_void,
            src as usize as *const c_void,
            bytes,
        );
    }
}

macro_rules! scalar_call_through {
    ($get:ident, $put:ident, $t:ty) => {
        pub fn $get(ptr: Address) -> $t {
            unsafe { ptr::read_unaligned(ptr as usize as *const $t) }
        }

        pub fn $put(ptr: Address, value: $t) {
            unsafe { ptr::write_unaligned(ptr as usize as *mut $t, value) }
        }
    };
}

scalar_call_through!(n_mem_get_byte, n_mem_put_byte, i8);
scalar_call_through!(n_mem_get_short, n_mem_put_short, i16);
scalar_call_through!(n_mem_get_int, n_mem_put_int, i32);
scalar_call_through!(n_mem_get_long, n_mem_put_long, i64);
scalar_call_through!(n_mem_get_float, n_mem_put_float, f32);
scalar_call_through!(n_mem_get_double, n_mem_put_double, f64);

pub fn n_mem_get_address(ptr: Address) -> Address {
    unsafe { ptr::read_unaligned(ptr as usize as *const usize) as Address }
}

pub fn n_mem_put_address(ptr: Address, value: Address) {
    unsafe { ptr::write_unaligned(ptr as usize as *mut usize, value as usize) }
}
