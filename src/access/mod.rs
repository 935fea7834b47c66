//! Backend-agnostic dispatch for the memory-access layer.
//!
//! Three mutually exclusive backends implement [`MemoryAccessor`]; the
//! capability probe in [`select_backend`] picks the fastest one that is
//! constructible on the current runtime and every call site routes through
//! the process-wide [`instance`].

mod native;
mod reflect;
mod unsafe_ops;

pub use self::native::NativeAccessor;
pub use self::reflect::ReflectAccessor;
pub use self::unsafe_ops::UnsafeAccessor;

use crate::{
    native as support,
    view::{Address, View, ViewKind},
};
use enum_dispatch::enum_dispatch;
use std::{
    cell::RefCell,
    sync::{
        atomic::{AtomicUsize, Ordering},
        OnceLock,
    },
};

/// Not discovered dynamically by the reflective/native backends; a known
/// approximation, not a measured value.
pub const PAGE_SIZE_DEFAULT: usize = 4096;
pub const CACHE_LINE_SIZE_DEFAULT: usize = 64;

/// The operations every backend provides. Derived-width view construction,
/// bulk operations and scalar access have call-through defaults; backends
/// override only what they can do faster.
#[enum_dispatch]
pub trait MemoryAccessor {
    fn name(&self) -> &'static str;

    fn get_page_size(&self) -> usize {
        PAGE_SIZE_DEFAULT
    }

    fn get_cache_line_size(&self) -> usize {
        CACHE_LINE_SIZE_DEFAULT
    }

    /// The native address already embedded in `view`.
    fn get_address(&self, view: &View) -> Address;

    /// A byte view over `capacity` bytes at `address`. No backing storage is
    /// allocated; the caller owns the memory's lifetime.
    fn new_byte_view(&self, address: Address, capacity: usize) -> View;

    fn new_short_view(&self, address: Address, capacity: usize) -> View {
        self.new_byte_view(address, capacity << 1).into_kind(ViewKind::Short)
    }

    fn new_char_view(&self, address: Address, capacity: usize) -> View {
        self.new_byte_view(address, capacity << 1).into_kind(ViewKind::Char)
    }

    fn new_int_view(&self, address: Address, capacity: usize) -> View {
        self.new_byte_view(address, capacity << 2).into_kind(ViewKind::Int)
    }

    fn new_long_view(&self, address: Address, capacity: usize) -> View {
        self.new_byte_view(address, capacity << 3).into_kind(ViewKind::Long)
    }

    fn new_float_view(&self, address: Address, capacity: usize) -> View {
        self.new_byte_view(address, capacity << 2).into_kind(ViewKind::Float)
    }

    fn new_double_view(&self, address: Address, capacity: usize) -> View {
        self.new_byte_view(address, capacity << 3).into_kind(ViewKind::Double)
    }

    /// Rebinds `view` in place onto `capacity` elements of its kind at
    /// `address`, severing any retention relationship with a previous
    /// parent. `capacity` counts elements, not bytes.
    ///
    /// In diagnostic builds, rebinding a byte view that owns a release hook
    /// panics: the runtime would otherwise try to free memory it does not
    /// own. Optimized builds skip the check.
    fn setup_view(&self, view: &mut View, address: Address, capacity: usize);

    fn mem_set(&self, dst: Address, value: u8, bytes: usize) {
        support::n_mem_set(dst, value, bytes);
    }

    /// Copies `bytes` bytes from `src` to `dst`.
    ///
    /// Overlap policy: each underlying transfer has memmove semantics.
    /// Disjoint regions are always copied correctly, and so are overlapping
    /// ones with `dst < src`. A forward-overlapping transfer larger than the
    /// backend's chunk size is not guaranteed.
    fn mem_copy(&self, src: Address, dst: Address, bytes: usize) {
        support::n_mem_copy(dst, src, bytes);
    }

    fn mem_get_byte(&self, ptr: Address) -> i8 {
        support::n_mem_get_byte(ptr)
    }

    fn mem_get_short(&self, ptr: Address) -> i16 {
        support::n_mem_get_short(ptr)
    }

    fn mem_get_int(&self, ptr: Address) -> i32 {
        support::n_mem_get_int(ptr)
    }

    fn mem_get_long(&self, ptr: Address) -> i64 {
        support::n_mem_get_long(ptr)
    }

    fn mem_get_float(&self, ptr: Address) -> f32 {
        support::n_mem_get_float(ptr)
    }

    fn mem_get_double(&self, ptr: Address) -> f64 {
        support::n_mem_get_double(ptr)
    }

    fn mem_get_address(&self, ptr: Address) -> Address {
        support::n_mem_get_address(ptr)
    }

    fn mem_put_byte(&self, ptr: Address, value: i8) {
        support::n_mem_put_byte(ptr, value);
    }

    fn mem_put_short(&self, ptr: Address, value: i16) {
        support::n_mem_put_short(ptr, value);
    }

    fn mem_put_int(&self, ptr: Address, value: i32) {
        support::n_mem_put_int(ptr, value);
    }

    fn mem_put_long(&self, ptr: Address, value: i64) {
        support::n_mem_put_long(ptr, value);
    }

    fn mem_put_float(&self, ptr: Address, value: f32) {
        support::n_mem_put_float(ptr, value);
    }

    fn mem_put_double(&self, ptr: Address, value: f64) {
        support::n_mem_put_double(ptr, value);
    }

    fn mem_put_address(&self, ptr: Address, value: Address) {
        support::n_mem_put_address(ptr, value);
    }
}

#[enum_dispatch(MemoryAccessor)]
pub enum Accessor {
    UnsafeAccessor,
    ReflectAccessor,
    NativeAccessor,
}

static INSTANCE: OnceLock<Accessor> = OnceLock::new();

/// The process-wide accessor, selected once on first use.
pub fn instance() -> &'static Accessor {
    INSTANCE.get_or_init(select_backend)
}

static DEGRADED_WARNINGS: AtomicUsize = AtomicUsize::new(0);

/// Attempts backends in order of preferred performance and returns the
/// first one that comes up. Never fails: the native call-through accessor
/// is always constructible. Reaching it emits a one-time warning because
/// every call will then pay the call-through overhead.
pub(crate) fn select_backend() -> Accessor {
    match UnsafeAccessor::new() {
        Ok(a) => {
            crate::access_msg!("selected privileged memory-op accessor");
            return a.into();
        }
        Err(e) => crate::access_msg!("privileged memory-op accessor unavailable: {e}"),
    }
    match ReflectAccessor::new() {
        Ok(a) => {
            crate::access_msg!("selected reflective field accessor");
            return a.into();
        }
        Err(e) => crate::access_msg!("reflective field accessor unavailable: {e}"),
    }
    if DEGRADED_WARNINGS
        .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        crate::access_warn!(
            "no accelerated memory accessor is usable on this runtime; \
             falling back to native call-through (performance will be degraded)"
        );
    }
    NativeAccessor::new().into()
}

#[cfg(test)]
pub(crate) fn degraded_warning_count() -> usize {
    DEGRADED_WARNINGS.load(Ordering::SeqCst)
}

thread_local! {
    // One template per thread: concurrent fast-path rebinds never race on a
    // shared skeleton.
    static TEMPLATE: RefCell<View> = RefCell::new(View::template());
}

/// Runs `f` against this thread's zero-capacity template view.
pub(crate) fn with_template<R>(f: impl FnOnce(&mut View) -> R) -> R {
    TEMPLATE.with(|t| f(&mut t.borrow_mut()))
}
