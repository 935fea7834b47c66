use crate::{
    access::{with_template, MemoryAccessor, PAGE_SIZE_DEFAULT},
    error::Error,
    view::{Address, ReleaseHook, View, ViewKind},
};
use std::{env, mem, ptr, sync::Arc};

/// Limits the number of bytes affected per bulk operation (set & copy). The
/// limit bounds the duration of any single uninterruptible transfer so a
/// very large one cannot starve the runtime's pause points.
const BULK_OP_THRESHOLD: i64 = 0x10_0000; // 1 MiB

/// Preferred backend: rebinds views by patching their internal fields at
/// byte offsets computed once at construction, and serves scalar and bulk
/// memory operations with direct load/store primitives instead of the
/// native call-through.
///
/// Construction computes the offsets of the address/capacity/parent/release
/// fields and validates them by patching a scratch view and reading the
/// result back; any mismatch rejects the backend so the capability probe
/// can fall back.
pub struct UnsafeAccessor {
    address_offset: usize,
    capacity_offset: usize,
    parent_offset: usize,
    release_offset: usize,
    page_size: usize,
}

impl UnsafeAccessor {
    pub fn new() -> Result<Self, Error> {
        if env::var_os("MEMACCESS_NO_UNSAFE").is_some_and(|v| !v.is_empty()) {
            return Err(Error::Disabled("MEMACCESS_NO_UNSAFE"));
        }
        Self::probe()
    }

    pub(crate) fn probe() -> Result<Self, Error> {
        let accessor = UnsafeAccessor {
            address_offset: mem::offset_of!(View, address),
            capacity_offset: mem::offset_of!(View, capacity),
            parent_offset: mem::offset_of!(View, parent),
            release_offset: mem::offset_of!(View, release),
            page_size: query_page_size(),
        };
        accessor.validate()?;
        Ok(accessor)
    }

    unsafe fn field_mut<T>(view: &mut View, offset: usize) -> *mut T {
        (view as *mut View as *mut u8).add(offset) as *mut T
    }

    unsafe fn field<T>(view: &View, offset: usize) -> *const T {
        (view as *const View as *const u8).add(offset) as *const T
    }

    fn put_address(&self, view: &mut View, address: Address) {
        unsafe { *Self::field_mut::<Address>(view, self.address_offset) = address }
    }

    fn put_capacity(&self, view: &mut View, capacity: usize) {
        unsafe { *Self::field_mut::<usize>(view, self.capacity_offset) = capacity }
    }

    /// Generic offset read; `get_address` prefers the view's direct
    /// accessor and this is the fallback path (also used for validation).
    fn read_address(&self, view: &View) -> Address {
        unsafe { *Self::field::<Address>(view, self.address_offset) }
    }

    fn read_capacity(&self, view: &View) -> usize {
        unsafe { *Self::field::<usize>(view, self.capacity_offset) }
    }

    fn clear_parent(&self, view: &mut View) {
        // Assignment through the typed place drops the previous Arc.
        unsafe { *Self::field_mut::<Option<Arc<View>>>(view, self.parent_offset) = None }
    }

    fn owns_release(&self, view: &View) -> bool {
        unsafe { (*Self::field::<Option<ReleaseHook>>(view, self.release_offset)).is_some() }
    }

    /// The stable-layout precondition, checked rather than assumed.
    fn validate(&self) -> Result<(), Error> {
        let mut scratch = View::wrap(0, 0);
        self.put_address(&mut scratch, 0x5afe_0add);
        if scratch.address() != 0x5afe_0add || self.read_address(&scratch) != 0x5afe_0add {
            return Err(Error::UnsupportedLayout("address field offset"));
        }
        self.put_capacity(&mut scratch, 24);
        if scratch.capacity() != 24 || self.read_capacity(&scratch) != 24 {
            return Err(Error::UnsupportedLayout("capacity field offset"));
        }

        let base = Arc::new(View::wrap(0x1000, 64));
        for kind in ViewKind::ALL {
            let mut sample = View::derive(&base, kind);
            match &sample.parent {
                Some(p) if Arc::ptr_eq(p, &base) => {}
                _ => return Err(Error::UnsupportedLayout("parent field offset")),
            }
            self.clear_parent(&mut sample);
            if sample.parent().is_some() {
                return Err(Error::UnsupportedLayout("parent field offset"));
            }
        }

        let hooked = View::with_release(0x1000, 0, |_, _| {});
        if !self.owns_release(&hooked) || self.owns_release(&base) {
            return Err(Error::UnsupportedLayout("release hook field offset"));
        }
        Ok(())
    }
}

impl MemoryAccessor for UnsafeAccessor {
    fn name(&self) -> &'static str {
        "unsafe"
    }

    fn get_page_size(&self) -> usize {
        self.page_size
    }

    fn get_address(&self, view: &View) -> Address {
        // The view type exposes a direct address accessor; no offset read
        // is needed on the hot path.
        view.address()
    }

    fn new_byte_view(&self, address: Address, capacity: usize) -> View {
        with_template(|template| {
            self.put_address(template, address);
            self.put_capacity(template, capacity);
            // Similar to setup_view below, except the parent field is left
            // untouched: the template is never itself a derived child, so
            // the write would be wasted.
            template.reset_state();
            template.clone()
        })
    }

    fn setup_view(&self, view: &mut View, address: Address, capacity: usize) {
        #[cfg(debug_assertions)]
        if view.kind() == ViewKind::Byte && self.owns_release(view) {
            // If this were allowed, the view's own allocation might never be
            // freed, and the hook would later free memory it does not own.
            panic!("views that own a release hook cannot be rebound");
        }

        self.put_address(view, address);
        self.put_capacity(view, capacity);
        self.clear_parent(view);
        view.reset_state();
    }

    fn mem_set(&self, dst: Address, value: u8, bytes: usize) {
        // Batched so a large set cannot monopolize an uninterruptible span.
        // The loop operates before testing the exit condition: the previous
        // iteration has already performed the full final batch by the time
        // the remainder goes negative.
        let mut bytes = bytes as i64;
        let mut dst = dst;
        loop {
            let batch = if BULK_OP_THRESHOLD < bytes {
                BULK_OP_THRESHOLD
            } else {
                bytes
            };
            unsafe { ptr::write_bytes(dst as usize as *mut u8, value, batch as usize) };

            bytes -= BULK_OP_THRESHOLD;
            if bytes < 0 {
                break;
            }

            dst += BULK_OP_THRESHOLD as Address;
        }
    }

    fn mem_copy(&self, src: Address, dst: Address, bytes: usize) {
        // Batched like mem_set. Each batch has memmove semantics, so see
        // the trait-level overlap policy for transfers above one batch.
        let mut bytes = bytes as i64;
        let mut src = src;
        let mut dst = dst;
        loop {
            let batch = if BULK_OP_THRESHOLD < bytes {
                BULK_OP_THRESHOLD
            } else {
                bytes
            };
            unsafe {
                ptr::copy(
                    src as usize as *const u8,
                    dst as usize as *mut u8,
                    batch as usize,
                )
            };

            bytes -= BULK_OP_THRESHOLD;
            if bytes < 0 {
                break;
            }

            src += BULK_OP_THRESHOLD as Address;
            dst += BULK_OP_THRESHOLD as Address;
        }
    }

    fn mem_get_byte(&self, ptr: Address) -> i8 {
        unsafe { ptr::read_unaligned(ptr as usize as *const i8) }
    }

    fn mem_get_short(&self, ptr: Address) -> i16 {
        unsafe { ptr::read_unaligned(ptr as usize as *const i16) }
    }

    fn mem_get_int(&self, ptr: Address) -> i32 {
        unsafe { ptr::read_unaligned(ptr as usize as *const i32) }
    }

    fn mem_get_long(&self, ptr: Address) -> i64 {
        unsafe { ptr::read_unaligned(ptr as usize as *const i64) }
    }

    fn mem_get_float(&self, ptr: Address) -> f32 {
        unsafe { ptr::read_unaligned(ptr as usize as *const f32) }
    }

    fn mem_get_double(&self, ptr: Address) -> f64 {
        unsafe { ptr::read_unaligned(ptr as usize as *const f64) }
    }

    fn mem_get_address(&self, ptr: Address) -> Address {
        unsafe { ptr::read_unaligned(ptr as usize as *const usize) as Address }
    }

    fn mem_put_byte(&self, ptr: Address, value: i8) {
        unsafe { ptr::write_unaligned(ptr as usize as *mut i8, value) }
    }

    fn mem_put_short(&self, ptr: Address, value: i16) {
        unsafe { ptr::write_unaligned(ptr as usize as *mut i16, value) }
    }

    fn mem_put_int(&self, ptr: Address, value: i32) {
        unsafe { ptr::write_unaligned(ptr as usize as *mut i32, value) }
    }

    fn mem_put_long(&self, ptr: Address, value: i64) {
        unsafe { ptr::write_unaligned(ptr as usize as *mut i64, value) }
    }

    fn mem_put_float(&self, ptr: Address, value: f32) {
        unsafe { ptr::write_unaligned(ptr as usize as *mut f32, value) }
    }

    fn mem_put_double(&self, ptr: Address, value: f64) {
        unsafe { ptr::write_unaligned(ptr as usize as *mut f64, value) }
    }

    fn mem_put_address(&self, ptr: Address, value: Address) {
        unsafe { ptr::write_unaligned(ptr as usize as *mut usize, value as usize) }
    }
}

#[cfg(unix)]
fn query_page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        PAGE_SIZE_DEFAULT
    }
}

#[cfg(not(unix))]
fn query_page_size() -> usize {
    PAGE_SIZE_DEFAULT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_validates_offsets() {
        UnsafeAccessor::probe().expect("owned view layout must validate");
    }

    #[test]
    fn page_size_is_a_real_power_of_two() {
        let accessor = UnsafeAccessor::probe().unwrap();
        let page = accessor.get_page_size();
        assert!(page.is_power_of_two());
        assert!(page >= 512);
    }

    #[test]
    fn offset_patching_matches_direct_access() {
        let accessor = UnsafeAccessor::probe().unwrap();
        let mut view = View::wrap(0, 0).into_kind(ViewKind::Long);
        accessor.setup_view(&mut view, 0xdead_0000, 4);
        assert_eq!(view.address(), 0xdead_0000);
        assert_eq!(view.capacity(), 4);
        assert_eq!(view.limit(), 4);
        assert!(view.parent().is_none());
    }

    #[test]
    fn zero_byte_bulk_ops_touch_nothing() {
        let accessor = UnsafeAccessor::probe().unwrap();
        let mut buf = [0xa5u8; 8];
        let addr = buf.as_mut_ptr() as Address;
        // One zero-length batch is still issued; contents must not change.
        accessor.mem_set(addr, 0x00, 0);
        accessor.mem_copy(addr, addr + 4, 0);
        assert_eq!(buf, [0xa5; 8]);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "release hook")]
    fn rebinding_a_hook_owning_view_is_rejected() {
        let accessor = UnsafeAccessor::probe().unwrap();
        let mut owned = View::with_release(0x5000, 16, |_, _| {});
        accessor.setup_view(&mut owned, 0x6000, 16);
    }
}
