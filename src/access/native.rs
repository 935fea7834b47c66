use crate::{
    access::MemoryAccessor,
    native as support,
    view::{Address, View, ViewKind},
};

/// Default backend: every operation forwards to the native support layer.
/// Always constructible; it performs no field manipulation of its own, so
/// rebinding fabricates a fresh view instead of patching the old one.
pub struct NativeAccessor;

impl NativeAccessor {
    pub fn new() -> Self {
        NativeAccessor
    }
}

impl Default for NativeAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccessor for NativeAccessor {
    fn name(&self) -> &'static str {
        "native"
    }

    fn get_address(&self, view: &View) -> Address {
        support::n_get_address(view)
    }

    fn new_byte_view(&self, address: Address, capacity: usize) -> View {
        support::n_new_view(address, capacity)
    }

    fn setup_view(&self, view: &mut View, address: Address, capacity: usize) {
        *view = match view.kind() {
            ViewKind::Byte => support::n_new_view(address, capacity),
            kind => support::n_new_view(address, capacity << kind.element_shift()).into_kind(kind),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_replaces_rather_than_patches() {
        let a = [0u8; 32];
        let b = [0u8; 32];
        let accessor = NativeAccessor::new();

        let mut view = accessor.new_int_view(a.as_ptr() as Address, 8);
        let old_parent_addr = view.parent().unwrap().address();

        accessor.setup_view(&mut view, b.as_ptr() as Address, 8);
        assert_eq!(view.kind(), ViewKind::Int);
        assert_eq!(view.address(), b.as_ptr() as Address);
        assert_eq!(view.capacity(), 8);
        // The fabricated replacement derives from a fresh byte view, never
        // from the previous backing object.
        assert_ne!(view.parent().unwrap().address(), old_parent_addr);
    }
}
