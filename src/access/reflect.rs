use crate::{
    access::{with_template, MemoryAccessor},
    error::Error,
    view::{Address, View, ViewKind},
};
use std::{env, sync::Arc};

/// Get/set pair for one internal view field, recorded once at construction
/// so per-call access never re-derives anything.
struct FieldHandle<T> {
    get: fn(&View) -> T,
    set: fn(&mut View, T),
}

/// Accelerated backend that rebinds views by writing their internal fields
/// through recorded field handles. Construction validates the layout it is
/// about to depend on: the address and capacity fields must round-trip, and
/// every derived view kind must hold an identity back-reference to the byte
/// view it was produced from. A runtime where that does not hold is
/// rejected so the capability probe can fall back.
///
/// Scalar and bulk memory operations are inherited from the native support
/// layer; only view construction and rebinding are specialized here.
pub struct ReflectAccessor {
    address: FieldHandle<Address>,
    capacity: FieldHandle<usize>,
    owns_release: fn(&View) -> bool,
    clear_parent: fn(&mut View),
}

impl ReflectAccessor {
    pub fn new() -> Result<Self, Error> {
        if env::var_os("MEMACCESS_NO_REFLECT").is_some_and(|v| !v.is_empty()) {
            return Err(Error::Disabled("MEMACCESS_NO_REFLECT"));
        }
        Self::probe()
    }

    pub(crate) fn probe() -> Result<Self, Error> {
        let accessor = ReflectAccessor {
            address: FieldHandle {
                get: |v| v.address,
                set: |v, address| v.address = address,
            },
            capacity: FieldHandle {
                get: |v| v.capacity,
                set: |v, capacity| v.capacity = capacity,
            },
            owns_release: |v| v.release.is_some(),
            clear_parent: |v| v.parent = None,
        };
        accessor.validate()?;
        Ok(accessor)
    }

    /// The stable-layout precondition, checked rather than assumed.
    fn validate(&self) -> Result<(), Error> {
        let mut scratch = View::wrap(0, 0);
        (self.address.set)(&mut scratch, 0x5afe_0add);
        if (self.address.get)(&scratch) != 0x5afe_0add {
            return Err(Error::UnsupportedLayout("address field"));
        }
        (self.capacity.set)(&mut scratch, 24);
        if (self.capacity.get)(&scratch) != 24 {
            return Err(Error::UnsupportedLayout("capacity field"));
        }

        let base = Arc::new(View::wrap(0x1000, 64));
        for kind in ViewKind::ALL {
            let mut sample = View::derive(&base, kind);
            // Identity, not equality: the parent slot must reference the
            // exact byte view the sample was derived from.
            match &sample.parent {
                Some(p) if Arc::ptr_eq(p, &base) => {}
                _ => return Err(Error::UnsupportedLayout("parent field")),
            }
            (self.clear_parent)(&mut sample);
            if sample.parent.is_some() {
                return Err(Error::UnsupportedLayout("parent field"));
            }
        }

        let hooked = View::with_release(0x1000, 0, |_, _| {});
        if !(self.owns_release)(&hooked) {
            return Err(Error::UnsupportedLayout("release hook field"));
        }
        Ok(())
    }
}

impl MemoryAccessor for ReflectAccessor {
    fn name(&self) -> &'static str {
        "reflect"
    }

    fn get_address(&self, view: &View) -> Address {
        (self.address.get)(view)
    }

    fn new_byte_view(&self, address: Address, capacity: usize) -> View {
        with_template(|template| {
            (self.address.set)(template, address);
            (self.capacity.set)(template, capacity);
            // Similar to setup_view below, except the parent field is left
            // untouched: the template is never itself a derived child, so
            // the write would be wasted.
            template.reset_state();
            template.clone()
        })
    }

    fn setup_view(&self, view: &mut View, address: Address, capacity: usize) {
        #[cfg(debug_assertions)]
        if view.kind() == ViewKind::Byte && (self.owns_release)(view) {
            // If this were allowed, the view's own allocation might never be
            // freed, and the hook would later free memory it does not own.
            panic!("views that own a release hook cannot be rebound");
        }

        (self.address.set)(view, address);
        (self.capacity.set)(view, capacity);
        (self.clear_parent)(view);
        view.reset_state();
    }
}
