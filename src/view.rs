use std::{
    fmt::{self, Debug, Formatter},
    ops::Range,
    sync::Arc,
};

/// A native memory location. Opaque: no ownership is implied, and the value
/// is only meaningful while whoever allocated the region keeps it alive.
pub type Address = u64;

/// Called when a view that owns its backing allocation becomes unreachable.
/// Receives the view's address and byte length.
pub type ReleaseHook = fn(Address, usize);

/// Element kind of a view. `Byte` is the base kind; the rest are derived by
/// width reinterpretation of a byte view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl ViewKind {
    pub const ALL: [ViewKind; 7] = [
        ViewKind::Byte,
        ViewKind::Short,
        ViewKind::Char,
        ViewKind::Int,
        ViewKind::Long,
        ViewKind::Float,
        ViewKind::Double,
    ];

    /// log2 of the element width in bytes.
    pub fn element_shift(self) -> u32 {
        match self {
            ViewKind::Byte => 0,
            ViewKind::Short | ViewKind::Char => 1,
            ViewKind::Int | ViewKind::Float => 2,
            ViewKind::Long | ViewKind::Double => 3,
        }
    }

    pub fn element_size(self) -> usize {
        1 << self.element_shift()
    }

    pub fn type_tag(self) -> &'static str {
        match self {
            ViewKind::Byte => "i8",
            ViewKind::Short => "i16",
            ViewKind::Char => "u16",
            ViewKind::Int => "i32",
            ViewKind::Long => "i64",
            ViewKind::Float => "f32",
            ViewKind::Double => "f64",
        }
    }
}

/// A typed window over a contiguous native memory range.
///
/// A view does not own the memory it points at. `capacity` counts elements
/// of `kind`, not bytes. Derived (non-byte) views hold a back-reference to
/// the byte view they were produced from, which is how retention tracking
/// knows the base is still reachable; rebinding a view onto an external
/// address severs that relationship.
pub struct View {
    pub(crate) address: Address,
    pub(crate) capacity: usize,
    pub(crate) position: usize,
    pub(crate) limit: usize,
    pub(crate) kind: ViewKind,
    pub(crate) parent: Option<Arc<View>>,
    pub(crate) release: Option<ReleaseHook>,
}

impl View {
    /// Fabricates a byte view over `capacity` bytes at `address`.
    pub fn wrap(address: Address, capacity: usize) -> Self {
        View {
            address,
            capacity,
            position: 0,
            limit: capacity,
            kind: ViewKind::Byte,
            parent: None,
            release: None,
        }
    }

    /// A byte view whose backing allocation is owned by the view itself:
    /// `release` runs when the allocation should be freed. Such views must
    /// never be rebound (see `MemoryAccessor::setup_view`).
    pub fn with_release(address: Address, capacity: usize, release: ReleaseHook) -> Self {
        View {
            release: Some(release),
            ..View::wrap(address, capacity)
        }
    }

    /// The reusable zero-capacity skeleton rebound by the fast-path view
    /// constructors. Never carries a parent or a release hook.
    pub(crate) fn template() -> Self {
        View::wrap(0, 0)
    }

    /// Derives a view of `kind` spanning exactly the byte range of `base`,
    /// recording `base` as the parent for retention tracking.
    pub(crate) fn derive(base: &Arc<View>, kind: ViewKind) -> Self {
        debug_assert_eq!(base.kind, ViewKind::Byte);
        let capacity = base.capacity >> kind.element_shift();
        View {
            address: base.address,
            capacity,
            position: 0,
            limit: capacity,
            kind,
            parent: Some(Arc::clone(base)),
            release: None,
        }
    }

    /// Reinterprets a byte view as a view of `kind` over the same byte
    /// range. The receiver becomes the new view's parent.
    pub fn into_kind(self, kind: ViewKind) -> Self {
        View::derive(&Arc::new(self), kind)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Element count, not byte count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&View> {
        self.parent.as_deref()
    }

    pub fn owns_release_hook(&self) -> bool {
        self.release.is_some()
    }

    pub fn byte_len(&self) -> usize {
        self.capacity << self.kind.element_shift()
    }

    /// The absolute byte range this view spans.
    pub fn byte_range(&self) -> Range<Address> {
        self.address..self.address + self.byte_len() as Address
    }

    /// Position back to zero, limit back to the full capacity.
    pub(crate) fn reset_state(&mut self) {
        self.position = 0;
        self.limit = self.capacity;
    }
}

impl Clone for View {
    fn clone(&self) -> Self {
        View {
            address: self.address,
            capacity: self.capacity,
            position: self.position,
            limit: self.limit,
            kind: self.kind,
            parent: self.parent.clone(),
            release: self.release,
        }
    }
}

impl Debug for View {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:#x}+{} (pos: {}, lim: {}, parent: {}, release: {})",
            self.kind.type_tag(),
            self.address,
            self.capacity,
            self.position,
            self.limit,
            self.parent.is_some(),
            self.release.is_some(),
        )
    }
}
