//! Backend-independent behavior of the memory-access layer: every property
//! here must hold for each constructible backend.

use memaccess::{
    Accessor, Address, MemoryAccessor, NativeAccessor, ReflectAccessor, UnsafeAccessor, View,
    ViewKind,
};

const MIB: usize = 1 << 20;

/// Sizes around the bulk-op chunk boundary.
const BULK_SIZES: [usize; 6] = [0, 1, MIB - 1, MIB, MIB + 1, 3 * MIB];

fn backends() -> Vec<Accessor> {
    vec![
        UnsafeAccessor::new()
            .expect("privileged accessor must construct in tests")
            .into(),
        ReflectAccessor::new()
            .expect("reflective accessor must construct in tests")
            .into(),
        NativeAccessor::new().into(),
    ]
}

#[test]
fn new_byte_view_round_trips_the_address() {
    let buf = [0u8; 64];
    let addr = buf.as_ptr() as Address;
    for accessor in backends() {
        for capacity in [0usize, 1, 64] {
            let view = accessor.new_byte_view(addr, capacity);
            assert_eq!(accessor.get_address(&view), addr, "{}", accessor.name());
            assert_eq!(view.capacity(), capacity, "{}", accessor.name());
        }
    }
}

#[test]
fn setup_view_spans_the_exact_byte_range() {
    let buf = [0u8; 256];
    let addr = buf.as_ptr() as Address;
    for accessor in backends() {
        for kind in ViewKind::ALL {
            let mut view = match kind {
                ViewKind::Byte => accessor.new_byte_view(0, 0),
                kind => accessor.new_byte_view(0, 0).into_kind(kind),
            };
            let capacity = 256 >> kind.element_shift();
            accessor.setup_view(&mut view, addr, capacity);

            assert_eq!(view.kind(), kind, "{}", accessor.name());
            assert_eq!(view.capacity(), capacity, "{}", accessor.name());
            assert_eq!(
                view.byte_range(),
                addr..addr + 256,
                "{} {kind:?}",
                accessor.name()
            );
            assert_eq!(view.position(), 0);
            assert_eq!(view.limit(), capacity);
        }
    }
}

#[test]
fn setup_view_severs_the_previous_parent() {
    let a = [0u8; 32];
    let b = [0u8; 32];
    for accessor in backends() {
        let mut view = accessor.new_int_view(a.as_ptr() as Address, 8);
        let previous_parent = view.parent().map(View::address);

        accessor.setup_view(&mut view, b.as_ptr() as Address, 8);
        match accessor.name() {
            // The native backend fabricates a replacement derived from a
            // fresh byte view; the others null the field in place.
            "native" => assert_ne!(view.parent().map(View::address), previous_parent),
            _ => assert!(view.parent().is_none(), "{}", accessor.name()),
        }
    }
}

#[test]
fn mem_set_fills_exactly_n_bytes() {
    for accessor in backends() {
        for &n in &BULK_SIZES {
            // Two guard bytes past the region catch overruns.
            let mut buf = vec![0xabu8; n + 2];
            accessor.mem_set(buf.as_mut_ptr() as Address, 0x42, n);
            assert!(
                buf[..n].iter().all(|&b| b == 0x42),
                "{} n={n}",
                accessor.name()
            );
            assert_eq!(&buf[n..], &[0xab, 0xab], "{} n={n}", accessor.name());
        }
    }
}

#[test]
fn mem_copy_disjoint_reproduces_the_source() {
    for accessor in backends() {
        for &n in &BULK_SIZES {
            let src: Vec<u8> = (0..n).map(|i| (i * 31 + 7) as u8).collect();
            let mut dst = vec![0u8; n + 2];
            dst[n] = 0xee;
            dst[n + 1] = 0xee;

            accessor.mem_copy(src.as_ptr() as Address, dst.as_mut_ptr() as Address, n);
            assert_eq!(&dst[..n], &src[..], "{} n={n}", accessor.name());
            assert_eq!(&dst[n..], &[0xee, 0xee], "{} n={n}", accessor.name());
        }
    }
}

#[test]
fn mem_copy_backward_overlap_reproduces_the_source() {
    // Overlapping with dst < src is covered by the documented policy for
    // every backend, chunked or not.
    const SHIFT: usize = 7;
    for accessor in backends() {
        for &n in &BULK_SIZES {
            let mut buf: Vec<u8> = (0..n + SHIFT).map(|i| (i * 13 + 1) as u8).collect();
            let mut expected = buf.clone();
            expected.copy_within(SHIFT..SHIFT + n, 0);

            let addr = buf.as_mut_ptr() as Address;
            accessor.mem_copy(addr + SHIFT as Address, addr, n);
            assert_eq!(&buf[..n], &expected[..n], "{} n={n}", accessor.name());
        }
    }
}

#[test]
fn scalar_round_trips_are_bit_exact() {
    let mut cell = [0u8; 16];
    // Offset by one so every width exercises an unaligned slot.
    let addr = cell.as_mut_ptr() as Address + 1;

    for accessor in backends() {
        for v in [0i8, -1, i8::MIN, i8::MAX] {
            accessor.mem_put_byte(addr, v);
            assert_eq!(accessor.mem_get_byte(addr), v, "{}", accessor.name());
        }
        for v in [0i16, -1, i16::MIN, i16::MAX] {
            accessor.mem_put_short(addr, v);
            assert_eq!(accessor.mem_get_short(addr), v, "{}", accessor.name());
        }
        for v in [0i32, -1, i32::MIN, i32::MAX] {
            accessor.mem_put_int(addr, v);
            assert_eq!(accessor.mem_get_int(addr), v, "{}", accessor.name());
        }
        for v in [0i64, -1, i64::MIN, i64::MAX] {
            accessor.mem_put_long(addr, v);
            assert_eq!(accessor.mem_get_long(addr), v, "{}", accessor.name());
        }
        for v in [0.0f32, -1.0, f32::MIN, f32::MAX] {
            accessor.mem_put_float(addr, v);
            assert_eq!(
                accessor.mem_get_float(addr).to_bits(),
                v.to_bits(),
                "{}",
                accessor.name()
            );
        }
        for v in [0.0f64, -1.0, f64::MIN, f64::MAX] {
            accessor.mem_put_double(addr, v);
            assert_eq!(
                accessor.mem_get_double(addr).to_bits(),
                v.to_bits(),
                "{}",
                accessor.name()
            );
        }
        for v in [0u64, 1, usize::MAX as Address] {
            accessor.mem_put_address(addr, v);
            assert_eq!(accessor.mem_get_address(addr), v, "{}", accessor.name());
        }
    }
}

#[test]
fn selected_instance_is_usable() {
    let accessor = memaccess::instance();
    assert!(accessor.get_page_size().is_power_of_two());
    assert!(accessor.get_cache_line_size().is_power_of_two());

    let mut buf = [0u8; 8];
    accessor.mem_set(buf.as_mut_ptr() as Address, 0x7f, buf.len());
    assert_eq!(buf, [0x7f; 8]);
}
