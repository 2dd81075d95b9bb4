use super::*;

#[test]
fn blend_weight_is_affine_in_opacity() {
    assert_eq!(blend_weight(0.0), -100.0);
    assert_eq!(blend_weight(50.0), 0.0);
    assert_eq!(blend_weight(100.0), 100.0);
    assert_eq!(blend_weight(75.0), 50.0);
}

#[test]
fn blend_weight_clamps_out_of_range_opacity() {
    assert_eq!(blend_weight(-20.0), -100.0);
    assert_eq!(blend_weight(250.0), 100.0);
    assert_eq!(blend_weight(f64::NAN), 100.0);
}

#[test]
fn allocator_never_reuses_ids() {
    let mut ids = IdAllocator::new();
    let a = ids.mint();
    let b = ids.mint();
    assert_ne!(a, b);

    ids.observe(LayerId(40));
    assert_eq!(ids.mint(), LayerId(41));

    // Observing an older id must not rewind the allocator.
    ids.observe(LayerId(3));
    assert_eq!(ids.mint(), LayerId(42));
}
