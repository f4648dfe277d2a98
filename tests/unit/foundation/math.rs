use super::*;

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u16(0, 200), 0);
}

#[test]
fn blend_over_respects_alpha_extremes() {
    assert_eq!(blend_over_u8(200, 255, 10), 200);
    assert_eq!(blend_over_u8(200, 0, 10), 10);
    // Straight red @ 50% alpha over black.
    assert_eq!(blend_over_u8(255, 128, 0), 128);
}

#[test]
fn unpremultiply_inverts_premultiply() {
    assert_eq!(unpremultiply_u8(0, 0), 0);
    assert_eq!(unpremultiply_u8(128, 128), 255);
    assert_eq!(unpremultiply_u8(64, 128), 128);
    assert_eq!(unpremultiply_u8(10, 255), 10);
}
