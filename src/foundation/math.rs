pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// ITU-R 601-2 luma in fixed point, rounded to the nearest integer.
pub(crate) fn luma_u8(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    ((r * 19_595 + g * 38_470 + b * 7_471 + 0x8000) >> 16) as u8
}

/// ITU-R 601-2 luma as a float in `0.0..=255.0`.
pub(crate) fn luma_f32(rgb: [u8; 3]) -> f32 {
    0.299 * f32::from(rgb[0]) + 0.587 * f32::from(rgb[1]) + 0.114 * f32::from(rgb[2])
}

/// Round and clamp into the `u8` range. NaN maps to 0.
pub(crate) fn clamp_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

/// Linear blend `a + t * (b - a)` clamped to `u8`, as used by the enhancement operators.
pub(crate) fn blend_u8(degenerate: u8, src: u8, factor: f32) -> u8 {
    let a = f32::from(degenerate);
    clamp_u8(a + factor * (f32::from(src) - a))
}
