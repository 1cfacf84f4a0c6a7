use crate::foundation::core::PixelSize;
use crate::foundation::error::{EmbedError, EmbedResult};

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Source-over for premultiplied pixels, with an extra layer opacity.
///
/// Software presentation flattens overlays at `opacity = 1.0`. Opacity mutations travel to the
/// host with the platform view layer instead.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Composite `src` over `dst` with `src`'s top-left corner at `origin` (in `dst` pixels).
///
/// Parts of `src` outside `dst` are clipped.
pub fn over_at(
    dst: &mut [u8],
    dst_size: PixelSize,
    src: &[u8],
    src_size: PixelSize,
    origin: (i64, i64),
    opacity: f32,
) -> EmbedResult<()> {
    if dst.len() != dst_size.area() as usize * 4 || src.len() != src_size.area() as usize * 4 {
        return Err(EmbedError::contract(
            "over_at expects tightly packed rgba8 buffers matching their sizes",
        ));
    }

    let (ox, oy) = origin;
    let x0 = ox.max(0);
    let y0 = oy.max(0);
    let x1 = ox
        .saturating_add(i64::from(src_size.width))
        .min(i64::from(dst_size.width));
    let y1 = oy
        .saturating_add(i64::from(src_size.height))
        .min(i64::from(dst_size.height));
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    let dst_stride = dst_size.width as usize * 4;
    let src_stride = src_size.width as usize * 4;
    let span = (x1 - x0) as usize * 4;
    for y in y0..y1 {
        let d_off = y as usize * dst_stride + x0 as usize * 4;
        let s_off = (y - oy) as usize * src_stride + (x0 - ox) as usize * 4;
        let d_row = &mut dst[d_off..d_off + span];
        let s_row = &src[s_off..s_off + span];
        for (d, s) in d_row.chunks_exact_mut(4).zip(s_row.chunks_exact(4)) {
            let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
            d.copy_from_slice(&out);
        }
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
