//! Diagnostic page rasters: every chart's triangles filled with a flat color.

use glam::Vec2;
use image::{Rgba, RgbaImage};

use super::PackResult;
use crate::parameterize::ChartUv;

/// Stable color for a chart index.
pub fn chart_color(chart: usize) -> Rgba<u8> {
    // 32-bit integer hash (lowbias32)
    let mut h = chart as u32 ^ 0x9e37_79b9;
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    let [r, g, b, _] = h.to_le_bytes();
    // Keep charts visibly distinct from the black background
    Rgba([r | 0x40, g | 0x40, b | 0x40, 255])
}

/// Fill texels whose centers fall inside the triangle `tri` (page texels).
fn fill_triangle(img: &mut RgbaImage, tri: [Vec2; 3], color: Rgba<u8>) {
    let [a, b, c] = tri;
    let area = (b - a).perp_dot(c - a);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let (w, h) = img.dimensions();
    let lo = a.min(b).min(c).floor().max(Vec2::ZERO);
    let hi = a.max(b).max(c).ceil();
    let x1 = (hi.x as u32).min(w);
    let y1 = (hi.y as u32).min(h);

    for y in lo.y as u32..y1 {
        for x in lo.x as u32..x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = (c - b).perp_dot(p - b) / area;
            let w1 = (a - c).perp_dot(p - c) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// One RGBA image per page of `packed`.
pub fn render_pages(charts: &[ChartUv], packed: &PackResult) -> Vec<RgbaImage> {
    let mut pages: Vec<RgbaImage> = packed
        .pages
        .iter()
        .map(|_| RgbaImage::from_pixel(packed.width, packed.height, Rgba([0, 0, 0, 255])))
        .collect();

    for (i, (chart, placement)) in charts.iter().zip(&packed.placements).enumerate() {
        let Some(img) = pages.get_mut(placement.page as usize) else {
            continue;
        };
        let color = chart_color(i);
        for t in &chart.triangles {
            let tri = t.map(|v| placement.transform(chart.uvs[v as usize]));
            fill_triangle(img, tri, color);
        }
    }

    pages
}
