//! Atlas packing.
//!
//! Charts are scaled to texels, padded into integer rectangles and placed
//! with a bottom-left skyline search, either onto fixed-size pages or onto a
//! single page whose size is chosen from several candidate widths.

pub mod raster;
pub mod skyline;

use image::RgbaImage;
use glam::Vec2;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::PackConfig;
use crate::error::{AtlasError, Result};
use crate::parameterize::ChartUv;
use crate::progress::{Progress, ProgressPhase};
use skyline::{Search, Skyline};

/// Side used to derive the texel density when no resolution is given.
const DEFAULT_RESOLUTION: u32 = 1024;
/// Fraction of the page the charts are expected to cover.
const TARGET_FILL: f32 = 0.75;
const BLOCK: u32 = 4;
/// Largest padded chart side, in texels.
const MAX_CHART_TEXELS: u64 = 1 << 24;
/// Largest auto-sized page side, in texels.
const MAX_PAGE_TEXELS: u64 = u32::MAX as u64 / 2;
/// Distance a transformed UV may stray outside its page before it is an error.
const UV_SLACK_TEXELS: f32 = 1e-3;

/// One atlas page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub index: u32,
    /// Parametric chart area over page area, in (0, 1].
    pub utilization: f32,
    pub chart_count: u32,
}

/// Where a chart ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub page: u32,
    /// Texel position of the chart's minimum UV corner.
    pub x: u32,
    pub y: u32,
    /// Turned 90 degrees counter-clockwise.
    pub rotated: bool,
    /// Texels per chart UV unit.
    pub scale: f32,
    /// Scaled chart extent, before rotation.
    pub extent: Vec2,
}

impl Placement {
    /// Map a chart UV to page texels.
    pub fn transform(&self, uv: Vec2) -> Vec2 {
        let p = uv * self.scale;
        let p = if self.rotated {
            Vec2::new(self.extent.y - p.y, p.x)
        } else {
            p
        };
        Vec2::new(self.x as f32, self.y as f32) + p
    }
}

/// Result of packing all charts.
#[derive(Debug, Clone)]
pub struct PackResult {
    pub width: u32,
    pub height: u32,
    pub texels_per_unit: f32,
    /// One per chart, parallel to the packer input.
    pub placements: Vec<Placement>,
    pub pages: Vec<PageInfo>,
    /// Diagnostic rasters, one per page, when requested.
    pub images: Vec<RgbaImage>,
}

impl PackResult {
    /// Chart UV to normalized page coordinates in [0, 1].
    ///
    /// Only float rounding is clamped away; `None` when the UV lands further
    /// outside the page than that.
    pub fn normalized_uv(&self, chart: usize, uv: Vec2) -> Option<Vec2> {
        let t = self.placements.get(chart)?.transform(uv);
        let size = Vec2::new(self.width as f32, self.height as f32);
        let slack = UV_SLACK_TEXELS.max(size.max_element() * f32::EPSILON * 4.0);
        if !t.is_finite()
            || t.cmplt(Vec2::splat(-slack)).any()
            || t.cmpgt(size + slack).any()
        {
            return None;
        }
        Some((t / size).clamp(Vec2::ZERO, Vec2::ONE))
    }
}

/// A chart as a padded integer rectangle.
#[derive(Debug, Clone, Copy)]
struct ChartRect {
    /// Padded size.
    w: u32,
    h: u32,
    margin: u32,
    scale: f32,
    extent: Vec2,
}

fn align_up(v: u64, block_align: bool) -> u64 {
    if block_align {
        v.div_ceil(BLOCK as u64) * BLOCK as u64
    } else {
        v
    }
}

/// Texels per world unit.
fn texel_density(charts: &[ChartUv], config: &PackConfig) -> f32 {
    if config.texels_per_unit > 0.0 {
        return config.texels_per_unit;
    }
    let total_area: f32 = charts.iter().map(|c| c.uv_area()).sum();
    if total_area <= 0.0 {
        return 1.0;
    }
    let resolution = if config.resolution > 0 {
        config.resolution
    } else {
        DEFAULT_RESOLUTION
    } as f32;
    (resolution * resolution * TARGET_FILL / total_area).sqrt()
}

fn chart_rect(
    index: usize,
    chart: &ChartUv,
    texels_per_unit: f32,
    config: &PackConfig,
) -> Result<ChartRect> {
    let size = chart.size();
    let mut scale = texels_per_unit;
    let longest = size.max_element() * scale;
    if config.max_chart_size > 0 && longest > config.max_chart_size as f32 {
        scale *= config.max_chart_size as f32 / longest;
    }

    let extent = size * scale;
    let margin = config.padding as u64 + config.bilinear as u64;
    let padded = |e: f32| {
        if e.is_nan() || e > MAX_CHART_TEXELS as f32 {
            return None;
        }
        let side = align_up((e.ceil() as u64).max(1) + 2 * margin, config.block_align);
        (side <= MAX_CHART_TEXELS).then_some(side as u32)
    };
    match (padded(extent.x), padded(extent.y)) {
        (Some(w), Some(h)) => Ok(ChartRect {
            w,
            h,
            margin: margin as u32,
            scale,
            extent,
        }),
        _ => Err(AtlasError::PackingInfeasible {
            reason: format!(
                "chart {index} spans {}x{} texels plus {margin} margin at {scale} texels per unit, \
                 over the {MAX_CHART_TEXELS} texel limit",
                extent.x, extent.y
            ),
        }),
    }
}

/// Placement order: larger padded area first, then longer side, then index.
fn placement_order(rects: &[ChartRect]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rects.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (&rects[a], &rects[b]);
        (rb.w as u64 * rb.h as u64)
            .cmp(&(ra.w as u64 * ra.h as u64))
            .then(rb.w.max(rb.h).cmp(&ra.w.max(ra.h)))
            .then(a.cmp(&b))
    });
    order
}

fn search_mode(config: &PackConfig) -> Search {
    if config.brute_force {
        Search::Exhaustive {
            step: if config.block_align { BLOCK } else { 1 },
        }
    } else {
        Search::SegmentStarts
    }
}

/// Raw placement: page, padded-rect position, rotation.
type Slot = (u32, u32, u32, bool);

/// Pack onto `resolution` x `resolution` pages, opening pages as needed.
fn pack_pages(
    rects: &[ChartRect],
    order: &[usize],
    resolution: u32,
    config: &PackConfig,
    progress: &Progress,
) -> Result<Vec<Slot>> {
    let fits_page = |w: u32, h: u32| w <= resolution && h <= resolution;
    for (i, r) in rects.iter().enumerate() {
        if !fits_page(r.w, r.h) && !(config.rotate_charts && fits_page(r.h, r.w)) {
            return Err(AtlasError::PackingInfeasible {
                reason: format!(
                    "chart {i} needs {}x{} texels but pages are {resolution}x{resolution}",
                    r.w, r.h
                ),
            });
        }
    }

    let search = search_mode(config);
    let mut pages: Vec<Skyline> = Vec::new();
    let mut slots = vec![(0, 0, 0, false); rects.len()];

    for (done, &i) in order.iter().enumerate() {
        let r = &rects[i];
        let found = pages.iter().enumerate().find_map(|(p, page)| {
            page.find(r.w, r.h, config.rotate_charts, search)
                .map(|fit| (p, fit))
        });
        let (page, fit) = match found {
            Some(found) => found,
            None => {
                pages.push(Skyline::new(resolution, Some(resolution)));
                let page = pages.len() - 1;
                let fit = pages[page]
                    .find(r.w, r.h, config.rotate_charts, search)
                    .ok_or_else(|| {
                        AtlasError::Internal(format!("chart {i} does not fit an empty page"))
                    })?;
                debug!(page, "Opened atlas page");
                (page, fit)
            }
        };

        let (w, h) = if fit.rotated { (r.h, r.w) } else { (r.w, r.h) };
        pages[page].insert(fit.x, fit.y, w, h);
        slots[i] = (page as u32, fit.x, fit.y, fit.rotated);
        progress.report_steps(ProgressPhase::PackCharts, done + 1, order.len());
    }

    Ok(slots)
}

/// Pack every chart onto one skyline of width `width` with unbounded height.
fn pack_single(
    rects: &[ChartRect],
    order: &[usize],
    width: u32,
    config: &PackConfig,
) -> Option<(Vec<Slot>, u32, u32)> {
    let search = search_mode(config);
    let mut sky = Skyline::new(width, None);
    let mut slots = vec![(0, 0, 0, false); rects.len()];
    for &i in order {
        let r = &rects[i];
        let fit = sky.find(r.w, r.h, config.rotate_charts, search)?;
        let (w, h) = if fit.rotated { (r.h, r.w) } else { (r.w, r.h) };
        sky.insert(fit.x, fit.y, w, h);
        slots[i] = (0, fit.x, fit.y, fit.rotated);
    }
    Some((slots, sky.used_width(), sky.used_height()))
}

/// Choose the single-page layout with the smallest area among candidate widths.
fn pack_auto(
    rects: &[ChartRect],
    order: &[usize],
    config: &PackConfig,
    progress: &Progress,
) -> Result<(Vec<Slot>, u32, u32)> {
    // Stacking every chart bounds any layout's height and width
    let stacked: u64 = rects.iter().map(|r| r.w.max(r.h) as u64).sum();
    if stacked > MAX_PAGE_TEXELS {
        return Err(AtlasError::PackingInfeasible {
            reason: format!("charts span {stacked} texels, over the {MAX_PAGE_TEXELS} texel page limit"),
        });
    }

    let total: u64 = rects.iter().map(|r| r.w as u64 * r.h as u64).sum();
    let side = (total as f64).sqrt().ceil() as u32;
    let widest = rects
        .iter()
        .map(|r| if config.rotate_charts { r.w.min(r.h) } else { r.w })
        .max()
        .unwrap_or(1);

    let mut widths: Vec<u32> = [0.5, 0.7, 0.85, 1.0, 1.15, 1.3, 1.5, 2.0]
        .iter()
        .map(|f| {
            let w = ((side as f64 * f).ceil() as u32).max(widest).max(1);
            align_up(w as u64, config.block_align) as u32
        })
        .collect();
    widths.sort_unstable();
    widths.dedup();

    let layouts: Vec<(u32, Vec<Slot>, u32, u32)> = widths
        .par_iter()
        .filter_map(|&w| pack_single(rects, order, w, config).map(|(s, uw, uh)| (w, s, uw, uh)))
        .collect();
    progress.report(ProgressPhase::PackCharts, 100);

    let best = layouts
        .into_iter()
        .map(|(candidate, slots, used_w, used_h)| {
            let w = align_up(used_w.max(1) as u64, config.block_align) as u32;
            let h = align_up(used_h.max(1) as u64, config.block_align) as u32;
            debug!(candidate, width = w, height = h, "Evaluated atlas width");
            (slots, w, h)
        })
        .min_by(|(_, wa, ha), (_, wb, hb)| {
            (*wa as u64 * *ha as u64)
                .cmp(&(*wb as u64 * *hb as u64))
                .then(wa.abs_diff(*ha).cmp(&wb.abs_diff(*hb)))
                .then(wa.cmp(wb))
        });

    best.ok_or_else(|| AtlasError::Internal("no candidate width could hold every chart".into()))
}

/// Pack `charts` according to `config`.
pub fn pack_charts(charts: &[ChartUv], config: &PackConfig, progress: &Progress) -> Result<PackResult> {
    progress.report(ProgressPhase::PackCharts, 0);

    let texels_per_unit = texel_density(charts, config);
    let rects = charts
        .iter()
        .enumerate()
        .map(|(i, c)| chart_rect(i, c, texels_per_unit, config))
        .collect::<Result<Vec<_>>>()?;
    let order = placement_order(&rects);

    let (slots, width, height) = if config.resolution > 0 {
        let slots = pack_pages(&rects, &order, config.resolution, config, progress)?;
        (slots, config.resolution, config.resolution)
    } else {
        pack_auto(&rects, &order, config, progress)?
    };

    let placements: Vec<Placement> = slots
        .iter()
        .zip(&rects)
        .map(|(&(page, x, y, rotated), r)| Placement {
            page,
            x: x + r.margin,
            y: y + r.margin,
            rotated,
            scale: r.scale,
            extent: r.extent,
        })
        .collect();

    let page_count = slots.iter().map(|s| s.0 + 1).max().unwrap_or(1);
    let page_area = width as f64 * height as f64;
    let pages: Vec<PageInfo> = (0..page_count)
        .map(|index| {
            let (covered, chart_count) = charts
                .iter()
                .zip(&placements)
                .filter(|(_, p)| p.page == index)
                .fold((0.0f64, 0u32), |(area, n), (c, p)| {
                    let s = p.scale as f64;
                    (area + c.uv_area() as f64 * s * s, n + 1)
                });
            PageInfo {
                index,
                utilization: ((covered / page_area) as f32).clamp(f32::EPSILON, 1.0),
                chart_count,
            }
        })
        .collect();

    for page in &pages {
        info!(
            page = page.index,
            charts = page.chart_count,
            utilization = page.utilization,
            "Packed page"
        );
    }

    let mut result = PackResult {
        width,
        height,
        texels_per_unit,
        placements,
        pages,
        images: Vec::new(),
    };
    if config.create_image {
        result.images = raster::render_pages(charts, &result);
    }
    Ok(result)
}
