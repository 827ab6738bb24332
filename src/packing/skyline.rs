use rayon::prelude::*;

/// A horizontal run of the skyline at height `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    x: u32,
    y: u32,
    width: u32,
}

/// Candidate position for a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fit {
    pub x: u32,
    pub y: u32,
    pub rotated: bool,
    /// Empty area trapped under the rectangle.
    pub waste: u64,
    /// Top edge once placed.
    pub top: u32,
}

impl Fit {
    /// Lower top, then less waste, then lower x; unrotated wins ties.
    fn better_than(&self, other: &Fit) -> bool {
        (self.top, self.waste, self.x, self.rotated) < (other.top, other.waste, other.x, other.rotated)
    }
}

/// Where to look for positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Search {
    /// Start of every skyline segment.
    SegmentStarts,
    /// Every x on a `step` grid, evaluated in parallel.
    Exhaustive { step: u32 },
}

/// Bottom-left skyline bin of fixed width and optional height limit.
#[derive(Debug, Clone)]
pub struct Skyline {
    width: u32,
    max_height: Option<u32>,
    segments: Vec<Segment>,
    /// Right-most and top-most texel touched by a placed rectangle.
    used_width: u32,
    used_height: u32,
}

impl Skyline {
    pub fn new(width: u32, max_height: Option<u32>) -> Self {
        Self {
            width,
            max_height,
            segments: vec![Segment { x: 0, y: 0, width }],
            used_width: 0,
            used_height: 0,
        }
    }

    pub fn used_width(&self) -> u32 {
        self.used_width
    }

    pub fn used_height(&self) -> u32 {
        self.used_height
    }

    /// Height at which a `w` x `h` rectangle starting at `x` would rest, and
    /// the area left empty beneath it.
    fn fit_at(&self, x: u32, w: u32, h: u32) -> Option<(u32, u64)> {
        if w == 0 || x.checked_add(w)? > self.width {
            return None;
        }
        let end = x + w;
        let overlapping = self
            .segments
            .iter()
            .filter(|s| s.x < end && s.x + s.width > x);

        let y = overlapping.clone().map(|s| s.y).max()?;
        if let Some(limit) = self.max_height {
            if y + h > limit {
                return None;
            }
        }

        let waste = overlapping
            .map(|s| {
                let overlap = (s.x + s.width).min(end) - s.x.max(x);
                (y - s.y) as u64 * overlap as u64
            })
            .sum();
        Some((y, waste))
    }

    fn best_for(&self, w: u32, h: u32, rotated: bool, search: Search) -> Option<Fit> {
        let fit = |x: u32| {
            self.fit_at(x, w, h).map(|(y, waste)| Fit {
                x,
                y,
                rotated,
                waste,
                top: y + h,
            })
        };
        let pick = |a: Fit, b: Fit| if b.better_than(&a) { b } else { a };

        match search {
            Search::SegmentStarts => self.segments.iter().filter_map(|s| fit(s.x)).reduce(pick),
            Search::Exhaustive { step } => {
                let step = step.max(1);
                let last = self.width.checked_sub(w)?;
                (0..=last / step)
                    .into_par_iter()
                    .filter_map(|i| fit(i * step))
                    .reduce_with(pick)
            }
        }
    }

    /// Best position for a `w` x `h` rectangle, also trying it turned 90
    /// degrees when `allow_rotation`.
    pub fn find(&self, w: u32, h: u32, allow_rotation: bool, search: Search) -> Option<Fit> {
        let upright = self.best_for(w, h, false, search);
        if !allow_rotation || w == h {
            return upright;
        }
        let turned = self.best_for(h, w, true, search);
        match (upright, turned) {
            (Some(a), Some(b)) => Some(if b.better_than(&a) { b } else { a }),
            (a, b) => a.or(b),
        }
    }

    /// Place a `w` x `h` rectangle at a position returned by [`Skyline::find`].
    pub fn insert(&mut self, x: u32, y: u32, w: u32, h: u32) {
        let end = x + w;
        let top = y + h;
        let mut next = Vec::with_capacity(self.segments.len() + 2);

        for s in &self.segments {
            let s_end = s.x + s.width;
            if s_end <= x || s.x >= end {
                next.push(*s);
                continue;
            }
            if s.x < x {
                next.push(Segment {
                    x: s.x,
                    y: s.y,
                    width: x - s.x,
                });
            }
            if s.x <= x {
                next.push(Segment {
                    x,
                    y: top,
                    width: w,
                });
            }
            if s_end > end {
                next.push(Segment {
                    x: end,
                    y: s.y,
                    width: s_end - end,
                });
            }
        }

        // Merge neighbors at equal height
        self.segments.clear();
        for s in next {
            match self.segments.last_mut() {
                Some(last) if last.y == s.y && last.x + last.width == s.x => last.width += s.width,
                _ => self.segments.push(s),
            }
        }

        self.used_width = self.used_width.max(end);
        self.used_height = self.used_height.max(top);
    }
}
