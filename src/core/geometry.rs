//! Crop/letterbox geometry for the five fit modes.
//!
//! Pure arithmetic, no drawing. Computes the source sub-rectangle to read
//! from a decoded image and the destination sub-rectangle to draw into a
//! target canvas. Rounding is half-away-from-zero on every pixel boundary,
//! matching the reference resizing library.

use crate::core::types::{FitMode, ResizeOptions};

/// Source and destination sub-rectangles for one resize operation.
///
/// `(sx, sy, sw, sh)` select from the decoded image; `(dx, dy, dw, dh)`
/// place it within the target canvas. Both are recomputed per call and
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeRect {
    pub sx: u32,
    pub sy: u32,
    pub sw: u32,
    pub sh: u32,
    pub dx: u32,
    pub dy: u32,
    pub dw: u32,
    pub dh: u32,
}

fn round(value: f64) -> u32 {
    value.round() as u32
}

/// Computes the crop/letterbox geometry for fitting `src_w x src_h` into
/// the target described by `options`.
///
/// Callers guarantee positive dimensions on both sides; validation lives
/// with [`ResizeOptions::validate`] and the pipeline entry points.
pub fn calc_resize_rect(src_w: u32, src_h: u32, options: &ResizeOptions) -> ResizeRect {
    let target_w = options.width;
    let target_h = options.height;

    match options.fit {
        FitMode::Fill => ResizeRect {
            sx: 0,
            sy: 0,
            sw: src_w,
            sh: src_h,
            dx: 0,
            dy: 0,
            dw: target_w,
            dh: target_h,
        },
        FitMode::Cover => cover_rect(src_w, src_h, target_w, target_h),
        FitMode::Outside => {
            // Already at least target-sized on both axes: skip the resize entirely.
            if src_w >= target_w && src_h >= target_h {
                ResizeRect {
                    sx: 0,
                    sy: 0,
                    sw: src_w,
                    sh: src_h,
                    dx: 0,
                    dy: 0,
                    dw: src_w,
                    dh: src_h,
                }
            } else {
                cover_rect(src_w, src_h, target_w, target_h)
            }
        }
        FitMode::Contain => contain_rect(src_w, src_h, target_w, target_h),
        FitMode::Inside => {
            // Already fits on both axes: keep the source size, still centered.
            if src_w <= target_w && src_h <= target_h {
                centered(src_w, src_h, target_w, target_h, src_w, src_h)
            } else {
                contain_rect(src_w, src_h, target_w, target_h)
            }
        }
    }
}

/// Aspect-preserving center crop: the destination exactly fills the target.
fn cover_rect(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> ResizeRect {
    let src_aspect = f64::from(src_w) / f64::from(src_h);
    let target_aspect = f64::from(target_w) / f64::from(target_h);

    let (sx, sy, sw, sh) = if src_aspect > target_aspect {
        // Source relatively wider: crop width symmetrically.
        let sh = src_h;
        let sw = round(f64::from(sh) * target_aspect);
        let sx = round((f64::from(src_w) - f64::from(sw)) / 2.0);
        (sx, 0, sw, sh)
    } else {
        // Source relatively taller (or equal): crop height symmetrically.
        let sw = src_w;
        let sh = round(f64::from(sw) / target_aspect);
        let sy = round((f64::from(src_h) - f64::from(sh)) / 2.0);
        (0, sy, sw, sh)
    };

    ResizeRect {
        sx,
        sy,
        sw,
        sh,
        dx: 0,
        dy: 0,
        dw: target_w,
        dh: target_h,
    }
}

/// Aspect-preserving letterbox/pillarbox: the whole source lands inside
/// the target, centered.
fn contain_rect(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> ResizeRect {
    let src_aspect = f64::from(src_w) / f64::from(src_h);
    let target_aspect = f64::from(target_w) / f64::from(target_h);

    let (dw, dh) = if src_aspect > target_aspect {
        let dw = target_w;
        let dh = round(f64::from(target_w) / src_aspect);
        (dw, dh)
    } else {
        let dh = target_h;
        let dw = round(f64::from(target_h) * src_aspect);
        (dw, dh)
    };

    centered(src_w, src_h, target_w, target_h, dw, dh)
}

/// Full-source rect plus a destination of `dw x dh` centered in the target.
fn centered(src_w: u32, src_h: u32, target_w: u32, target_h: u32, dw: u32, dh: u32) -> ResizeRect {
    ResizeRect {
        sx: 0,
        sy: 0,
        sw: src_w,
        sh: src_h,
        dx: round((f64::from(target_w) - f64::from(dw)) / 2.0),
        dy: round((f64::from(target_h) - f64::from(dh)) / 2.0),
        dw,
        dh,
    }
}
