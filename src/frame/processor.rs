//! Frame Processor: aspect-ratio reframing, bilinear scale and
//! letterbox/pillarbox fill. Implemented directly (not delegated to a GPU
//! kernel) since the scope table assigns the scale/blend *math* for this
//! component to the crate itself -- only the shader *execution* is an
//! external collaborator.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::pool::{BufferKey, BufferPool, PixelBuffer};

/// Straight (non-premultiplied) RGBA8 image, row-major.
#[derive(Clone, Debug)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbaImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    pub(crate) fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = ((y as usize) * self.width as usize + x as usize) * 4;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2], self.data[idx + 3]]
    }

    pub(crate) fn set_pixel(&mut self, x: u32, y: u32, value: [u8; 4]) {
        let idx = ((y as usize) * self.width as usize + x as usize) * 4;
        self.data[idx..idx + 4].copy_from_slice(&value);
    }

    pub fn clear(&mut self, color: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    /// Bilinear sample at normalized-to-source-pixel coordinates `(u, v)`
    /// given in source pixel space (not `[0,1]`).
    fn sample_bilinear(&self, u: f64, v: f64) -> [u8; 4] {
        let u = u.clamp(0.0, (self.width.max(1) - 1) as f64);
        let v = v.clamp(0.0, (self.height.max(1) - 1) as f64);
        let x0 = u.floor() as u32;
        let y0 = v.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = u - x0 as f64;
        let fy = v - y0 as f64;

        let p00 = self.pixel(x0, y0);
        let p10 = self.pixel(x1, y0);
        let p01 = self.pixel(x0, y1);
        let p11 = self.pixel(x1, y1);

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
            let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
            let v = top * (1.0 - fy) + bottom * fy;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        out
    }
}

/// Crop region in normalized `[0,1]^2` source coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl CropRegion {
    pub fn full() -> Self {
        Self { x: 0.0, y: 0.0, w: 1.0, h: 1.0 }
    }

    /// `x>=0 && y>=0 && x+w<=1 && y+h<=1`.
    pub fn is_valid(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x + self.w <= 1.0 + 1e-9 && self.y + self.h <= 1.0 + 1e-9
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleMode {
    Fill,
    Fit,
    Stretch,
    Crop,
}

#[derive(Clone, Debug)]
pub struct FrameProcessorConfig {
    pub target_width: u32,
    pub target_height: u32,
    pub mode: ScaleMode,
    pub background: [u8; 4],
    /// Required when `mode == Crop`.
    pub crop: Option<CropRegion>,
}

impl FrameProcessorConfig {
    pub fn validate(&self) -> ExportResult<()> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(ExportError::InvalidDimensions(
                "target width/height must be > 0".into(),
            ));
        }
        if self.mode == ScaleMode::Crop {
            let region = self
                .crop
                .ok_or_else(|| ExportError::invalid_region("crop mode requires a CropRegion"))?;
            if !region.is_valid() {
                return Err(ExportError::invalid_region(format!(
                    "crop region {:?} is out of [0,1] bounds",
                    region
                )));
            }
        }
        Ok(())
    }
}

/// The source-space crop region `process` will sample from for a given
/// mode, before scaling the cropped area to `target_width x target_height`.
pub fn effective_crop(source_width: u32, source_height: u32, config: &FrameProcessorConfig) -> CropRegion {
    let source_aspect = source_width as f64 / source_height as f64;
    let target_aspect = config.target_width as f64 / config.target_height as f64;

    match config.mode {
        ScaleMode::Stretch | ScaleMode::Fit => CropRegion::full(),
        ScaleMode::Crop => config.crop.unwrap_or_else(CropRegion::full),
        ScaleMode::Fill => {
            if source_aspect > target_aspect {
                let w = target_aspect / source_aspect;
                CropRegion {
                    x: (1.0 - w) / 2.0,
                    y: 0.0,
                    w,
                    h: 1.0,
                }
            } else {
                let h = source_aspect / target_aspect;
                CropRegion {
                    x: 0.0,
                    y: (1.0 - h) / 2.0,
                    w: 1.0,
                    h,
                }
            }
        }
    }
}

/// Scale `source`'s `[x0,y0)..(x1,y1)` pixel rect into a `dst_w x dst_h`
/// region of `dest` placed at `(dest_x, dest_y)`, via bilinear resampling.
fn blit_scaled(
    source: &RgbaImage,
    src_rect: (f64, f64, f64, f64),
    dest: &mut RgbaImage,
    dest_origin: (u32, u32),
    dest_size: (u32, u32),
) {
    let (sx, sy, sw, sh) = src_rect;
    let (dx0, dy0) = dest_origin;
    let (dw, dh) = dest_size;
    if dw == 0 || dh == 0 {
        return;
    }
    for row in 0..dh {
        let v = sy + (row as f64 + 0.5) / dh as f64 * sh;
        for col in 0..dw {
            let u = sx + (col as f64 + 0.5) / dw as f64 * sw;
            let value = source.sample_bilinear(u, v);
            dest.set_pixel(dx0 + col, dy0 + row, value);
        }
    }
}

/// Process `source` per `config`: background clear, then crop/scale per
/// mode, composited onto the cleared destination.
pub fn process(source: &RgbaImage, config: &FrameProcessorConfig) -> ExportResult<RgbaImage> {
    config.validate()?;

    let mut dest = RgbaImage::new(config.target_width, config.target_height);
    dest.clear(config.background);

    let region = effective_crop(source.width, source.height, config);
    let src_rect = (
        region.x * source.width as f64,
        region.y * source.height as f64,
        region.w * source.width as f64,
        region.h * source.height as f64,
    );

    match config.mode {
        ScaleMode::Stretch | ScaleMode::Fill | ScaleMode::Crop => {
            blit_scaled(
                source,
                src_rect,
                &mut dest,
                (0, 0),
                (config.target_width, config.target_height),
            );
        }
        ScaleMode::Fit => {
            let source_aspect = source.width as f64 / source.height as f64;
            let target_aspect = config.target_width as f64 / config.target_height as f64;
            let (dw, dh) = if source_aspect > target_aspect {
                (config.target_width, (config.target_width as f64 / source_aspect).round() as u32)
            } else {
                ((config.target_height as f64 * source_aspect).round() as u32, config.target_height)
            };
            let dw = dw.max(1).min(config.target_width);
            let dh = dh.max(1).min(config.target_height);
            let ox = (config.target_width - dw) / 2;
            let oy = (config.target_height - dh) / 2;
            blit_scaled(source, src_rect, &mut dest, (ox, oy), (dw, dh));
        }
    }

    Ok(dest)
}

/// Acquire a destination buffer from `pool` sized for `config`'s target,
/// keyed by `(w, h, pixel_format, usage, storage_mode,
/// mip_level_count)` bucketing.
pub fn acquire_destination_buffer(
    pool: &mut BufferPool,
    config: &FrameProcessorConfig,
    format: crate::pool::PixelFormat,
) -> ExportResult<PixelBuffer> {
    pool.checkout(BufferKey {
        width: config.target_width,
        height: config.target_height,
        format,
        usage: crate::pool::Usage::RenderTarget,
        storage_mode: crate::pool::StorageMode::Private,
        mip_level_count: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        let mut img = RgbaImage::new(w, h);
        img.clear(color);
        img
    }

    #[test]
    fn crop_region_validity() {
        assert!(CropRegion { x: 0.0, y: 0.0, w: 1.0, h: 1.0 }.is_valid());
        assert!(!CropRegion { x: 0.6, y: 0.0, w: 0.5, h: 1.0 }.is_valid());
        assert!(!CropRegion { x: -0.1, y: 0.0, w: 0.5, h: 1.0 }.is_valid());
    }

    #[test]
    fn fill_mode_computes_centered_crop_matching_target_aspect() {
        // 16:9 source into a 9:16 target: crop narrows width, keeps full height.
        let config = FrameProcessorConfig {
            target_width: 1080,
            target_height: 1920,
            mode: ScaleMode::Fill,
            background: [0, 0, 0, 255],
            crop: None,
        };
        let region = effective_crop(1920, 1080, &config);
        assert!((region.h - 1.0).abs() < 1e-9);
        assert!((region.y - 0.0).abs() < 1e-9);
        // crop aspect must equal target aspect so scaling doesn't distort;
        // region is normalized to the source, so compare in pixel space.
        let crop_aspect = (region.w * 1920.0) / (region.h * 1080.0);
        let target_aspect = 1080.0 / 1920.0;
        assert!((crop_aspect - target_aspect).abs() < 1e-9);
        // centered
        assert!((region.x - (1.0 - region.w) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn fit_mode_letterboxes_with_background() {
        let source = solid(1000, 1000, [255, 0, 0, 255]);
        let config = FrameProcessorConfig {
            target_width: 200,
            target_height: 100,
            mode: ScaleMode::Fit,
            background: [0, 255, 0, 255],
            crop: None,
        };
        let out = process(&source, &config).unwrap();
        // corners should be background (letterboxed), center should be source color.
        assert_eq!(out.pixel(0, 0), [0, 255, 0, 255]);
        assert_eq!(out.pixel(100, 50), [255, 0, 0, 255]);
    }

    #[test]
    fn stretch_mode_fills_entire_target() {
        let source = solid(100, 100, [10, 20, 30, 255]);
        let config = FrameProcessorConfig {
            target_width: 50,
            target_height: 200,
            mode: ScaleMode::Stretch,
            background: [0, 0, 0, 0],
            crop: None,
        };
        let out = process(&source, &config).unwrap();
        assert_eq!(out.width, 50);
        assert_eq!(out.height, 200);
        assert_eq!(out.pixel(25, 100), [10, 20, 30, 255]);
    }

    #[test]
    fn invalid_crop_region_rejected() {
        let source = solid(10, 10, [1, 2, 3, 255]);
        let config = FrameProcessorConfig {
            target_width: 10,
            target_height: 10,
            mode: ScaleMode::Crop,
            background: [0, 0, 0, 0],
            crop: Some(CropRegion { x: 0.9, y: 0.0, w: 0.5, h: 1.0 }),
        };
        assert!(matches!(process(&source, &config), Err(ExportError::InvalidRegion(_))));
    }

    #[test]
    fn zero_target_dimensions_rejected() {
        let source = solid(10, 10, [0, 0, 0, 255]);
        let config = FrameProcessorConfig {
            target_width: 0,
            target_height: 10,
            mode: ScaleMode::Stretch,
            background: [0, 0, 0, 0],
            crop: None,
        };
        assert!(matches!(process(&source, &config), Err(ExportError::InvalidDimensions(_))));
    }
}
