//! Caption Burner: per-frame subtitle overlay compositing from a sorted
//! caption list with fade envelopes.
//!
//! Glyph outline rasterization (antialiased font hinting) is treated as an
//! external collaborator behind [`GlyphRasterizer`], the same way the Render
//! Device and GPU shader kernels sit outside this crate's scope -- this
//! module owns text *shaping* (via Parley, an in-scope dependency) and the
//! box/shadow/outline/composite math, not glyph-to-pixel font rendering.

use std::collections::HashMap;
use std::sync::Arc;

use crate::caption::layout::{TextBrushRgba8, TextLayoutEngine};
use crate::error::{ExportError, ExportResult};
use crate::foundation::RationalTime;
use crate::frame::processor::RgbaImage;

#[derive(Clone, Copy, Debug)]
pub struct DropShadow {
    pub offset: (f32, f32),
    pub color: [u8; 4],
}

#[derive(Clone, Copy, Debug)]
pub struct Outline {
    pub width_px: f32,
    pub color: [u8; 4],
}

#[derive(Clone, Debug)]
pub struct CaptionStyle {
    /// Font size at a reference 1080p target; actual size scales by
    /// `target_height / 1080`.
    pub font_size_at_1080: f32,
    /// Fraction of frame height; image is centered on
    /// `vertical_position * height`.
    pub vertical_position: f64,
    pub fade_seconds: f64,
    pub text_color: [u8; 4],
    pub background: Option<[u8; 4]>,
    pub background_padding_px: f32,
    pub background_corner_radius_px: f32,
    pub drop_shadow: Option<DropShadow>,
    pub outline: Option<Outline>,
    /// Wrap width as a fraction of frame width.
    pub max_width_fraction: f64,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size_at_1080: 42.0,
            vertical_position: 0.9,
            fade_seconds: 0.25,
            text_color: [255, 255, 255, 255],
            background: Some([0, 0, 0, 160]),
            background_padding_px: 14.0,
            background_corner_radius_px: 8.0,
            drop_shadow: Some(DropShadow { offset: (2.0, 2.0), color: [0, 0, 0, 200] }),
            outline: None,
            max_width_fraction: 0.8,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CaptionEntry {
    pub id: String,
    pub start: RationalTime,
    pub end: RationalTime,
    pub text: String,
    pub speaker: Option<String>,
    /// Overrides the default centered-horizontal/`style.vertical_position`
    /// placement, normalized to `[0,1]^2` frame coordinates of the image's
    /// center point.
    pub position: Option<(f64, f64)>,
    pub style_override: Option<CaptionStyle>,
}

impl CaptionEntry {
    pub fn new(
        id: impl Into<String>,
        start: RationalTime,
        end: RationalTime,
        text: impl Into<String>,
    ) -> ExportResult<Self> {
        if !end.gt(start) {
            return Err(ExportError::validation("caption entry end must be after start"));
        }
        Ok(Self {
            id: id.into(),
            start,
            end,
            text: text.into(),
            speaker: None,
            position: None,
            style_override: None,
        })
    }

    fn is_active_at(&self, t: RationalTime) -> bool {
        self.start.le(t) && t.lt(self.end)
    }

    /// Linear fade-in over `[start, start+fade]`, full opacity in the
    /// middle, linear fade-out over `[end-fade, end]`.
    fn alpha_at(&self, t: RationalTime, fade_seconds: f64) -> f64 {
        let t_s = t.seconds();
        let start_s = self.start.seconds();
        let end_s = self.end.seconds();
        let fade = fade_seconds.max(0.0);

        let fade_in = if fade <= 0.0 {
            1.0
        } else {
            ((t_s - start_s) / fade).clamp(0.0, 1.0)
        };
        let fade_out = if fade <= 0.0 {
            1.0
        } else {
            ((end_s - t_s) / fade).clamp(0.0, 1.0)
        };
        fade_in.min(fade_out).clamp(0.0, 1.0)
    }
}

/// Glyph-to-pixel fill for a shaped Parley layout, fixed-origin within
/// `dest`. The external collaborator: owns font hinting/antialiasing.
pub trait GlyphRasterizer {
    fn fill_layout(
        &mut self,
        dest: &mut RgbaImage,
        layout: &parley::Layout<TextBrushRgba8>,
        origin: (i32, i32),
        color: [u8; 4],
    ) -> ExportResult<()>;
}

/// Cache of rendered caption text images, keyed by `(entry.id, width,
/// height)`.
#[derive(Default)]
pub struct CaptionCache {
    images: HashMap<(String, u32, u32), Arc<RgbaImage>>,
}

impl CaptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn blend_over(dest: &mut RgbaImage, src: &RgbaImage, origin: (i32, i32), global_alpha: f64) {
    let global_alpha = global_alpha.clamp(0.0, 1.0);
    if global_alpha <= 0.0 {
        return;
    }
    for sy in 0..src.height {
        let dy = origin.1 + sy as i32;
        if dy < 0 || dy as u32 >= dest.height {
            continue;
        }
        for sx in 0..src.width {
            let dx = origin.0 + sx as i32;
            if dx < 0 || dx as u32 >= dest.width {
                continue;
            }
            let s = src.pixel(sx, sy);
            let a = (s[3] as f64 / 255.0) * global_alpha;
            if a <= 0.0 {
                continue;
            }
            let d = dest.pixel(dx as u32, dy as u32);
            let out_a = a + (d[3] as f64 / 255.0) * (1.0 - a);
            let mut out = [0u8; 4];
            for c in 0..3 {
                let blended = s[c] as f64 * a + d[c] as f64 * (d[3] as f64 / 255.0) * (1.0 - a);
                out[c] = if out_a > 0.0 {
                    (blended / out_a).round().clamp(0.0, 255.0) as u8
                } else {
                    0
                };
            }
            out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            dest.set_pixel(dx as u32, dy as u32, out);
        }
    }
}

fn rounded_rect_mask(w: u32, h: u32, radius: f32, color: [u8; 4]) -> RgbaImage {
    let mut img = RgbaImage::new(w, h);
    let r = radius.max(0.0) as f64;
    for y in 0..h {
        for x in 0..w {
            let inside = if r <= 0.0 {
                true
            } else {
                let (fx, fy) = (x as f64, y as f64);
                let (w, h) = (w as f64, h as f64);
                let corner_dist = |cx: f64, cy: f64| ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();
                let in_corner_box = (fx < r || fx > w - r) && (fy < r || fy > h - r);
                if !in_corner_box {
                    true
                } else {
                    let cx = if fx < r { r } else { w - r };
                    let cy = if fy < r { r } else { h - r };
                    corner_dist(cx, cy) <= r
                }
            };
            if inside {
                img.set_pixel(x, y, color);
            }
        }
    }
    img
}

/// Build the cached text image for one caption entry: background box, drop
/// shadow, outline, then glyph fill.
fn build_caption_image(
    entry: &CaptionEntry,
    style: &CaptionStyle,
    frame_width: u32,
    frame_height: u32,
    font_bytes: &[u8],
    layout_engine: &mut TextLayoutEngine,
    rasterizer: &mut dyn GlyphRasterizer,
) -> ExportResult<RgbaImage> {
    let font_size_px = style.font_size_at_1080 * (frame_height as f32 / 1080.0);
    let max_width_px = (style.max_width_fraction * frame_width as f64) as f32;
    let brush = TextBrushRgba8::from_rgba(style.text_color);

    let layout =
        layout_engine.layout_plain(&entry.text, font_bytes, font_size_px, brush, Some(max_width_px))?;

    let text_w = layout.width().ceil().max(1.0) as u32;
    let text_h = layout.height().ceil().max(1.0) as u32;

    let shadow_extra = style
        .drop_shadow
        .map(|s| (s.offset.0.abs().ceil() as u32, s.offset.1.abs().ceil() as u32))
        .unwrap_or((0, 0));
    let outline_extra = style.outline.map(|o| o.width_px.ceil() as u32).unwrap_or(0);
    let pad = style.background_padding_px.max(0.0) as u32;

    let margin = pad + outline_extra + shadow_extra.0.max(shadow_extra.1);
    let img_w = text_w + margin * 2;
    let img_h = text_h + margin * 2;

    let mut img = if let Some(bg) = style.background {
        rounded_rect_mask(img_w, img_h, style.background_corner_radius_px, bg)
    } else {
        RgbaImage::new(img_w, img_h)
    };

    let text_origin = (margin as i32, margin as i32);

    if let Some(shadow) = style.drop_shadow {
        let shadow_origin = (
            text_origin.0 + shadow.offset.0.round() as i32,
            text_origin.1 + shadow.offset.1.round() as i32,
        );
        rasterizer.fill_layout(&mut img, &layout, shadow_origin, shadow.color)?;
    }

    if let Some(outline) = style.outline {
        let w = outline.width_px.round().max(1.0) as i32;
        for dy in [-w, 0, w] {
            for dx in [-w, 0, w] {
                if dx == 0 && dy == 0 {
                    continue;
                }
                rasterizer.fill_layout(
                    &mut img,
                    &layout,
                    (text_origin.0 + dx, text_origin.1 + dy),
                    outline.color,
                )?;
            }
        }
    }

    rasterizer.fill_layout(&mut img, &layout, text_origin, style.text_color)?;

    Ok(img)
}

/// Composite all active caption entries at time `t` onto `frame`.
pub fn burn_captions(
    entries: &[CaptionEntry],
    t: RationalTime,
    frame: &mut RgbaImage,
    default_style: &CaptionStyle,
    font_bytes: &[u8],
    layout_engine: &mut TextLayoutEngine,
    rasterizer: &mut dyn GlyphRasterizer,
    cache: &mut CaptionCache,
) -> ExportResult<()> {
    let (frame_width, frame_height) = (frame.width, frame.height);

    for entry in entries.iter().filter(|e| e.is_active_at(t)) {
        let style = entry.style_override.as_ref().unwrap_or(default_style);
        let alpha = entry.alpha_at(t, style.fade_seconds);
        if alpha <= 0.0 {
            continue;
        }

        let key = (entry.id.clone(), frame_width, frame_height);
        let image = if let Some(cached) = cache.images.get(&key) {
            cached.clone()
        } else {
            let built = build_caption_image(
                entry,
                style,
                frame_width,
                frame_height,
                font_bytes,
                layout_engine,
                rasterizer,
            )?;
            let built = Arc::new(built);
            cache.images.insert(key, built.clone());
            built
        };

        let (cx, cy) = entry.position.unwrap_or((0.5, style.vertical_position));
        let origin_x = (cx * frame_width as f64 - image.width as f64 / 2.0).round() as i32;
        let origin_y = (cy * frame_height as f64 - image.height as f64 / 2.0).round() as i32;

        blend_over(frame, &image, (origin_x, origin_y), alpha);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt(seconds: f64) -> RationalTime {
        RationalTime::from_seconds(seconds)
    }

    struct SolidFillRasterizer;
    impl GlyphRasterizer for SolidFillRasterizer {
        fn fill_layout(
            &mut self,
            dest: &mut RgbaImage,
            layout: &parley::Layout<TextBrushRgba8>,
            origin: (i32, i32),
            color: [u8; 4],
        ) -> ExportResult<()> {
            let w = layout.width().ceil().max(1.0) as u32;
            let h = layout.height().ceil().max(1.0) as u32;
            for y in 0..h {
                let dy = origin.1 + y as i32;
                if dy < 0 || dy as u32 >= dest.height {
                    continue;
                }
                for x in 0..w {
                    let dx = origin.0 + x as i32;
                    if dx < 0 || dx as u32 >= dest.width {
                        continue;
                    }
                    dest.set_pixel(dx as u32, dy as u32, color);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn entry_rejects_end_before_start() {
        assert!(CaptionEntry::new("a", rt(5.0), rt(4.0), "x").is_err());
    }

    #[test]
    fn alpha_envelope_fades_in_and_out() {
        let entry = CaptionEntry::new("a", rt(1.0), rt(3.0), "hi").unwrap();
        assert_eq!(entry.alpha_at(rt(1.0), 0.5), 0.0);
        assert!((entry.alpha_at(rt(1.25), 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(entry.alpha_at(rt(2.0), 0.5), 1.0);
        assert!((entry.alpha_at(rt(2.75), 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(entry.alpha_at(rt(3.0), 0.5), 0.0);
    }

    // These exercise the full shaping + compositing path against a real font
    // and are skipped when no local font file is available to the test binary.
    fn local_test_font() -> Option<Vec<u8>> {
        std::fs::read("assets/PlayfairDisplay.ttf").ok()
    }

    #[test]
    fn burn_captions_composites_active_entry_and_caches_image() {
        let Some(font_bytes) = local_test_font() else { return };
        let entries = vec![CaptionEntry::new("cap1", rt(0.0), rt(2.0), "Hello").unwrap()];
        let mut frame = RgbaImage::new(200, 100);
        let style = CaptionStyle { fade_seconds: 0.0, ..Default::default() };
        let mut engine = TextLayoutEngine::new();
        let mut rasterizer = SolidFillRasterizer;
        let mut cache = CaptionCache::new();

        burn_captions(
            &entries,
            rt(1.0),
            &mut frame,
            &style,
            &font_bytes,
            &mut engine,
            &mut rasterizer,
            &mut cache,
        )
        .unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn inactive_entry_is_skipped() {
        let Some(font_bytes) = local_test_font() else { return };
        let entries = vec![CaptionEntry::new("cap1", rt(5.0), rt(6.0), "Later").unwrap()];
        let mut frame = RgbaImage::new(200, 100);
        let style = CaptionStyle::default();
        let mut engine = TextLayoutEngine::new();
        let mut rasterizer = SolidFillRasterizer;
        let mut cache = CaptionCache::new();

        burn_captions(
            &entries,
            rt(1.0),
            &mut frame,
            &style,
            &font_bytes,
            &mut engine,
            &mut rasterizer,
            &mut cache,
        )
        .unwrap();

        assert!(cache.is_empty());
    }
}
