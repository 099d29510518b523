//! Parley-backed text shaping, feeding the caption burner's RGBA8 brush.

use crate::error::{ExportError, ExportResult};

/// RGBA8 brush color carried through Parley layout runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextBrushRgba8 {
    pub fn from_rgba(color: [u8; 4]) -> Self {
        Self { r: color[0], g: color[1], b: color[2], a: color[3] }
    }
}

/// Stateful helper for building Parley text layouts from raw font bytes.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape and lay out plain text using provided font bytes and styling.
    /// `max_width_px`, when given, wraps and left-aligns; otherwise the text
    /// lays out on a single unbounded line.
    pub fn layout_plain(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrushRgba8,
        max_width_px: Option<f32>,
    ) -> ExportResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ExportError::validation("caption text size_px must be finite and > 0"));
        }
        if text.is_empty() {
            return Err(ExportError::validation("caption text must be non-empty"));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| ExportError::validation("no font families registered from font bytes"))?;

        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ExportError::validation("registered font family has no name"))?
            .to_string();

        let mut builder = self.layout_ctx.ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        if let Some(w) = max_width_px {
            layout.break_all_lines(Some(w));
            layout.align(Some(w), parley::Alignment::Start, parley::AlignmentOptions::default());
        } else {
            layout.break_all_lines(None);
        }

        Ok(layout)
    }
}
