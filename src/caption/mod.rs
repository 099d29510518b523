//! Caption Burner: SRT/VTT parsing and per-frame subtitle compositing.

pub mod burner;
pub mod export;
pub mod layout;
pub mod parse;

pub use burner::{burn_captions, CaptionCache, CaptionEntry, CaptionStyle, DropShadow, GlyphRasterizer, Outline};
pub use export::{read_json, write_json, write_plain_text, write_srt, write_vtt};
pub use layout::{TextBrushRgba8, TextLayoutEngine};
pub use parse::{parse_srt, parse_vtt};
