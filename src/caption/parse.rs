//! SRT and WebVTT caption file parsers. Timecodes are
//! reconstructed at the default rational timescale so downstream fade-envelope
//! math stays exact.

use regex::Regex;
use std::sync::OnceLock;

use crate::caption::burner::CaptionEntry;
use crate::error::{ExportError, ExportResult};
use crate::foundation::RationalTime;

fn inline_tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

fn strip_inline_tags(text: &str) -> String {
    inline_tag_pattern().replace_all(text, "").to_string()
}

fn srt_timecode_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2}),(\d{3})")
            .unwrap()
    })
}

fn vtt_timecode_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(\d{2}):)?(\d{2}):(\d{2})\.(\d{3})\s*-->\s*(?:(\d{2}):)?(\d{2}):(\d{2})\.(\d{3})",
        )
        .unwrap()
    })
}

fn seconds_from_hms(h: i64, m: i64, s: i64, ms: i64) -> f64 {
    (h * 3600 + m * 60 + s) as f64 + ms as f64 / 1000.0
}

/// Parse an SRT file's contents into a list of entries sorted by `start`.
///
/// Each cue is `index\nHH:MM:SS,mmm --> HH:MM:SS,mmm\ntext...\n\n`. Inline
/// `<...>` tags are stripped from the text.
pub fn parse_srt(content: &str) -> ExportResult<Vec<CaptionEntry>> {
    let mut entries = Vec::new();
    let blocks = content.replace("\r\n", "\n");
    for block in blocks.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let mut lines = block.lines();
        let first = lines.next().unwrap_or_default().trim();

        // The index line is optional in malformed files; only treat it as a
        // separate line if the next line matches a timecode.
        let (timecode_line, text_lines): (&str, Vec<&str>) =
            if srt_timecode_pattern().is_match(first) {
                (first, lines.collect())
            } else {
                let tc = lines.next().unwrap_or_default().trim();
                (tc, lines.collect())
            };

        let caps = srt_timecode_pattern()
            .captures(timecode_line)
            .ok_or_else(|| ExportError::UnsupportedFormat(format!("malformed SRT cue timecode: '{timecode_line}'")))?;
        let start = seconds_from_hms(
            caps[1].parse().unwrap_or(0),
            caps[2].parse().unwrap_or(0),
            caps[3].parse().unwrap_or(0),
            caps[4].parse().unwrap_or(0),
        );
        let end = seconds_from_hms(
            caps[5].parse().unwrap_or(0),
            caps[6].parse().unwrap_or(0),
            caps[7].parse().unwrap_or(0),
            caps[8].parse().unwrap_or(0),
        );

        let text = strip_inline_tags(&text_lines.join("\n")).trim().to_string();
        entries.push(CaptionEntry::new(
            entries.len().to_string(),
            RationalTime::from_seconds(start),
            RationalTime::from_seconds(end),
            text,
        )?);
    }

    entries.sort_by(|a, b| a.start.cmp_exact(b.start));
    Ok(entries)
}

/// Parse a WebVTT file's contents, skipping the `WEBVTT` header and any
/// `NOTE` blocks.
pub fn parse_vtt(content: &str) -> ExportResult<Vec<CaptionEntry>> {
    let mut entries = Vec::new();
    let blocks = content.replace("\r\n", "\n");
    for block in blocks.split("\n\n") {
        let block = block.trim();
        if block.is_empty() || block.starts_with("WEBVTT") || block.starts_with("NOTE") {
            continue;
        }

        let mut lines = block.lines();
        let mut line = lines.next().unwrap_or_default().trim();
        let mut timecode_line = line;
        let mut rest: Vec<&str> = lines.collect();

        if !vtt_timecode_pattern().is_match(line) {
            // Optional cue identifier line before the timecode.
            if let Some(next) = rest.first() {
                timecode_line = next;
                rest = rest[1..].to_vec();
            }
        }
        line = timecode_line;

        let caps = match vtt_timecode_pattern().captures(line) {
            Some(c) => c,
            None => continue, // not a cue block (e.g. a bare STYLE block)
        };

        let start_h = caps.get(1).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
        let start = seconds_from_hms(
            start_h,
            caps[2].parse().unwrap_or(0),
            caps[3].parse().unwrap_or(0),
            caps[4].parse().unwrap_or(0),
        );
        let end_h = caps.get(5).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
        let end = seconds_from_hms(
            end_h,
            caps[6].parse().unwrap_or(0),
            caps[7].parse().unwrap_or(0),
            caps[8].parse().unwrap_or(0),
        );

        let text = strip_inline_tags(&rest.join("\n")).trim().to_string();
        entries.push(CaptionEntry::new(
            entries.len().to_string(),
            RationalTime::from_seconds(start),
            RationalTime::from_seconds(end),
            text,
        )?);
    }

    entries.sort_by(|a, b| a.start.cmp_exact(b.start));
    Ok(entries)
}
