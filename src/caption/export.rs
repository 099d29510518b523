//! Caption output forms: SRT/VTT writers plus a JSON and a plain-text form.
//! Mirrors `caption::parse`'s timecode conventions in reverse.

use serde::{Deserialize, Serialize};

use crate::caption::burner::CaptionEntry;
use crate::error::{ExportError, ExportResult};
use crate::foundation::RationalTime;

fn hms_from_seconds(total: f64) -> (i64, i64, i64, i64) {
    let total_ms = (total * 1000.0).round().max(0.0) as i64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    let s = total_s % 60;
    let total_m = total_s / 60;
    let m = total_m % 60;
    let h = total_m / 60;
    (h, m, s, ms)
}

/// Render `entries` as an SRT file body, in order, renumbering sequentially.
pub fn write_srt(entries: &[CaptionEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        let (sh, sm, ss, sms) = hms_from_seconds(entry.start.seconds());
        let (eh, em, es, ems) = hms_from_seconds(entry.end.seconds());
        out.push_str(&format!("{}\n", i + 1));
        out.push_str(&format!(
            "{sh:02}:{sm:02}:{ss:02},{sms:03} --> {eh:02}:{em:02}:{es:02},{ems:03}\n"
        ));
        match &entry.speaker {
            Some(speaker) => out.push_str(&format!("{speaker}: {}\n", entry.text)),
            None => out.push_str(&format!("{}\n", entry.text)),
        }
        out.push('\n');
    }
    out
}

/// Render `entries` as a WebVTT file body.
pub fn write_vtt(entries: &[CaptionEntry]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for entry in entries {
        let (sh, sm, ss, sms) = hms_from_seconds(entry.start.seconds());
        let (eh, em, es, ems) = hms_from_seconds(entry.end.seconds());
        out.push_str(&format!(
            "{sh:02}:{sm:02}:{ss:02}.{sms:03} --> {eh:02}:{em:02}:{es:02}.{ems:03}\n"
        ));
        match &entry.speaker {
            Some(speaker) => out.push_str(&format!("{speaker}: {}\n", entry.text)),
            None => out.push_str(&format!("{}\n", entry.text)),
        }
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct JsonEntry {
    index: usize,
    start: f64,
    end: f64,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    speaker: Option<String>,
}

#[derive(Serialize)]
struct JsonDocument {
    version: u32,
    language: String,
    duration: f64,
    engine: String,
    entries: Vec<JsonEntry>,
}

/// `{version, language, duration, engine, entries:[...]}`.
/// `duration` is the latest `end` across all entries (`0.0` if empty).
pub fn write_json(entries: &[CaptionEntry], language: &str, engine: &str) -> serde_json::Result<String> {
    let duration = entries.iter().map(|e| e.end.seconds()).fold(0.0_f64, f64::max);
    let doc = JsonDocument {
        version: 1,
        language: language.to_string(),
        duration,
        engine: engine.to_string(),
        entries: entries
            .iter()
            .enumerate()
            .map(|(i, e)| JsonEntry {
                index: i,
                start: e.start.seconds(),
                end: e.end.seconds(),
                text: e.text.clone(),
                speaker: e.speaker.clone(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&doc)
}

#[derive(Deserialize)]
struct JsonEntryIn {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    speaker: Option<String>,
}

#[derive(Deserialize)]
struct JsonDocumentIn {
    entries: Vec<JsonEntryIn>,
}

/// Inverse of [`write_json`]: only the `entries` array is consulted.
pub fn read_json(content: &str) -> ExportResult<Vec<CaptionEntry>> {
    let doc: JsonDocumentIn = serde_json::from_str(content)
        .map_err(|err| ExportError::UnsupportedFormat(format!("malformed caption JSON: {err}")))?;
    doc.entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            let mut entry = CaptionEntry::new(
                i.to_string(),
                RationalTime::from_seconds(e.start),
                RationalTime::from_seconds(e.end),
                e.text,
            )?;
            entry.speaker = e.speaker;
            Ok(entry)
        })
        .collect()
}

/// Speaker-labeled plain-text blocks: one paragraph per entry, blank-line
/// separated, with a `Speaker: ` prefix when known.
pub fn write_plain_text(entries: &[CaptionEntry]) -> String {
    let mut blocks = Vec::with_capacity(entries.len());
    for entry in entries {
        match &entry.speaker {
            Some(speaker) => blocks.push(format!("{speaker}: {}", entry.text)),
            None => blocks.push(entry.text.clone()),
        }
    }
    blocks.join("\n\n")
}
