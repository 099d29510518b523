//! Offline audio rendering. Drives a chunk source in "manual render
//! mode", pulling chunks of at most `max_frame_count` frames until the
//! requested total is produced, then runs the mastering chain over each
//! chunk before handing it to a sink.

use std::thread;
use std::time::Duration;

use crate::audio::graph::AudioGraph;
use crate::audio::mastering::MasteringChain;
use crate::error::{ExportError, ExportResult};

/// Mirrors the underlying render-graph engine's per-chunk outcome. Real
/// backends (the AVAudioEngine-alike API this generalizes) can report any
/// of these; the procedural `AudioGraph` in this crate only ever reports
/// `Ok`, but the loop below handles all four so a future device-backed
/// `AudioChunkSource` slots in unmodified.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkStatus {
    Ok,
    InsufficientData,
    CannotDoNow,
    Error(String),
}

/// A pull source for one chunk of interleaved-per-channel audio at a time.
pub trait AudioChunkSource {
    fn render_chunk(&mut self, render_start_sample: i64, n: usize) -> (ChunkStatus, Vec<Vec<f64>>);
}

impl AudioChunkSource for AudioGraph {
    fn render_chunk(&mut self, render_start_sample: i64, n: usize) -> (ChunkStatus, Vec<Vec<f64>>) {
        (ChunkStatus::Ok, AudioGraph::render_chunk(self, render_start_sample, n))
    }
}

/// One mastered chunk handed to the sink, with its presentation sample index.
#[derive(Clone, Debug)]
pub struct RenderedChunk {
    pub start_sample: i64,
    pub channels: Vec<Vec<f64>>,
}

#[derive(Clone, Debug)]
pub struct AudioRenderConfig {
    pub total_frames: i64,
    pub sample_rate: u32,
    pub channel_count: usize,
    pub max_frame_count: usize,
    /// Reuse a single scratch buffer across chunks rather than allocating
    /// one per chunk. The procedural source writes straight into the chunk
    /// buffer either way, so this only governs whether the loop keeps a
    /// warm allocation around for backends that need one.
    pub reuse_scratch: bool,
    /// Consecutive `InsufficientData` chunks after which the loop gives up
    /// and fails with `Underfeed` rather than silently zero-filling forever.
    /// Spec's Open Question: source silently zero-fills; we choose to cap it
    /// (see DESIGN.md).
    pub max_consecutive_insufficient: u32,
}

impl Default for AudioRenderConfig {
    fn default() -> Self {
        Self {
            total_frames: 0,
            sample_rate: crate::audio::DEFAULT_SAMPLE_RATE,
            channel_count: crate::audio::DEFAULT_CHANNELS,
            max_frame_count: 4096,
            reuse_scratch: true,
            max_consecutive_insufficient: 8,
        }
    }
}

/// Drive `source` to completion, applying `mastering` to every chunk and
/// passing it to `sink`. Returns the total number of frames appended.
pub fn render_offline(
    source: &mut dyn AudioChunkSource,
    mastering: &MasteringChain,
    config: &AudioRenderConfig,
    mut sink: impl FnMut(RenderedChunk) -> ExportResult<()>,
) -> ExportResult<i64> {
    if config.max_frame_count == 0 {
        return Err(ExportError::validation("max_frame_count must be > 0"));
    }

    let mut rendered: i64 = 0;
    let mut consecutive_insufficient: u32 = 0;
    // `reuse_scratch` only affects whether we keep a warm allocation across
    // iterations; the chunk handed to the sink is always freshly populated.
    let mut scratch: Option<Vec<Vec<f64>>> = if config.reuse_scratch {
        Some(vec![Vec::with_capacity(config.max_frame_count); config.channel_count])
    } else {
        None
    };

    while rendered < config.total_frames {
        let remaining = (config.total_frames - rendered) as usize;
        let n = remaining.min(config.max_frame_count);

        let (status, mut channels) = source.render_chunk(rendered, n);

        match status {
            ChunkStatus::Ok => {
                consecutive_insufficient = 0;
            }
            ChunkStatus::InsufficientData => {
                consecutive_insufficient += 1;
                if consecutive_insufficient > config.max_consecutive_insufficient {
                    return Err(ExportError::Underfeed {
                        appended: rendered as u64,
                        expected: config.total_frames as u64,
                    });
                }
                channels = vec![vec![0.0; n]; config.channel_count];
            }
            ChunkStatus::CannotDoNow => {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            ChunkStatus::Error(detail) => {
                return Err(ExportError::engine_failed(detail));
            }
        }

        if let Some(buf) = scratch.as_mut() {
            for (dst, src) in buf.iter_mut().zip(channels.iter()) {
                dst.clear();
                dst.extend_from_slice(src);
            }
        }

        mastering.process(&mut channels);

        let start_sample = rendered;
        sink(RenderedChunk {
            start_sample,
            channels,
        })?;

        rendered += n as i64;
    }

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedSource {
        total: i64,
        statuses: Vec<ChunkStatus>,
    }

    impl AudioChunkSource for ScriptedSource {
        fn render_chunk(&mut self, render_start_sample: i64, n: usize) -> (ChunkStatus, Vec<Vec<f64>>) {
            let status = if self.statuses.is_empty() {
                ChunkStatus::Ok
            } else {
                self.statuses.remove(0)
            };
            let _ = render_start_sample;
            (status, vec![vec![0.5; n]; 1])
        }
    }

    #[test]
    fn renders_full_duration_in_chunks() {
        let mut source = ScriptedSource {
            total: 10_000,
            statuses: vec![],
        };
        let mastering = MasteringChain::default();
        let config = AudioRenderConfig {
            total_frames: 10_000,
            sample_rate: 48_000,
            channel_count: 1,
            max_frame_count: 4096,
            reuse_scratch: true,
            max_consecutive_insufficient: 8,
        };
        let mut chunks = Vec::new();
        let appended = render_offline(&mut source, &mastering, &config, |c| {
            chunks.push(c);
            Ok(())
        })
        .unwrap();
        assert_eq!(appended, 10_000);
        assert_eq!(chunks.len(), 3); // 4096, 4096, 1808
        assert_eq!(chunks[0].channels[0].len(), 4096);
        assert_eq!(chunks[2].channels[0].len(), 1808);
        assert_eq!(chunks[1].start_sample, 4096);
    }

    #[test]
    fn insufficient_data_zero_fills_until_threshold_then_underfeeds() {
        let mut source = ScriptedSource {
            total: 100,
            statuses: vec![ChunkStatus::InsufficientData; 20],
        };
        let mastering = MasteringChain::default();
        let config = AudioRenderConfig {
            total_frames: 100,
            sample_rate: 48_000,
            channel_count: 1,
            max_frame_count: 10,
            reuse_scratch: false,
            max_consecutive_insufficient: 3,
        };
        let result = render_offline(&mut source, &mastering, &config, |_| Ok(()));
        assert!(matches!(result, Err(ExportError::Underfeed { .. })));
    }

    #[test]
    fn error_status_fails_fast() {
        let mut source = ScriptedSource {
            total: 100,
            statuses: vec![ChunkStatus::Error("device gone".into())],
        };
        let mastering = MasteringChain::default();
        let config = AudioRenderConfig {
            total_frames: 100,
            sample_rate: 48_000,
            channel_count: 1,
            max_frame_count: 10,
            ..AudioRenderConfig::default()
        };
        let result = render_offline(&mut source, &mastering, &config, |_| Ok(()));
        assert!(matches!(result, Err(ExportError::EngineFailed(_))));
    }

    #[test]
    fn limiter_keeps_peak_under_ceiling_across_chunks() {
        struct LoudSource;
        impl AudioChunkSource for LoudSource {
            fn render_chunk(&mut self, _start: i64, n: usize) -> (ChunkStatus, Vec<Vec<f64>>) {
                (ChunkStatus::Ok, vec![vec![1.4; n]; 2])
            }
        }
        let mut source = LoudSource;
        let mastering = MasteringChain::default();
        let config = AudioRenderConfig {
            total_frames: 50,
            sample_rate: 48_000,
            channel_count: 2,
            max_frame_count: 25,
            ..AudioRenderConfig::default()
        };
        let mut peak = 0.0_f64;
        render_offline(&mut source, &mastering, &config, |c| {
            for ch in &c.channels {
                for &s in ch {
                    peak = peak.max(s.abs());
                }
            }
            Ok(())
        })
        .unwrap();
        assert!(peak <= 0.98 + 1e-9, "peak={peak}");
    }
}
