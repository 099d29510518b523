//! Per-track mixing into a master bus ("for each
//! audio clip, build a source node; for a track, mix sources into a
//! per-track bus; buses mix into the mastering chain input").

use crate::audio::source::ProceduralSource;

/// A single clip's contribution to a track bus.
pub struct ClipVoice {
    pub source: ProceduralSource,
    pub clip_start_sample: i64,
    pub clip_end_sample: i64,
    pub clip_offset: i64,
    /// Envelope gain as a function of absolute time in seconds (fade in/out).
    pub envelope: Box<dyn Fn(f64) -> f64 + Send>,
}

#[derive(Default)]
pub struct TrackBus {
    pub voices: Vec<ClipVoice>,
}

impl TrackBus {
    /// Mix every active voice into `channels` interleaved output buffers of
    /// `n` frames starting at `render_start`, summing contributions.
    pub fn render_chunk(&mut self, render_start: i64, n: usize, channels: usize, out: &mut [Vec<f64>]) {
        debug_assert_eq!(out.len(), channels);
        for buf in out.iter_mut() {
            buf.iter_mut().take(n).for_each(|s| *s = 0.0);
        }
        let mut scratch = vec![0.0_f64; n];
        for voice in &mut self.voices {
            voice.source.pull(
                render_start,
                0,
                n,
                voice.clip_start_sample,
                voice.clip_end_sample,
                voice.clip_offset,
                voice.envelope.as_ref(),
                &mut scratch,
            );
            for buf in out.iter_mut() {
                for (dst, src) in buf.iter_mut().take(n).zip(scratch.iter()) {
                    *dst += *src;
                }
            }
        }
    }
}

pub struct AudioBus {
    pub tracks: Vec<TrackBus>,
}

pub struct AudioGraph {
    pub bus: AudioBus,
    pub sample_rate: u32,
    pub channels: usize,
}

impl AudioGraph {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            bus: AudioBus { tracks: Vec::new() },
            sample_rate,
            channels,
        }
    }

    /// Mix every track bus into a single interleaved-per-channel chunk of
    /// `n` frames starting at `render_start_sample`.
    pub fn render_chunk(&mut self, render_start_sample: i64, n: usize) -> Vec<Vec<f64>> {
        let mut mix = vec![vec![0.0_f64; n]; self.channels];
        for track in &mut self.bus.tracks {
            let mut track_out = vec![vec![0.0_f64; n]; self.channels];
            track.render_chunk(render_start_sample, n, self.channels, &mut track_out);
            for (mix_ch, track_ch) in mix.iter_mut().zip(track_out.iter()) {
                for (m, t) in mix_ch.iter_mut().zip(track_ch.iter()) {
                    *m += *t;
                }
            }
        }
        mix
    }
}
