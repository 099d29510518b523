//! Graph Builder: turns a resolved segment into a render graph.

use std::collections::BTreeMap;

use crate::error::ExportResult;
use crate::graph::nodes::{NodeKind, RenderGraph};
use crate::timeline::resolver::{ResolvedClip, Segment};

/// Per-asset metadata the builder needs but the timeline model doesn't carry:
/// whether an asset is a scientific image (tone-mapped, ACES-routed) and its
/// name markers (`Density`/`Color`/filter-band names) for stack-mode routing.
#[derive(Clone, Debug, Default)]
pub struct AssetInfo {
    pub is_scientific_image: bool,
    pub marker: Option<String>,
    pub tone_stats: Option<ToneStats>,
}

#[derive(Clone, Copy, Debug)]
pub struct ToneStats {
    pub median: f64,
    pub p99: Option<f64>,
    pub max: f64,
}

pub trait AssetCatalog {
    fn info(&self, asset_id: &str) -> AssetInfo;
}

fn tone_map_params(stats: ToneStats) -> (f64, f64, f64) {
    let black_point = stats.median * 8.0;
    let mut white_point = stats.p99.unwrap_or(stats.max) * 8.0;
    if white_point <= black_point {
        white_point = black_point + 1.0;
    }
    (black_point, white_point, 2.8)
}

/// Build the DAG for one resolved segment.
pub fn build_graph(segment: &Segment, catalog: &dyn AssetCatalog) -> ExportResult<RenderGraph> {
    let mut graph = RenderGraph::new();

    // group active clips by track, highest track index rendered on top
    let mut by_track: BTreeMap<usize, Vec<&ResolvedClip>> = BTreeMap::new();
    for clip in &segment.active_clips {
        by_track.entry(clip.track_index).or_default().push(clip);
    }

    let any_track_has_multiple = by_track.values().any(|clips| clips.len() > 1);

    let output = graph.add_node(NodeKind::Output);

    if !any_track_has_multiple {
        build_sequence_mode(&mut graph, &by_track, catalog, output)?;
    } else {
        build_stack_or_transition_mode(&mut graph, segment, &by_track, catalog, output)?;
    }

    Ok(graph)
}

fn source_node_for(
    graph: &mut RenderGraph,
    catalog: &dyn AssetCatalog,
    clip: &ResolvedClip,
) -> crate::graph::nodes::NodeId {
    let src = graph.add_node(NodeKind::Source {
        asset_id: clip.asset_id.clone(),
        source_start_seconds: clip.source_range.start.seconds(),
        duration_seconds: clip.source_range.duration.seconds(),
    });
    let info = catalog.info(&clip.asset_id);
    if info.is_scientific_image {
        let stats = info.tone_stats.unwrap_or(ToneStats {
            median: 0.0,
            p99: None,
            max: 1.0,
        });
        let (black_point, white_point, gamma) = tone_map_params(stats);
        let tone = graph.add_node(NodeKind::ToneMap {
            black_point,
            white_point,
            gamma,
        });
        graph.connect(tone, "source", src, "out").expect("fixed port");
        tone
    } else {
        src
    }
}

/// No track has more than one active clip: connect the highest-track-index
/// clip directly to Output.
fn build_sequence_mode(
    graph: &mut RenderGraph,
    by_track: &BTreeMap<usize, Vec<&ResolvedClip>>,
    catalog: &dyn AssetCatalog,
    output: crate::graph::nodes::NodeId,
) -> ExportResult<()> {
    let top_track = by_track.keys().max().copied();
    let Some(top_track) = top_track else {
        return Ok(());
    };
    let clip = by_track[&top_track][0];
    let node = source_node_for(graph, catalog, clip);
    graph.connect(output, "source", node, "out")
}

/// Some track has >1 active clip: either chain Transition nodes on that
/// track (per segment's transition type), or composite additively in Stack
/// mode, routing scientific-image / Density+Color assets to their
/// specializations.
fn build_stack_or_transition_mode(
    graph: &mut RenderGraph,
    segment: &Segment,
    by_track: &BTreeMap<usize, Vec<&ResolvedClip>>,
    catalog: &dyn AssetCatalog,
    output: crate::graph::nodes::NodeId,
) -> ExportResult<()> {
    if let Some(transition) = &segment.transition {
        // find the transitioning track (the one with >1 active clip) and
        // chain pairwise in temporal order: (A,B) then (prev_output,C) etc.
        let transitioning = by_track.iter().find(|(_, clips)| clips.len() > 1);
        if let Some((track_index, clips)) = transitioning {
            let mut ordered: Vec<&&ResolvedClip> = clips.iter().collect();
            ordered.sort_by(|a, b| {
                a.segment_range
                    .start
                    .cmp_exact(b.segment_range.start)
            });

            let mut prev = source_node_for(graph, catalog, ordered[0]);
            for next_clip in &ordered[1..] {
                let next_node = source_node_for(graph, catalog, next_clip);
                let trans = graph.add_node(NodeKind::Transition {
                    transition_kind: transition.kind,
                    progress: 0.5,
                });
                graph.connect(trans, "a", prev, "out")?;
                graph.connect(trans, "b", next_node, "out")?;
                prev = trans;
            }

            // composite any other, non-transitioning tracks on top via Stack.
            let other_tracks: Vec<_> = by_track
                .iter()
                .filter(|(idx, _)| **idx != *track_index)
                .collect();
            if other_tracks.is_empty() {
                return graph.connect(output, "source", prev, "out");
            }
            return build_stack(graph, by_track, catalog, output, Some(prev));
        }
    }

    build_stack(graph, by_track, catalog, output, None)
}

/// Additive composite of every active clip, with Density/Color and
/// multi-channel scientific-image specializations.
fn build_stack(
    graph: &mut RenderGraph,
    by_track: &BTreeMap<usize, Vec<&ResolvedClip>>,
    catalog: &dyn AssetCatalog,
    output: crate::graph::nodes::NodeId,
    precomposited: Option<crate::graph::nodes::NodeId>,
) -> ExportResult<()> {
    let mut density_node = None;
    let mut color_node = None;
    let mut band_nodes: BTreeMap<String, crate::graph::nodes::NodeId> = BTreeMap::new();
    let mut plain_layers = Vec::new();

    if let Some(p) = precomposited {
        plain_layers.push(p);
    }

    for clips in by_track.values() {
        for clip in clips {
            let info = catalog.info(&clip.asset_id);
            let node = source_node_for(graph, catalog, clip);
            match info.marker.as_deref() {
                Some("Density") => density_node = Some(node),
                Some("Color") => color_node = Some(node),
                Some(band) if info.is_scientific_image => {
                    band_nodes.insert(band.to_string(), node);
                }
                _ => plain_layers.push(node),
            }
        }
    }

    if let (Some(density), Some(color)) = (density_node, color_node) {
        let vol = graph.add_node(NodeKind::VolumetricComposite);
        graph.connect(vol, "Density", density, "out")?;
        graph.connect(vol, "Color", color, "out")?;
        plain_layers.push(vol);
    }

    if band_nodes.len() > 1 {
        let palette: BTreeMap<String, [f32; 3]> = band_nodes
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), default_band_color(i)))
            .collect();
        let multi = graph.add_node(NodeKind::MultiChannelComposite {
            band_colors: palette,
        });
        for (band, node) in &band_nodes {
            graph.connect(multi, band, *node, "out")?;
        }
        let aces = graph.add_node(NodeKind::AcesOutput);
        graph.connect(aces, "source", multi, "out")?;
        plain_layers.push(aces);
    } else {
        plain_layers.extend(band_nodes.values().copied());
    }

    if plain_layers.len() == 1 {
        return graph.connect(output, "source", plain_layers[0], "out");
    }

    let composite = graph.add_node(NodeKind::Composite);
    for (i, layer) in plain_layers.iter().enumerate() {
        graph.connect(composite, &format!("layer{i}"), *layer, "out")?;
    }
    graph.connect(output, "source", composite, "out")
}

/// Fixed artistic palette for scientific-image filter bands, cycling through
/// a small fixed hue set the way a false-color microscopy viewer would.
fn default_band_color(index: usize) -> [f32; 3] {
    const PALETTE: [[f32; 3]; 6] = [
        [0.0, 0.6, 1.0],
        [1.0, 0.2, 0.2],
        [0.2, 1.0, 0.2],
        [1.0, 0.8, 0.0],
        [0.7, 0.2, 1.0],
        [0.2, 1.0, 0.9],
    ];
    PALETTE[index % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::{RationalTime, TimeRange};
    use crate::timeline::resolver::ResolvedClip;

    struct NoAssets;
    impl AssetCatalog for NoAssets {
        fn info(&self, _asset_id: &str) -> AssetInfo {
            AssetInfo::default()
        }
    }

    fn rt(n: i64) -> RationalTime {
        RationalTime::new(n, 1).unwrap()
    }

    fn resolved(track: usize, id: &str, start: i64, dur: i64) -> ResolvedClip {
        ResolvedClip {
            clip_id: id.into(),
            asset_id: format!("asset-{id}"),
            track_index: track,
            segment_range: TimeRange::new(rt(start), rt(dur)).unwrap(),
            source_range: TimeRange::new(rt(0), rt(dur)).unwrap(),
        }
    }

    #[test]
    fn sequence_mode_connects_top_track_directly() {
        let segment = Segment {
            range: TimeRange::new(rt(0), rt(1)).unwrap(),
            active_clips: vec![resolved(0, "a", 0, 1), resolved(1, "b", 0, 1)],
            transition: None,
        };
        let graph = build_graph(&segment, &NoAssets).unwrap();
        // output + top-track source == 2 nodes
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn transition_segment_chains_transition_node() {
        let segment = Segment {
            range: TimeRange::new(rt(1), rt(2)).unwrap(),
            active_clips: vec![resolved(0, "a", 1, 2), resolved(0, "b", 1, 2)],
            transition: Some(crate::timeline::model::Transition {
                id: "t".into(),
                kind: crate::timeline::model::TransitionKind::Dissolve,
                duration: rt(1),
            }),
        };
        let graph = build_graph(&segment, &NoAssets).unwrap();
        // output + 2 sources + 1 transition node == 4
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn stack_mode_composites_multiple_tracks() {
        let segment = Segment {
            range: TimeRange::new(rt(0), rt(1)).unwrap(),
            active_clips: vec![resolved(0, "a", 0, 1), resolved(1, "b", 0, 1)],
            transition: None,
        };
        // force stack mode: put two clips on the SAME track to trigger it.
        let segment = Segment {
            active_clips: vec![
                resolved(0, "a", 0, 1),
                resolved(0, "b", 0, 1),
                resolved(1, "c", 0, 1),
            ],
            ..segment
        };
        let graph = build_graph(&segment, &NoAssets).unwrap();
        assert!(graph.len() >= 4);
    }
}
