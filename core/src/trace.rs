//! Socket tracing
//!
//! Finds which image-source node feeds a semantically named input, looking
//! through at most one normal-decoder node on the way.

use fepbr_shared::constants::{GLTF_OUTPUT_GROUP_MARKER, PARAMETER_GROUP_MARKER};

use crate::channel::ChannelFamily;
use crate::graph::{Endpoint, NodeId, ShadingGraph};

/// Primary input of a normal-decoder node.
pub const DECODER_INPUT: &str = "Color";

/// Upstream output feeding `target.input`, with the decoder bypass applied:
/// when the input is fed by a normal decoder whose own `Color` input is
/// linked, the decoder's source is returned instead of the decoder.
pub fn trace_socket(graph: &ShadingGraph, target: NodeId, input: &str) -> Option<Endpoint> {
    let link = graph.incoming(target, input)?;
    let source = graph.node(link.from.node)?;

    if source.is_normal_decoder()
        && let Some(inner) = graph.incoming(source.id, DECODER_INPUT)
    {
        return Some(inner.from.clone());
    }

    Some(link.from.clone())
}

/// First image-source node feeding any of `names` on `target`.
///
/// Names are tried in order; a linked name whose source is not an image
/// (after at most one decoder hop) does not stop the search.
pub fn trace_image_source(graph: &ShadingGraph, target: NodeId, names: &[&str]) -> Option<NodeId> {
    let node = graph.node(target)?;

    names
        .iter()
        .filter(|name| node.has_input(name))
        .filter_map(|name| trace_socket(graph, target, name))
        .find(|endpoint| {
            graph
                .node(endpoint.node)
                .is_some_and(|source| source.is_image_source())
        })
        .map(|endpoint| endpoint.node)
}

/// Nodes whose inputs describe the material's channels, in lookup order:
/// standard shading nodes, parameter groups, then the side-channel glTF
/// output group that carries occlusion.
pub fn shading_targets(graph: &ShadingGraph) -> Vec<NodeId> {
    let standard = graph.nodes().iter().filter(|n| n.is_standard_shading());
    let groups = graph
        .nodes()
        .iter()
        .filter(|n| n.is_group_containing(PARAMETER_GROUP_MARKER));
    let side = graph
        .nodes()
        .iter()
        .filter(|n| n.is_group_containing(GLTF_OUTPUT_GROUP_MARKER));

    standard.chain(groups).chain(side).map(|n| n.id).collect()
}

/// Image-source node supplying `family`, searching every shading target.
pub fn trace_family(graph: &ShadingGraph, family: ChannelFamily) -> Option<NodeId> {
    shading_targets(graph)
        .into_iter()
        .find_map(|target| trace_image_source(graph, target, family.semantic_names()))
}

/// Image sources for all five families, indexed like [`ChannelFamily::ALL`].
pub fn channel_sources(graph: &ShadingGraph) -> [Option<NodeId>; 5] {
    ChannelFamily::ALL.map(|family| trace_family(graph, family))
}
