//! Material graph rewriter
//!
//! Replaces the standard shading node of a material with an instance of the
//! FePBR parameter group, carrying every traced input across. A rewrite
//! either completes or leaves the graph exactly as it found it: all
//! preconditions are checked before the first mutation.

use fepbr_shared::constants::{GLTF_OUTPUT_GROUP_MARKER, PARAMETER_GROUP_MARKER};
use tracing::debug;

use crate::graph::{GraphError, Node, NodeId, ShadingGraph};
use crate::trace::trace_socket;

/// Standard input name to parameter-group input name.
///
/// `Emission` is the legacy name of `Emission Color`; whichever comes first
/// and is linked wins.
pub const INPUT_MAP: &[(&str, &str)] = &[
    ("Base Color", "Albedo Map"),
    ("Metallic", "Metallic"),
    ("Roughness", "Roughness"),
    ("Normal", "Normal Map"),
    ("Emission Color", "Emission"),
    ("Emission", "Emission"),
    ("Alpha", "Alpha Map"),
];

/// Standard input whose source is traced through a normal decoder.
const NORMAL_INPUT: &str = "Normal";
const OCCLUSION_INPUT: &str = "Occlusion";
const AO_INPUT: &str = "AO";
const SURFACE_INPUT: &str = "Surface";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("No standard shading node in the graph")]
    NoStandardNode,

    #[error("Template has no group node whose tree contains 'FePBR'")]
    MissingTemplate,

    #[error("Group '{0}' has no shader output")]
    MissingShaderOutput(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// What a successful rewrite did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// The inserted group node
    pub group: NodeId,
    /// Group inputs that received a link, in mapping order
    pub rewired: Vec<String>,
    /// Whether occlusion was carried over from the glTF output group
    pub occlusion: bool,
    /// Whether the group now feeds the material output's surface
    pub connected_output: bool,
}

/// First group node in `template` whose tree name contains the FePBR marker.
pub fn find_template_group(template: &ShadingGraph) -> Option<&Node> {
    template
        .nodes()
        .iter()
        .find(|n| n.is_group_containing(PARAMETER_GROUP_MARKER))
}

/// Swap the standard shading node of `graph` for a copy of the template's
/// FePBR group.
pub fn rewrite_material(
    graph: &mut ShadingGraph,
    template: Option<&ShadingGraph>,
) -> Result<RewriteOutcome, RewriteError> {
    let standard = graph
        .find_node(|n| n.is_standard_shading())
        .ok_or(RewriteError::NoStandardNode)?;
    let template_group = template
        .and_then(find_template_group)
        .ok_or(RewriteError::MissingTemplate)?;
    let shader_output = template_group
        .shader_output()
        .map(|s| s.name.clone())
        .ok_or_else(|| RewriteError::MissingShaderOutput(template_group.name.clone()))?;

    let material_output = graph.find_node(|n| n.is_material_output());
    let side_output = graph.find_node(|n| n.is_group_containing(GLTF_OUTPUT_GROUP_MARKER));
    let location = graph
        .node(standard)
        .map(|n| n.location)
        .unwrap_or_default();

    let mut group_node = template_group.clone();
    group_node.location = location;
    let group = graph.add_node(group_node);

    let mut rewired = Vec::new();
    for &(from_name, to_name) in INPUT_MAP {
        let (Some(standard_node), Some(group_node)) = (graph.node(standard), graph.node(group))
        else {
            break;
        };
        if !standard_node.has_input(from_name) || !group_node.has_input(to_name) {
            debug!("Skipping '{from_name}' -> '{to_name}': socket missing");
            continue;
        }
        if rewired.iter().any(|r| r == to_name) {
            continue;
        }

        let source = if from_name == NORMAL_INPUT {
            trace_socket(graph, standard, from_name)
        } else {
            graph.incoming(standard, from_name).map(|l| l.from.clone())
        };
        if let Some(source) = source {
            graph.connect_endpoint(&source, group, to_name)?;
            rewired.push(to_name.to_string());
        }
    }

    let mut occlusion = false;
    if let Some(side) = side_output
        && let Some(source) = graph.incoming(side, OCCLUSION_INPUT).map(|l| l.from.clone())
        && graph.node(group).is_some_and(|n| n.has_input(AO_INPUT))
    {
        graph.connect_endpoint(&source, group, AO_INPUT)?;
        occlusion = true;
    }

    let mut connected_output = false;
    if let Some(output) = material_output
        && graph.node(output).is_some_and(|n| n.has_input(SURFACE_INPUT))
    {
        graph.connect(group, &shader_output, output, SURFACE_INPUT)?;
        connected_output = true;
    }

    graph.remove_node(standard);

    Ok(RewriteOutcome {
        group,
        rewired,
        occlusion,
        connected_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ImageRef, SocketType};

    fn template() -> ShadingGraph {
        let mut graph = ShadingGraph::new();
        graph.add_node(
            Node::group("FePBR", "FePBR_v2")
                .with_input("Albedo Map", SocketType::Color)
                .with_input("Alpha Map", SocketType::Float)
                .with_input("Metallic", SocketType::Float)
                .with_input("Roughness", SocketType::Float)
                .with_input("Normal Map", SocketType::Color)
                .with_input("Emission", SocketType::Color)
                .with_input("AO", SocketType::Color)
                .with_output("BSDF", SocketType::Shader),
        );
        graph
    }

    struct Imported {
        graph: ShadingGraph,
        albedo: NodeId,
        normal: NodeId,
        ao: NodeId,
        output: NodeId,
    }

    fn imported_material() -> Imported {
        let mut graph = ShadingGraph::new();
        let albedo = graph.add_node(Node::image_source(
            "Albedo",
            Some(ImageRef::new("albedo.png", Some("//albedo.png".into()))),
        ));
        let normal = graph.add_node(Node::image_source(
            "Normal",
            Some(ImageRef::new("normal.png", Some("//normal.png".into()))),
        ));
        let ao = graph.add_node(Node::image_source(
            "Occlusion",
            Some(ImageRef::new("ao.png", Some("//ao.png".into()))),
        ));
        let decoder = graph.add_node(Node::normal_decoder("Normal Map"));
        let shader = graph.add_node(Node::standard_shading("Principled BSDF").at(glam::Vec2::new(10.0, 20.0)));
        let output = graph.add_node(Node::material_output("Material Output"));
        let side = graph.add_node(
            Node::group("glTF Material Output", "glTF Material Output")
                .with_input("Occlusion", SocketType::Color),
        );

        graph.connect(albedo, "Color", shader, "Base Color").unwrap();
        graph.connect(albedo, "Alpha", shader, "Alpha").unwrap();
        graph.connect(normal, "Color", decoder, "Color").unwrap();
        graph.connect(decoder, "Normal", shader, "Normal").unwrap();
        graph.connect(shader, "BSDF", output, "Surface").unwrap();
        graph.connect(ao, "Color", side, "Occlusion").unwrap();

        Imported {
            graph,
            albedo,
            normal,
            ao,
            output,
        }
    }

    #[test]
    fn rewrites_standard_node_into_group() {
        let Imported {
            mut graph,
            albedo,
            normal,
            ao,
            output,
        } = imported_material();
        let template = template();

        let outcome = rewrite_material(&mut graph, Some(&template)).unwrap();

        assert_eq!(outcome.rewired, ["Albedo Map", "Normal Map", "Alpha Map"]);
        assert!(outcome.occlusion);
        assert!(outcome.connected_output);
        assert!(graph.find_node(|n| n.is_standard_shading()).is_none());

        let group = outcome.group;
        assert_eq!(graph.node(group).unwrap().location, glam::Vec2::new(10.0, 20.0));
        assert_eq!(graph.incoming(group, "Albedo Map").unwrap().from.node, albedo);
        assert_eq!(graph.incoming(group, "Alpha Map").unwrap().from.socket, "Alpha");
        // The decoder is bypassed: the group decodes normals itself.
        assert_eq!(graph.incoming(group, "Normal Map").unwrap().from.node, normal);
        assert_eq!(graph.incoming(group, "AO").unwrap().from.node, ao);
        assert_eq!(graph.incoming(output, "Surface").unwrap().from.node, group);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn missing_template_leaves_graph_untouched() {
        let Imported { mut graph, .. } = imported_material();
        let before = graph.clone();

        assert_eq!(
            rewrite_material(&mut graph, None),
            Err(RewriteError::MissingTemplate)
        );
        assert_eq!(
            rewrite_material(&mut graph, Some(&ShadingGraph::new())),
            Err(RewriteError::MissingTemplate)
        );
        assert_eq!(graph, before);
    }

    #[test]
    fn no_standard_node_is_an_error() {
        let mut graph = ShadingGraph::new();
        graph.add_node(Node::material_output("Material Output"));
        let before = graph.clone();

        assert_eq!(
            rewrite_material(&mut graph, Some(&template())),
            Err(RewriteError::NoStandardNode)
        );
        assert_eq!(graph, before);
    }

    #[test]
    fn group_without_shader_output_is_rejected_before_mutation() {
        let Imported { mut graph, .. } = imported_material();
        let before = graph.clone();
        let mut bad = ShadingGraph::new();
        bad.add_node(Node::group("FePBR", "FePBR").with_input("Albedo Map", SocketType::Color));

        assert_eq!(
            rewrite_material(&mut graph, Some(&bad)),
            Err(RewriteError::MissingShaderOutput("FePBR".to_string()))
        );
        assert_eq!(graph, before);
    }

    #[test]
    fn unlinked_inputs_and_missing_sockets_are_skipped() {
        let mut graph = ShadingGraph::new();
        let shader = graph.add_node(Node::standard_shading("Principled BSDF"));
        let tex = graph.add_node(Node::image_source("Metal", None));
        graph.connect(tex, "Color", shader, "Metallic").unwrap();

        let mut slim = ShadingGraph::new();
        slim.add_node(
            Node::group("FePBR", "FePBR")
                .with_input("Albedo Map", SocketType::Color)
                .with_output("Shader", SocketType::Shader),
        );

        let outcome = rewrite_material(&mut graph, Some(&slim)).unwrap();
        assert!(outcome.rewired.is_empty());
        assert!(!outcome.occlusion);
        assert!(!outcome.connected_output);
        assert!(graph.links().is_empty());
        assert_eq!(graph.nodes().len(), 2);
    }
}
