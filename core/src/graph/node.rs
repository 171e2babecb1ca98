//! Node and socket definitions

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::NodeId;

/// Socket value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    Color,
    Float,
    Vector,
    Shader,
}

/// A named input or output socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socket {
    pub name: String,
    #[serde(rename = "type")]
    pub socket_type: SocketType,
}

impl Socket {
    pub fn new(name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            name: name.into(),
            socket_type,
        }
    }
}

/// Reference to an image datablock used by an image-source node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    /// Absolute, or relative to the scene file (a leading `//` is accepted).
    #[serde(default)]
    pub filepath: Option<PathBuf>,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, filepath: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            filepath,
        }
    }
}

/// What a node does. Only the kinds the porter reasons about are spelled
/// out; everything else is carried as `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Samples an image (`TEX_IMAGE`)
    ImageSource {
        #[serde(default)]
        image: Option<ImageRef>,
    },
    /// Tangent-space normal map decoder (`NORMAL_MAP`)
    NormalDecoder,
    /// Node group instance; `tree` is the group tree's name
    ParameterGroup { tree: String },
    /// Material output (`OUTPUT_MATERIAL`)
    MaterialOutput,
    /// The standard physically based shading node (`BSDF_PRINCIPLED`)
    StandardShading,
    Other { type_name: String },
}

/// A node in a shading graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub location: Vec2,
    #[serde(default)]
    pub inputs: Vec<Socket>,
    #[serde(default)]
    pub outputs: Vec<Socket>,
}

/// Inputs of the standard shading node that the porter cares about.
pub const STANDARD_INPUTS: &[(&str, SocketType)] = &[
    ("Base Color", SocketType::Color),
    ("Metallic", SocketType::Float),
    ("Roughness", SocketType::Float),
    ("IOR", SocketType::Float),
    ("Alpha", SocketType::Float),
    ("Normal", SocketType::Vector),
    ("Emission Color", SocketType::Color),
    ("Emission Strength", SocketType::Float),
];

impl Node {
    /// Create a node without sockets. The id is assigned by the graph.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId(0),
            name: name.into(),
            kind,
            location: Vec2::ZERO,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, socket_type: SocketType) -> Self {
        self.inputs.push(Socket::new(name, socket_type));
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, socket_type: SocketType) -> Self {
        self.outputs.push(Socket::new(name, socket_type));
        self
    }

    pub fn at(mut self, location: Vec2) -> Self {
        self.location = location;
        self
    }

    /// Image texture node with `Vector` in, `Color`/`Alpha` out
    pub fn image_source(name: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self::new(name, NodeKind::ImageSource { image })
            .with_input("Vector", SocketType::Vector)
            .with_output("Color", SocketType::Color)
            .with_output("Alpha", SocketType::Float)
    }

    /// Normal map node with `Strength`/`Color` in, `Normal` out
    pub fn normal_decoder(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::NormalDecoder)
            .with_input("Strength", SocketType::Float)
            .with_input("Color", SocketType::Color)
            .with_output("Normal", SocketType::Vector)
    }

    /// Standard shading node with the inputs listed in [`STANDARD_INPUTS`]
    pub fn standard_shading(name: impl Into<String>) -> Self {
        let node = Self::new(name, NodeKind::StandardShading);
        STANDARD_INPUTS
            .iter()
            .fold(node, |node, (input, ty)| node.with_input(*input, *ty))
            .with_output("BSDF", SocketType::Shader)
    }

    pub fn material_output(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::MaterialOutput)
            .with_input("Surface", SocketType::Shader)
            .with_input("Volume", SocketType::Shader)
            .with_input("Displacement", SocketType::Vector)
    }

    pub fn group(name: impl Into<String>, tree: impl Into<String>) -> Self {
        Self::new(name, NodeKind::ParameterGroup { tree: tree.into() })
    }

    pub fn input(&self, name: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.name == name)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.input(name).is_some()
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.output(name).is_some()
    }

    /// First output carrying a shader
    pub fn shader_output(&self) -> Option<&Socket> {
        self.outputs
            .iter()
            .find(|s| s.socket_type == SocketType::Shader)
    }

    /// Group tree name, for parameter-group nodes
    pub fn group_tree(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::ParameterGroup { tree } => Some(tree),
            _ => None,
        }
    }

    /// True for a group node whose tree name contains `marker`
    pub fn is_group_containing(&self, marker: &str) -> bool {
        self.group_tree().is_some_and(|tree| tree.contains(marker))
    }

    /// The image of an image-source node, if it has one
    pub fn image(&self) -> Option<&ImageRef> {
        match &self.kind {
            NodeKind::ImageSource { image } => image.as_ref(),
            _ => None,
        }
    }

    pub fn is_image_source(&self) -> bool {
        matches!(self.kind, NodeKind::ImageSource { .. })
    }

    pub fn is_normal_decoder(&self) -> bool {
        matches!(self.kind, NodeKind::NormalDecoder)
    }

    pub fn is_standard_shading(&self) -> bool {
        matches!(self.kind, NodeKind::StandardShading)
    }

    pub fn is_material_output(&self) -> bool {
        matches!(self.kind, NodeKind::MaterialOutput)
    }
}
