//! Shading graphs
//!
//! A graph is a flat list of [`Node`]s joined by directed [`Link`]s running
//! from an output socket to an input socket. Nodes and links have no identity
//! outside the graph that owns them.
//!
//! Invariants kept by every mutating method:
//! - an input socket has at most one incoming link (connecting into an
//!   occupied input replaces the old link)
//! - link endpoints name sockets that exist on their nodes

mod node;

#[cfg(test)]
mod tests;

pub use node::{ImageRef, Node, NodeKind, STANDARD_INPUTS, Socket, SocketType};

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// Node identifier, unique within one graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One end of a link: a node and one of its socket names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub socket: String,
}

impl Endpoint {
    pub fn new(node: NodeId, socket: impl Into<String>) -> Self {
        Self {
            node,
            socket: socket.into(),
        }
    }
}

/// Directed link from an output socket to an input socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub from: Endpoint,
    pub to: Endpoint,
}

/// Graph construction and validation errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Node {node} has no output socket '{socket}'")]
    MissingOutput { node: NodeId, socket: String },

    #[error("Node {node} has no input socket '{socket}'")]
    MissingInput { node: NodeId, socket: String },

    #[error("Input '{socket}' of node {node} has more than one incoming link")]
    DuplicateInput { node: NodeId, socket: String },

    #[error("Node id {0} is used more than once")]
    DuplicateNodeId(NodeId),
}

/// A material's node graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadingGraph {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    links: Vec<Link>,
}

impl ShadingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from deserialized parts, checking every invariant.
    pub fn from_parts(nodes: Vec<Node>, links: Vec<Link>) -> Result<Self, GraphError> {
        let graph = Self { nodes, links };
        graph.validate()?;
        Ok(graph)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Insert a node, assigning it a fresh id.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.next_id();
        node.id = id;
        self.nodes.push(node);
        id
    }

    /// One past the highest id, or the lowest free id once loaded ids reach
    /// `u32::MAX`.
    fn next_id(&self) -> NodeId {
        let Some(highest) = self.nodes.iter().map(|n| n.id.0).max() else {
            return NodeId(0);
        };
        if let Some(next) = highest.checked_add(1) {
            return NodeId(next);
        }
        let taken: HashSet<u32> = self.nodes.iter().map(|n| n.id.0).collect();
        NodeId((0..u32::MAX).find(|id| !taken.contains(id)).unwrap_or_default())
    }

    /// Remove a node together with every link touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        self.links.retain(|l| l.from.node != id && l.to.node != id);
        Some(self.nodes.remove(index))
    }

    /// Link `from.output` to `to.input`, replacing any link already
    /// feeding that input.
    pub fn connect(
        &mut self,
        from: NodeId,
        output: &str,
        to: NodeId,
        input: &str,
    ) -> Result<(), GraphError> {
        let source = self.node(from).ok_or(GraphError::UnknownNode(from))?;
        if !source.has_output(output) {
            return Err(GraphError::MissingOutput {
                node: from,
                socket: output.to_string(),
            });
        }
        let target = self.node(to).ok_or(GraphError::UnknownNode(to))?;
        if !target.has_input(input) {
            return Err(GraphError::MissingInput {
                node: to,
                socket: input.to_string(),
            });
        }

        self.disconnect_input(to, input);
        self.links.push(Link {
            from: Endpoint::new(from, output),
            to: Endpoint::new(to, input),
        });
        Ok(())
    }

    /// Link an endpoint (as returned by the tracer) to an input.
    pub fn connect_endpoint(
        &mut self,
        from: &Endpoint,
        to: NodeId,
        input: &str,
    ) -> Result<(), GraphError> {
        self.connect(from.node, &from.socket, to, input)
    }

    /// Drop the link feeding `node.input`, if any.
    pub fn disconnect_input(&mut self, node: NodeId, input: &str) -> Option<Link> {
        let index = self
            .links
            .iter()
            .position(|l| l.to.node == node && l.to.socket == input)?;
        Some(self.links.remove(index))
    }

    /// The link feeding `node.input`, if any
    pub fn incoming(&self, node: NodeId, input: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.to.node == node && l.to.socket == input)
    }

    pub fn is_linked(&self, node: NodeId, input: &str) -> bool {
        self.incoming(node, input).is_some()
    }

    /// Links leaving any output of `node`
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.from.node == node)
    }

    /// First node (in insertion order) matching `pred`
    pub fn find_node(&self, pred: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.nodes.iter().find(|n| pred(n)).map(|n| n.id)
    }

    /// Every image-source node that references an image
    pub fn image_nodes(&self) -> impl Iterator<Item = (NodeId, &ImageRef)> {
        self.nodes
            .iter()
            .filter_map(|n| n.image().map(|image| (n.id, image)))
    }

    /// Check node-id uniqueness and every link invariant.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id) {
                return Err(GraphError::DuplicateNodeId(node.id));
            }
        }

        let mut fed_inputs: HashSet<(NodeId, &str)> = HashSet::new();
        for link in &self.links {
            let source = self
                .node(link.from.node)
                .ok_or(GraphError::UnknownNode(link.from.node))?;
            if !source.has_output(&link.from.socket) {
                return Err(GraphError::MissingOutput {
                    node: link.from.node,
                    socket: link.from.socket.clone(),
                });
            }

            let target = self
                .node(link.to.node)
                .ok_or(GraphError::UnknownNode(link.to.node))?;
            if !target.has_input(&link.to.socket) {
                return Err(GraphError::MissingInput {
                    node: link.to.node,
                    socket: link.to.socket.clone(),
                });
            }

            if !fed_inputs.insert((link.to.node, link.to.socket.as_str())) {
                return Err(GraphError::DuplicateInput {
                    node: link.to.node,
                    socket: link.to.socket.clone(),
                });
            }
        }

        Ok(())
    }
}
