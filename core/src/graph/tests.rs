use super::*;

fn image_and_shader() -> (ShadingGraph, NodeId, NodeId) {
    let mut graph = ShadingGraph::new();
    let image = graph.add_node(Node::image_source("Albedo", None));
    let shader = graph.add_node(Node::standard_shading("Principled BSDF"));
    (graph, image, shader)
}

#[test]
fn add_node_assigns_fresh_ids() {
    let (mut graph, image, shader) = image_and_shader();
    assert_ne!(image, shader);

    let third = graph.add_node(Node::normal_decoder("Normal Map"));
    assert!(third > shader);
    assert_eq!(graph.node(third).unwrap().name, "Normal Map");
}

#[test]
fn add_node_after_max_id_reuses_a_gap() {
    let mut top = Node::image_source("Top", None);
    top.id = NodeId(u32::MAX);
    let bottom = Node::image_source("Bottom", None);
    let mut graph = ShadingGraph::from_parts(vec![bottom, top], Vec::new()).unwrap();

    let added = graph.add_node(Node::normal_decoder("Normal Map"));
    assert_eq!(added, NodeId(1));
    let again = graph.add_node(Node::normal_decoder("Normal Map.001"));
    assert_eq!(again, NodeId(2));
    assert!(graph.validate().is_ok());
}

#[test]
fn connect_replaces_existing_incoming_link() {
    let (mut graph, image, shader) = image_and_shader();
    let other = graph.add_node(Node::image_source("Other", None));

    graph.connect(image, "Color", shader, "Base Color").unwrap();
    graph.connect(other, "Color", shader, "Base Color").unwrap();

    let feeding: Vec<_> = graph
        .links()
        .iter()
        .filter(|l| l.to.node == shader && l.to.socket == "Base Color")
        .collect();
    assert_eq!(feeding.len(), 1);
    assert_eq!(feeding[0].from.node, other);
    assert!(graph.validate().is_ok());
}

#[test]
fn connect_rejects_missing_sockets() {
    let (mut graph, image, shader) = image_and_shader();

    assert_eq!(
        graph.connect(image, "Nope", shader, "Base Color"),
        Err(GraphError::MissingOutput {
            node: image,
            socket: "Nope".to_string()
        })
    );
    assert_eq!(
        graph.connect(image, "Color", shader, "Albedo Map"),
        Err(GraphError::MissingInput {
            node: shader,
            socket: "Albedo Map".to_string()
        })
    );
    assert_eq!(
        graph.connect(NodeId(99), "Color", shader, "Base Color"),
        Err(GraphError::UnknownNode(NodeId(99)))
    );
    assert!(graph.links().is_empty());
}

#[test]
fn remove_node_drops_its_links() {
    let (mut graph, image, shader) = image_and_shader();
    let output = graph.add_node(Node::material_output("Material Output"));
    graph.connect(image, "Color", shader, "Base Color").unwrap();
    graph.connect(shader, "BSDF", output, "Surface").unwrap();

    let removed = graph.remove_node(shader).unwrap();
    assert!(removed.is_standard_shading());
    assert!(graph.links().is_empty());
    assert!(graph.node(shader).is_none());
    assert!(graph.remove_node(shader).is_none());
}

#[test]
fn validate_catches_duplicate_inputs_from_deserialized_graphs() {
    let json = r#"{
        "nodes": [
            {"id": 0, "name": "A", "kind": {"type": "image_source"},
             "outputs": [{"name": "Color", "type": "color"}]},
            {"id": 1, "name": "B", "kind": {"type": "standard_shading"},
             "inputs": [{"name": "Base Color", "type": "color"}]}
        ],
        "links": [
            {"from": {"node": 0, "socket": "Color"}, "to": {"node": 1, "socket": "Base Color"}},
            {"from": {"node": 0, "socket": "Color"}, "to": {"node": 1, "socket": "Base Color"}}
        ]
    }"#;
    let graph: ShadingGraph = serde_json::from_str(json).unwrap();
    assert_eq!(
        graph.validate(),
        Err(GraphError::DuplicateInput {
            node: NodeId(1),
            socket: "Base Color".to_string()
        })
    );
}

#[test]
fn from_parts_rejects_duplicate_ids() {
    let mut a = Node::image_source("A", None);
    a.id = NodeId(3);
    let mut b = Node::image_source("B", None);
    b.id = NodeId(3);
    assert_eq!(
        ShadingGraph::from_parts(vec![a, b], Vec::new()),
        Err(GraphError::DuplicateNodeId(NodeId(3)))
    );
}

#[test]
fn image_nodes_skip_empty_image_sources() {
    let mut graph = ShadingGraph::new();
    graph.add_node(Node::image_source("Empty", None));
    let with_image = graph.add_node(Node::image_source(
        "Albedo",
        Some(ImageRef::new("rock_albedo.png", Some("//tex/rock_albedo.png".into()))),
    ));

    let found: Vec<_> = graph.image_nodes().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, with_image);
    assert_eq!(found[0].1.name, "rock_albedo.png");
}
