use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use volumetric_sdf::{
    graph::{GraphError, NodeId, SceneGraph, SlotValue},
    registry::OperatorRegistry,
    renderer::{self, CompileError},
    types::Literal,
};

const SYMBOLS: [&str; 11] = [
    "sample_point",
    "sdf_sphere",
    "sdf_box",
    "sdf_torus",
    "sdf_plane",
    "op_translate",
    "op_round",
    "op_union",
    "op_subtract",
    "op_intersect",
    "op_smooth_union",
];

const NAMES: [&str; 4] = ["a", "b", "c", "shape2"];

#[derive(Debug, Clone)]
enum Op {
    Attach { name: usize, symbol: usize, parent: usize, slot: usize },
    Move { node: usize, parent: usize, slot: usize },
    Delete { node: usize },
    SetLiteral { node: usize, slot: usize, width: usize, value: f32 },
    ClearSlot { node: usize, slot: usize },
    Rename { node: usize, name: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..NAMES.len(), 0..SYMBOLS.len(), 0..16usize, 0..4usize).prop_map(
            |(name, symbol, parent, slot)| Op::Attach { name, symbol, parent, slot }
        ),
        2 => (0..16usize, 0..16usize, 0..4usize)
            .prop_map(|(node, parent, slot)| Op::Move { node, parent, slot }),
        1 => (0..16usize).prop_map(|node| Op::Delete { node }),
        2 => (0..16usize, 0..4usize, 1..=4usize, -8.0f32..8.0).prop_map(
            |(node, slot, width, value)| Op::SetLiteral { node, slot, width, value }
        ),
        1 => (0..16usize, 0..4usize).prop_map(|(node, slot)| Op::ClearSlot { node, slot }),
        1 => (0..16usize, 0..NAMES.len()).prop_map(|(node, name)| Op::Rename { node, name }),
    ]
}

/// Pick a live node by position, wrapping around; index 16 and up stay out of
/// range on purpose so stale ids get exercised too.
fn pick(graph: &SceneGraph, index: usize, history: &[NodeId]) -> NodeId {
    let live: Vec<NodeId> = graph.node_ids().collect();
    if index < live.len() {
        live[index]
    } else {
        history
            .get(index % history.len().max(1))
            .copied()
            .unwrap_or_else(|| graph.root())
    }
}

fn literal_of_width(width: usize, value: f32) -> Literal {
    Literal::from_slice(&[value; 4][..width]).unwrap()
}

fn apply(
    graph: &mut SceneGraph,
    registry: &OperatorRegistry,
    history: &mut Vec<NodeId>,
    op: &Op,
) -> Result<(), GraphError> {
    match *op {
        Op::Attach { name, symbol, parent, slot } => {
            let parent = pick(graph, parent, history);
            let operator = registry.get(SYMBOLS[symbol]).unwrap().clone();
            let id = graph.attach(NAMES[name], &operator, parent, slot)?;
            history.push(id);
            Ok(())
        }
        Op::Move { node, parent, slot } => {
            let node = pick(graph, node, history);
            let parent = pick(graph, parent, history);
            graph.move_node(node, parent, slot)
        }
        Op::Delete { node } => {
            let node = pick(graph, node, history);
            graph.delete(node)
        }
        Op::SetLiteral { node, slot, width, value } => {
            let node = pick(graph, node, history);
            graph.set_literal(node, slot, literal_of_width(width, value))
        }
        Op::ClearSlot { node, slot } => {
            let node = pick(graph, node, history);
            graph.clear_slot(node, slot)
        }
        Op::Rename { node, name } => {
            let node = pick(graph, node, history);
            graph.rename(node, NAMES[name])
        }
    }
}

fn assert_well_formed(graph: &SceneGraph) {
    let root = graph.root();
    let live: BTreeSet<NodeId> = graph.node_ids().collect();
    assert_eq!(live.len(), graph.len());

    let mut reachable: BTreeSet<NodeId> = graph.descendants(root).unwrap().into_iter().collect();
    reachable.insert(root);
    assert_eq!(reachable, live, "every live node hangs off the root");

    let mut internal_names = HashSet::new();
    for id in &live {
        let node = graph.node(*id).unwrap();
        assert!(internal_names.insert(graph.internal_name(*id).unwrap()));

        let mut sibling_names = HashSet::new();
        for (slot, value) in node.inputs().iter().enumerate() {
            let expected = node.operator().inputs()[slot];
            match value {
                SlotValue::Empty => {}
                SlotValue::Literal(literal) => assert_eq!(literal.ty, expected),
                SlotValue::Node(child) => {
                    let child = graph.node(*child).unwrap();
                    assert_eq!(child.parent(), Some(*id));
                    assert_eq!(child.sibling_slot(), slot);
                    assert_eq!(child.operator().output(), expected);
                    assert!(sibling_names.insert(child.name().to_string()));
                }
            }
        }
    }

    match renderer::compile_body(graph) {
        Ok(_) | Err(CompileError::MissingInput { .. }) => {}
        Err(e) => panic!("unexpected compile failure: {e}"),
    }
}

proptest! {
    #[test]
    fn random_edits_keep_the_tree_consistent(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let registry = OperatorRegistry::builtin().unwrap();
        let mut graph = SceneGraph::new();
        let mut history = Vec::new();

        for op in &ops {
            let before = graph.clone();
            if apply(&mut graph, &registry, &mut history, op).is_err() {
                prop_assert_eq!(&graph, &before, "failed {:?} changed the graph", op);
            }
            assert_well_formed(&graph);
        }
    }

    #[test]
    fn destroyed_ids_are_never_reused(deletes in prop::collection::vec(0..6usize, 1..6)) {
        let registry = OperatorRegistry::builtin().unwrap();
        let union = registry.get("op_union").unwrap().clone();
        let sphere = registry.get("sdf_sphere").unwrap().clone();

        let mut graph = SceneGraph::new();
        let top = graph.attach("top", &union, graph.root(), 0).unwrap();
        let mut ids = vec![top];
        ids.push(graph.attach("left", &sphere, top, 0).unwrap());
        ids.push(graph.attach("right", &sphere, top, 1).unwrap());

        let mut dead = Vec::new();
        for index in deletes {
            let target = ids[index % ids.len()];
            if graph.delete(target).is_ok() {
                dead.push(target);
            }
        }
        let fresh = graph.attach("fresh", &union, graph.root(), 0).unwrap();
        for id in dead.iter().chain(ids.iter()) {
            prop_assert_ne!(*id, fresh);
        }
        for id in dead {
            prop_assert_eq!(graph.node(id).unwrap_err(), GraphError::NotFound(id));
        }
    }
}

#[test]
fn move_into_the_slot_of_an_ancestor_keeps_the_mover() {
    let registry = OperatorRegistry::builtin().unwrap();
    let union = registry.get("op_union").unwrap().clone();
    let sphere = registry.get("sdf_sphere").unwrap().clone();

    let mut graph = SceneGraph::new();
    let outer = graph.attach("outer", &union, graph.root(), 0).unwrap();
    let inner = graph.attach("inner", &union, outer, 0).unwrap();
    let ball = graph.attach("ball", &sphere, inner, 1).unwrap();

    graph.move_node(ball, graph.root(), 0).unwrap();

    assert_eq!(graph.children(graph.root()).unwrap(), vec![ball]);
    assert_eq!(graph.node(outer).unwrap_err(), GraphError::NotFound(outer));
    assert_eq!(graph.node(inner).unwrap_err(), GraphError::NotFound(inner));
    assert_eq!(graph.len(), 2);
    assert_eq!(graph.internal_name(ball).unwrap(), "node_ball");
}

#[test]
fn moving_under_own_descendant_is_a_cycle() {
    let registry = OperatorRegistry::builtin().unwrap();
    let union = registry.get("op_union").unwrap().clone();

    let mut graph = SceneGraph::new();
    let a = graph.attach("a", &union, graph.root(), 0).unwrap();
    let b = graph.attach("b", &union, a, 0).unwrap();
    let before = graph.clone();

    assert_eq!(
        graph.move_node(a, b, 1),
        Err(GraphError::CycleDetected { node: a, target: b })
    );
    assert_eq!(
        graph.move_node(a, a, 1),
        Err(GraphError::CycleDetected { node: a, target: a })
    );
    assert_eq!(graph, before);
}

#[test]
fn rename_changes_generated_locals() {
    let registry = OperatorRegistry::builtin().unwrap();
    let sphere = registry.get("sdf_sphere").unwrap().clone();

    let mut graph = SceneGraph::new();
    let ball = graph.attach("ball", &sphere, graph.root(), 0).unwrap();
    graph.set_literal(ball, 0, Literal::vec3(0.0, 0.0, 0.0)).unwrap();
    graph.rename(ball, "orb").unwrap();

    let compiled = renderer::compile_body(&graph).unwrap();
    assert!(compiled.body.contains("float node_orb = sdf_sphere(vec3(0, 0, 0), 1.0);"));
    assert!(compiled.body.ends_with("return node_orb;\n"));
}
