//! Initial scene handed to the compiler at start-up.

use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::graph::{NodeId, SceneGraph};
use crate::registry::{OperatorRegistry, OperatorType};
use crate::types::Literal;

fn operator<'a>(registry: &'a OperatorRegistry, symbol: &str) -> Result<&'a Arc<OperatorType>> {
    registry
        .get(symbol)
        .ok_or_else(|| anyhow!("operator `{symbol}` is not registered"))
}

/// Attach a `sample_point` leaf into `parent`'s `slot`.
pub fn attach_sample_point(
    graph: &mut SceneGraph,
    registry: &OperatorRegistry,
    parent: NodeId,
    slot: usize,
) -> Result<NodeId> {
    Ok(graph.attach("p", operator(registry, "sample_point")?, parent, slot)?)
}

/// A sphere hovering in front of the camera, smoothly blended into a ground plane.
///
/// Requires the built-in operators.
pub fn default_scene(registry: &OperatorRegistry) -> Result<SceneGraph> {
    let mut graph = SceneGraph::new();
    let root = graph.root();

    let blend = graph.attach("scene", operator(registry, "op_smooth_union")?, root, 0)?;

    let ball = graph.attach("ball", operator(registry, "sdf_sphere")?, blend, 0)?;
    let offset = graph.attach("offset", operator(registry, "op_translate")?, ball, 0)?;
    attach_sample_point(&mut graph, registry, offset, 0)?;
    graph.set_literal(offset, 1, Literal::vec3(0.0, 0.0, 5.0))?;

    let ground = graph.attach("ground", operator(registry, "sdf_plane")?, blend, 1)?;
    attach_sample_point(&mut graph, registry, ground, 0)?;
    graph.set_literal(ground, 1, Literal::vec4(0.0, 1.0, 0.0, 1.0))?;

    graph.set_literal(blend, 2, Literal::scalar(0.5))?;

    Ok(graph)
}
