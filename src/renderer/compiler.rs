//! Scene graph → GLSL map function.
//!
//! The tree is walked in strict post-order with input slots visited in their
//! declared order, so every local is defined before a parent references it and
//! the output is byte-identical for an unchanged tree.

use thiserror::Error;
use tracing::debug;

use crate::graph::{GraphError, NodeId, SceneGraph, SlotValue};

/// Name of the generated function evaluating the scene's signed distance.
pub const SCENE_DISTANCE_FN: &str = "scene_distance";
/// Name of the entry point called by the ray marcher.
pub const DISTANCE_MAP_FN: &str = "distance_map";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A slot holds neither a child nor a literal. The graph API never
    /// produces this on its own for a fully wired tree; it points at a tree
    /// that was compiled before all inputs were filled.
    #[error("node {node} has nothing in input slot {slot}")]
    MissingInput { node: NodeId, slot: usize },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Body of the scene distance function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledMap {
    /// Local assignments followed by the final `return`, four-space indented.
    pub body: String,
    /// Number of local assignments (the `return` is not counted).
    pub statements: usize,
}

/// A node whose inputs are still being visited, with the arguments gathered so far.
struct Frame {
    id: NodeId,
    local: String,
    next_slot: usize,
    args: Vec<String>,
}

impl Frame {
    fn new(id: NodeId, local: String) -> Self {
        Self {
            id,
            local,
            next_slot: 0,
            args: Vec::new(),
        }
    }
}

/// Compile `graph` with an explicit stack; recursion depth does not grow with
/// the tree. Locals are named top-down as the walk descends, matching
/// [`SceneGraph::internal_name`].
pub fn compile_body(graph: &SceneGraph) -> Result<CompiledMap, CompileError> {
    let mut compiled = CompiledMap {
        body: String::new(),
        statements: 0,
    };
    let mut stack = vec![Frame::new(graph.root(), "node".to_string())];

    while let Some(top) = stack.last_mut() {
        let node = graph.node(top.id)?;
        if let Some(value) = node.inputs().get(top.next_slot) {
            let slot = top.next_slot;
            top.next_slot += 1;
            match value {
                SlotValue::Node(child) => {
                    let local = format!("{}_{}", top.local, graph.node(*child)?.name());
                    stack.push(Frame::new(*child, local));
                }
                SlotValue::Literal(lit) => top.args.push(lit.glsl_expr()),
                SlotValue::Empty => {
                    return Err(CompileError::MissingInput { node: top.id, slot });
                }
            }
            continue;
        }

        let Some(done) = stack.pop() else {
            break;
        };
        if node.is_root() {
            compiled
                .body
                .push_str(&format!("    return {};\n", done.args.join(", ")));
            break;
        }

        let op = node.operator();
        compiled.body.push_str(&format!(
            "    {ty} {name} = {symbol}({args});\n",
            ty = op.output(),
            name = done.local,
            symbol = op.symbol(),
            args = done.args.join(", "),
        ));
        compiled.statements += 1;
        if let Some(parent) = stack.last_mut() {
            parent.args.push(done.local);
        }
    }

    debug!(statements = compiled.statements, "compiled scene graph");
    Ok(compiled)
}

/// Wrap a compiled body into the scene distance function and the
/// `distance_map` entry point.
///
/// `distance_map` publishes its argument through the `map_point` global (read
/// by the `sample_point` operator) and packs `SURFACE_COLOR` with the
/// distance; both names are declared by the shader header.
pub fn emit_map_source(compiled: &CompiledMap) -> String {
    format!(
        "float {SCENE_DISTANCE_FN}() {{\n{body}}}\n\n\
vec4 {DISTANCE_MAP_FN}(vec3 p) {{\n    map_point = p;\n    return vec4(SURFACE_COLOR, {SCENE_DISTANCE_FN}());\n}}\n",
        body = compiled.body,
    )
}

/// Compile `graph` into the complete map source.
pub fn compile_map(graph: &SceneGraph) -> Result<String, CompileError> {
    Ok(emit_map_source(&compile_body(graph)?))
}
