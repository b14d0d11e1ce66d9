//! Standard operator library registered by [`super::OperatorRegistry::builtin`].

use super::OperatorDef;
use crate::types::{IoType, Literal};

use crate::types::IoType::{Scalar, Vec2, Vec3, Vec4};

// `map_point` is declared by the shader assembler ahead of the preamble.
const SAMPLE_POINT: &str = r#"vec3 sample_point() {
    return map_point;
}"#;

const SDF_SPHERE: &str = r#"float sdf_sphere(vec3 p, float r) {
    return length(p) - r;
}"#;

const SDF_BOX: &str = r#"float sdf_box(vec3 p, vec3 b) {
    vec3 q = abs(p) - b;
    return length(max(q, vec3(0.0))) + min(max(q.x, max(q.y, q.z)), 0.0);
}"#;

const SDF_TORUS: &str = r#"float sdf_torus(vec3 p, vec2 t) {
    vec2 q = vec2(length(p.xz) - t.x, p.y);
    return length(q) - t.y;
}"#;

// n.xyz is the plane normal, n.w the offset along it.
const SDF_PLANE: &str = r#"float sdf_plane(vec3 p, vec4 n) {
    return dot(p, normalize(n.xyz)) + n.w;
}"#;

const OP_TRANSLATE: &str = r#"vec3 op_translate(vec3 p, vec3 offset) {
    return p - offset;
}"#;

const OP_ROUND: &str = r#"float op_round(float d, float r) {
    return d - r;
}"#;

const OP_UNION: &str = r#"float op_union(float a, float b) {
    return min(a, b);
}"#;

const OP_SUBTRACT: &str = r#"float op_subtract(float a, float b) {
    return max(a, -b);
}"#;

const OP_INTERSECT: &str = r#"float op_intersect(float a, float b) {
    return max(a, b);
}"#;

const OP_SMOOTH_UNION: &str = r#"float op_smooth_union(float a, float b, float k) {
    float h = clamp(0.5 + 0.5 * (b - a) / k, 0.0, 1.0);
    return mix(b, a, h) - k * h * (1.0 - h);
}"#;

fn def(
    inputs: &[IoType],
    output: IoType,
    code: &str,
    defaults: &[Option<Literal>],
) -> OperatorDef {
    OperatorDef {
        inputs: inputs.to_vec(),
        output,
        code: code.to_string(),
        defaults: defaults.to_vec(),
    }
}

pub(super) fn operator_defs() -> Vec<OperatorDef> {
    vec![
        def(&[], Vec3, SAMPLE_POINT, &[]),
        def(&[Vec3, Scalar], Scalar, SDF_SPHERE, &[None, Some(Literal::scalar(1.0))]),
        def(
            &[Vec3, Vec3],
            Scalar,
            SDF_BOX,
            &[None, Some(Literal::vec3(0.5, 0.5, 0.5))],
        ),
        def(
            &[Vec3, Vec2],
            Scalar,
            SDF_TORUS,
            &[None, Some(Literal::vec2(1.0, 0.25))],
        ),
        def(
            &[Vec3, Vec4],
            Scalar,
            SDF_PLANE,
            &[None, Some(Literal::vec4(0.0, 1.0, 0.0, 0.0))],
        ),
        def(
            &[Vec3, Vec3],
            Vec3,
            OP_TRANSLATE,
            &[None, Some(Literal::vec3(0.0, 0.0, 0.0))],
        ),
        def(&[Scalar, Scalar], Scalar, OP_ROUND, &[None, Some(Literal::scalar(0.1))]),
        def(&[Scalar, Scalar], Scalar, OP_UNION, &[None, None]),
        def(&[Scalar, Scalar], Scalar, OP_SUBTRACT, &[None, None]),
        def(&[Scalar, Scalar], Scalar, OP_INTERSECT, &[None, None]),
        def(
            &[Scalar, Scalar, Scalar],
            Scalar,
            OP_SMOOTH_UNION,
            &[None, None, Some(Literal::scalar(0.25))],
        ),
    ]
}
