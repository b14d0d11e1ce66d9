//! Fragment shader assembly around the compiled map function.
//!
//! Section order is fixed: header (stage IO, uniforms, baked constants, the
//! `map_point` global), registry preamble, compiled map source, engine.

use crate::config::RayMarchConfig;
use crate::graph::SceneGraph;
use crate::registry::OperatorRegistry;
use crate::types::format_glsl_float;

use super::compiler::{CompileError, DISTANCE_MAP_FN, SCENE_DISTANCE_FN, compile_map};

/// Identifiers declared by the assembled fragment shader itself.
pub const RESERVED_SYMBOLS: &[&str] = &[
    "main",
    SCENE_DISTANCE_FN,
    DISTANCE_MAP_FN,
    "estimate_normal",
    "soft_shadow",
    "ambient_occlusion",
    "map_point",
    "uv",
    "frag_color",
    "Frame",
    "aspect",
    "MAX_DIST",
    "MAX_ITER",
    "EPSILON",
    "SURFACE_COLOR",
    "SKY_COLOR",
    "LIGHT_DIR",
];

/// GLSL built-in functions, whitespace separated. Redeclaring one is a compile error.
const GLSL_BUILTINS: &str = "
    radians degrees sin cos tan asin acos atan sinh cosh tanh asinh acosh atanh
    pow exp log exp2 log2 sqrt inversesqrt abs sign floor trunc round roundEven ceil
    fract mod modf min max clamp mix step smoothstep isnan isinf fma
    length distance dot cross normalize faceforward reflect refract
    matrixCompMult outerProduct transpose determinant inverse
    lessThan lessThanEqual greaterThan greaterThanEqual equal notEqual any all not
    texture dFdx dFdy fwidth
";

/// Whether an operator named `symbol` would clash with the assembled shader:
/// engine and header names, GLSL built-ins, the `gl_` namespace, names with
/// `__`, and the `node_` prefix used for generated locals.
pub fn is_reserved_symbol(symbol: &str) -> bool {
    symbol.starts_with("node_")
        || symbol.starts_with("gl_")
        || symbol.contains("__")
        || RESERVED_SYMBOLS.contains(&symbol)
        || GLSL_BUILTINS.split_whitespace().any(|name| name == symbol)
}

/// Fullscreen quad vertex stage. The quad spans clip space and its xy is
/// forwarded as `uv`.
pub const VERTEX_SHADER: &str = r#"#version 450

layout(location = 0) in vec3 position;
layout(location = 0) out vec2 uv;

void main() {
    uv = position.xy;
    gl_Position = vec4(position, 1.0);
}
"#;

const ENGINE: &str = r#"vec3 estimate_normal(vec3 p) {
    float h = 0.0001;
    vec2 k = vec2(1.0, -1.0);
    return normalize(
        k.xyy * distance_map(p + k.xyy * h).w +
        k.yyx * distance_map(p + k.yyx * h).w +
        k.yxy * distance_map(p + k.yxy * h).w +
        k.xxx * distance_map(p + k.xxx * h).w
    );
}

float soft_shadow(vec3 ro, vec3 rd, float mint, float w) {
    float res = 1.0;
    float t = mint;
    for (int i = 0; i < MAX_ITER && t < MAX_DIST; i++) {
        float h = distance_map(ro + t * rd).w;
        res = min(res, h / (w * t));
        t += clamp(h, 0.005, 0.5);
        if (res < -1.0 || t > MAX_DIST) {
            break;
        }
    }
    res = max(res, -1.0);
    return 0.25 * (1.0 + res) * (1.0 + res) * (2.0 - res);
}

float ambient_occlusion(vec3 pos, vec3 nor) {
    float occ = 0.0;
    float sca = 1.0;
    for (int i = 0; i < 5; i++) {
        float h = 0.001 + 0.15 * float(i) / 4.0;
        float d = distance_map(pos + h * nor).w;
        occ += (h - d) * sca;
        sca *= 0.95;
    }
    return clamp(1.0 - 1.5 * occ, 0.0, 1.0);
}

void main() {
    vec3 origin = vec3(0.0);
    vec3 dir = normalize(vec3(uv.x * aspect, uv.y, 1.0));
    float travel = 0.0;
    vec3 color = SURFACE_COLOR;

    for (int i = 0; i < MAX_ITER; i++) {
        vec4 data = distance_map(origin + travel * dir);
        color = data.xyz;
        travel += data.w;
        if (data.w <= EPSILON || travel >= MAX_DIST) {
            break;
        }
    }

    vec3 hit = origin + travel * dir;
    vec3 nor = estimate_normal(hit);

    // key light
    vec3 lig = normalize(LIGHT_DIR);
    vec3 hal = normalize(lig - dir);
    float shad = soft_shadow(hit, lig, 10.0 * EPSILON, 0.1);
    float dif = clamp(dot(nor, lig), 0.0, 1.0) * shad;
    float spe = pow(clamp(dot(nor, hal), 0.0, 1.0), 16.0) * dif
        * (0.04 + 0.96 * pow(clamp(1.0 + dot(hal, dir), 0.0, 1.0), 5.0));

    color = 1.2 * dif * color + 12.0 * spe * color;

    // ambient
    float occ = ambient_occlusion(hit, nor);
    color += occ * vec3(0.0, 0.08, 0.1);

    float fog = min(travel / MAX_DIST, 1.0);
    frag_color = vec4(mix(color, SKY_COLOR, fog), 1.0);
}
"#;

/// Both stages of the ray-marching program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderProgram {
    pub vertex: String,
    pub fragment: String,
}

fn glsl_vec3(v: [f32; 3]) -> String {
    format!(
        "vec3({}, {}, {})",
        format_glsl_float(v[0]),
        format_glsl_float(v[1]),
        format_glsl_float(v[2])
    )
}

/// Stage IO, the `Frame` uniform block and the constants baked from `config`.
pub fn fragment_header(config: &RayMarchConfig) -> String {
    format!(
        r#"#version 450

layout(location = 0) in vec2 uv;
layout(location = 0) out vec4 frag_color;

layout(set = 0, binding = 0) uniform Frame {{
    float aspect;
}};

const float MAX_DIST = {max_dist};
const int MAX_ITER = {max_iter};
const float EPSILON = {epsilon};
const vec3 SURFACE_COLOR = {surface};
const vec3 SKY_COLOR = {sky};
const vec3 LIGHT_DIR = {light};

// Point currently evaluated by distance_map, read by sample_point().
vec3 map_point;

"#,
        max_dist = format_glsl_float(config.max_distance),
        max_iter = config.max_iterations,
        epsilon = format_glsl_float(config.epsilon),
        surface = glsl_vec3(config.surface_color),
        sky = glsl_vec3(config.sky_color),
        light = glsl_vec3(config.light_direction),
    )
}

pub fn assemble_fragment_shader(
    registry: &OperatorRegistry,
    map_source: &str,
    config: &RayMarchConfig,
) -> String {
    let mut out = fragment_header(config);
    out.push_str(&registry.preamble());
    out.push_str(map_source);
    out.push('\n');
    out.push_str(ENGINE);
    out
}

/// Compile `graph` and assemble both shader stages.
pub fn build_shader_program(
    registry: &OperatorRegistry,
    graph: &SceneGraph,
    config: &RayMarchConfig,
) -> Result<ShaderProgram, CompileError> {
    let map_source = compile_map(graph)?;
    Ok(ShaderProgram {
        vertex: VERTEX_SHADER.to_string(),
        fragment: assemble_fragment_shader(registry, &map_source, config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Literal;

    #[test]
    fn header_bakes_config_constants() {
        let config = RayMarchConfig {
            max_distance: 100.0,
            max_iterations: 64,
            epsilon: 0.005,
            ..RayMarchConfig::default()
        };
        let header = fragment_header(&config);
        assert!(header.starts_with("#version 450\n"));
        assert!(header.contains("const float MAX_DIST = 100.0;"));
        assert!(header.contains("const int MAX_ITER = 64;"));
        assert!(header.contains("const float EPSILON = 0.005;"));
        assert!(header.contains("const vec3 SURFACE_COLOR = vec3(0.9, 0.9, 0.9);"));
        assert!(header.contains("vec3 map_point;"));
    }

    #[test]
    fn engine_names_and_builtins_are_reserved() {
        for symbol in ["main", "distance_map", "scene_distance", "soft_shadow", "length", "mix"] {
            assert!(is_reserved_symbol(symbol), "{symbol}");
        }
        assert!(is_reserved_symbol("node_ball"));
        assert!(is_reserved_symbol("gl_Position"));
        assert!(is_reserved_symbol("my__op"));
        assert!(!is_reserved_symbol("sdf_sphere"));
        assert!(!is_reserved_symbol("node"));
    }

    #[test]
    fn sections_are_in_fixed_order() {
        let registry = OperatorRegistry::builtin().unwrap();
        let mut graph = SceneGraph::new();
        graph.set_literal(graph.root(), 0, Literal::scalar(1.0)).unwrap();

        let program = build_shader_program(&registry, &graph, &RayMarchConfig::default()).unwrap();
        let frag = &program.fragment;
        let header_at = frag.find("vec3 map_point;").unwrap();
        let preamble_at = frag.find("vec3 sample_point()").unwrap();
        let last_op_at = frag.find("float op_smooth_union(").unwrap();
        let map_at = frag.find("float scene_distance()").unwrap();
        let engine_at = frag.find("vec3 estimate_normal(").unwrap();
        assert!(header_at < preamble_at);
        assert!(preamble_at < last_op_at && last_op_at < map_at);
        assert!(map_at < engine_at);
        assert_eq!(program.vertex, VERTEX_SHADER);
    }
}
