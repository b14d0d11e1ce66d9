//! Scene graph to GLSL: compilation, shader assembly and validation.
//!
//! This module is organized into several submodules:
//! - `compiler`: post-order code generation of the map function
//! - `shader`: fragment/vertex stage assembly around the compiled map
//! - `validation`: GLSL stage validation using naga
//!
//! The main entry point is `build_shader_program`.

pub mod compiler;
pub mod shader;
pub mod validation;

pub use compiler::{CompileError, CompiledMap, compile_body, compile_map, emit_map_source};
pub use shader::{
    RESERVED_SYMBOLS, ShaderProgram, VERTEX_SHADER, assemble_fragment_shader,
    build_shader_program, is_reserved_symbol,
};
pub use validation::{
    GlslShaderStage, StageDiagnostic, validate_glsl, validate_glsl_with_context, validate_program,
};
