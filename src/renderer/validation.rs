//! Offline GLSL stage validation using the naga library.
//!
//! Stands in for the driver's compile/link step: each stage is parsed by
//! naga's GLSL frontend and checked by its validator, and failures carry the
//! numbered source so the offending generated line is easy to find.

use std::fmt;

use anyhow::{Context, Result, anyhow};

use super::shader::ShaderProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for GlslShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlslShaderStage::Vertex => f.write_str("vertex"),
            GlslShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Parse and validate one GLSL stage.
///
/// # Returns
/// The naga Module on success, or an error with the numbered source listing.
pub fn validate_glsl(source: &str, stage: GlslShaderStage) -> Result<naga::Module> {
    let shader_stage = match stage {
        GlslShaderStage::Vertex => naga::ShaderStage::Vertex,
        GlslShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    let mut parser = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options {
        stage: shader_stage,
        defines: Default::default(),
    };

    let module = parser
        .parse(&options, source)
        .map_err(|e| anyhow!("GLSL parse failed: {e:?}\n{}", numbered_source(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| anyhow!("GLSL validation failed: {e:?}\n{}", numbered_source(source)))?;

    Ok(module)
}

/// Validate and attach a description of what generated the source.
pub fn validate_glsl_with_context(
    source: &str,
    stage: GlslShaderStage,
    context: &str,
) -> Result<naga::Module> {
    validate_glsl(source, stage)
        .with_context(|| format!("{context} generated invalid {stage} GLSL"))
}

/// Outcome of validating one stage of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDiagnostic {
    pub stage: GlslShaderStage,
    /// `None` when the stage compiled cleanly.
    pub error: Option<String>,
}

impl StageDiagnostic {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Validate every stage of `program`, reporting each stage separately.
pub fn validate_program(program: &ShaderProgram) -> Vec<StageDiagnostic> {
    [
        (GlslShaderStage::Vertex, program.vertex.as_str()),
        (GlslShaderStage::Fragment, program.fragment.as_str()),
    ]
    .into_iter()
    .map(|(stage, source)| StageDiagnostic {
        stage,
        error: validate_glsl(source, stage).err().map(|e| format!("{e:#}")),
    })
    .collect()
}

fn numbered_source(source: &str) -> String {
    let mut output = String::from("Generated GLSL:\n---\n");
    for (line_num, line) in source.lines().enumerate() {
        output.push_str(&format!("{:4} | {}\n", line_num + 1, line));
    }
    output.push_str("---\n");
    output
}
