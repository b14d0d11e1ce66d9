//! Value kinds flowing between operators and literal constants for input slots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of a value produced or consumed by an operator.
///
/// `Root` is a sentinel: it is only ever the output of the synthetic scene
/// root and never appears as an input or as the output of a registered operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoType {
    #[serde(rename = "float")]
    Scalar,
    #[serde(rename = "vec2")]
    Vec2,
    #[serde(rename = "vec3")]
    Vec3,
    #[serde(rename = "vec4")]
    Vec4,
    #[serde(rename = "root")]
    Root,
}

impl IoType {
    /// Returns the GLSL type name for this value type, `None` for `Root`.
    pub fn glsl(self) -> Option<&'static str> {
        match self {
            IoType::Scalar => Some("float"),
            IoType::Vec2 => Some("vec2"),
            IoType::Vec3 => Some("vec3"),
            IoType::Vec4 => Some("vec4"),
            IoType::Root => None,
        }
    }

    /// Number of meaningful components.
    pub fn width(self) -> usize {
        match self {
            IoType::Scalar => 1,
            IoType::Vec2 => 2,
            IoType::Vec3 => 3,
            IoType::Vec4 => 4,
            IoType::Root => 0,
        }
    }

    pub fn from_glsl(name: &str) -> Option<Self> {
        match name {
            "float" => Some(IoType::Scalar),
            "vec2" => Some(IoType::Vec2),
            "vec3" => Some(IoType::Vec3),
            "vec4" => Some(IoType::Vec4),
            _ => None,
        }
    }

    pub fn from_width(width: usize) -> Option<Self> {
        match width {
            1 => Some(IoType::Scalar),
            2 => Some(IoType::Vec2),
            3 => Some(IoType::Vec3),
            4 => Some(IoType::Vec4),
            _ => None,
        }
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl().unwrap_or("root"))
    }
}

/// A constant filling an input slot in place of a child node.
///
/// Only the first `ty.width()` components are meaningful; the rest stay zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Literal {
    pub ty: IoType,
    pub components: [f32; 4],
}

impl Literal {
    pub fn scalar(x: f32) -> Self {
        Self {
            ty: IoType::Scalar,
            components: [x, 0.0, 0.0, 0.0],
        }
    }

    pub fn vec2(x: f32, y: f32) -> Self {
        Self {
            ty: IoType::Vec2,
            components: [x, y, 0.0, 0.0],
        }
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Self {
            ty: IoType::Vec3,
            components: [x, y, z, 0.0],
        }
    }

    pub fn vec4(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self {
            ty: IoType::Vec4,
            components: [x, y, z, w],
        }
    }

    /// Build a literal from 1 to 4 components.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let ty = IoType::from_width(values.len())?;
        let mut components = [0.0; 4];
        components[..values.len()].copy_from_slice(values);
        Some(Self { ty, components })
    }

    pub fn meaningful(&self) -> &[f32] {
        &self.components[..self.ty.width()]
    }

    pub fn is_finite(&self) -> bool {
        self.meaningful().iter().all(|c| c.is_finite())
    }

    /// Inline GLSL expression for this literal.
    ///
    /// Scalars are spelled as float literals so they bind to `float` parameters
    /// without relying on implicit conversion; vector components go through the
    /// constructor and keep their shortest decimal spelling.
    pub fn glsl_expr(&self) -> String {
        match self.ty {
            IoType::Scalar => format_glsl_float(self.components[0]),
            IoType::Root => String::new(),
            ty => format!(
                "{}({})",
                ty.glsl().unwrap_or_default(),
                self.meaningful()
                    .iter()
                    .map(|&c| format_glsl_component(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Spell an `f32` as a GLSL float literal (`1.0`, `2.5`, `-0.25`).
pub fn format_glsl_float(v: f32) -> String {
    let s = format!("{v}");
    if s.contains('.') { s } else { format!("{s}.0") }
}

/// Vector constructor argument: small integral values stay bare (`0`, `5`),
/// anything that would not fit a 32-bit integer literal is spelled as a float.
fn format_glsl_component(v: f32) -> String {
    if v.fract() == 0.0 && v >= i32::MIN as f32 && v < i32::MAX as f32 {
        format!("{v}")
    } else {
        format_glsl_float(v)
    }
}
