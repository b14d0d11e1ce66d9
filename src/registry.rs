//! Operator registry: typed GLSL functions usable as scene-graph nodes.

use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tracing::debug;

use crate::renderer::is_reserved_symbol;
use crate::signature::parse_function_header;
use crate::types::{IoType, Literal};

mod builtin;

/// Rejection reasons for an operator definition.
///
/// All of these are fatal at start-up: a malformed operator never enters the
/// registry, so no scene node can reference it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("failed to find a GLSL function header in:\n{code}")]
    SignatureNotFound { code: String },
    #[error("`{symbol}` declares {found} parameter(s), operator inputs expect {expected}")]
    ArityMismatch {
        symbol: String,
        expected: usize,
        found: usize,
    },
    #[error(
        "`{symbol}` parameter {index} is declared `{found}`, operator input expects `{expected}`"
    )]
    TypeMismatch {
        symbol: String,
        index: usize,
        expected: IoType,
        found: String,
    },
    #[error("`{symbol}` returns `{found}`, operator output expects `{expected}`")]
    ReturnTypeMismatch {
        symbol: String,
        expected: IoType,
        found: String,
    },
    #[error("the root type is reserved for the scene root")]
    ReservedType,
    #[error("`{0}` is reserved by the generated shader")]
    ReservedSymbol(String),
    #[error("an operator named `{0}` is already registered")]
    DuplicateSymbol(String),
    #[error("{found} default(s) given for {expected} input(s)")]
    DefaultsLength { expected: usize, found: usize },
    #[error("default for input {index} has the wrong type or a non-finite component")]
    DefaultMismatch { index: usize },
}

/// Immutable operator definition shared by every node that uses it.
#[derive(Debug, PartialEq)]
pub struct OperatorType {
    inputs: Vec<IoType>,
    output: IoType,
    code: String,
    symbol: String,
    defaults: Vec<Option<Literal>>,
}

impl OperatorType {
    pub fn new(
        inputs: Vec<IoType>,
        output: IoType,
        code: impl Into<String>,
    ) -> Result<Self, RegistrationError> {
        let defaults = vec![None; inputs.len()];
        Self::with_defaults(inputs, output, code, defaults)
    }

    /// Build an operator whose freshly attached nodes start with `defaults`
    /// in their input slots.
    pub fn with_defaults(
        inputs: Vec<IoType>,
        output: IoType,
        code: impl Into<String>,
        defaults: Vec<Option<Literal>>,
    ) -> Result<Self, RegistrationError> {
        let code = code.into();

        if output == IoType::Root || inputs.contains(&IoType::Root) {
            return Err(RegistrationError::ReservedType);
        }

        let header = parse_function_header(&code)
            .ok_or_else(|| RegistrationError::SignatureNotFound { code: code.clone() })?;
        let symbol = header.name;
        if is_reserved_symbol(&symbol) {
            return Err(RegistrationError::ReservedSymbol(symbol));
        }

        if header.params.len() != inputs.len() {
            return Err(RegistrationError::ArityMismatch {
                symbol,
                expected: inputs.len(),
                found: header.params.len(),
            });
        }

        for (index, (param, &expected)) in header.params.iter().zip(&inputs).enumerate() {
            if param.is_output() || Some(param.ty.as_str()) != expected.glsl() {
                let found = if param.is_output() {
                    format!("{} {}", param.qualifiers.join(" "), param.ty)
                } else {
                    param.ty.clone()
                };
                return Err(RegistrationError::TypeMismatch {
                    symbol,
                    index,
                    expected,
                    found,
                });
            }
        }

        if Some(header.return_type.as_str()) != output.glsl() {
            return Err(RegistrationError::ReturnTypeMismatch {
                symbol,
                expected: output,
                found: header.return_type,
            });
        }

        if defaults.len() != inputs.len() {
            return Err(RegistrationError::DefaultsLength {
                expected: inputs.len(),
                found: defaults.len(),
            });
        }
        for (index, (default, &ty)) in defaults.iter().zip(&inputs).enumerate() {
            if let Some(lit) = default {
                if lit.ty != ty || !lit.is_finite() {
                    return Err(RegistrationError::DefaultMismatch { index });
                }
            }
        }

        Ok(Self {
            inputs,
            output,
            code,
            symbol,
            defaults,
        })
    }

    /// Synthetic operator backing the scene root: one scalar input, `Root` output, no code.
    pub(crate) fn root() -> Self {
        Self {
            inputs: vec![IoType::Scalar],
            output: IoType::Root,
            code: String::new(),
            symbol: String::new(),
            defaults: vec![None],
        }
    }

    pub fn inputs(&self) -> &[IoType] {
        &self.inputs
    }

    pub fn output(&self) -> IoType {
        self.output
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn defaults(&self) -> &[Option<Literal>] {
        &self.defaults
    }

    pub fn arity(&self) -> usize {
        self.inputs.len()
    }
}

/// Operator description before validation (built-ins and manifest entries).
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDef {
    pub inputs: Vec<IoType>,
    pub output: IoType,
    pub code: String,
    pub defaults: Vec<Option<Literal>>,
}

/// Append-only operator table. Registration order is the order in which
/// function bodies are emitted ahead of the map function.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    operators: Vec<Arc<OperatorType>>,
    index_by_symbol: HashMap<String, usize>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard distance-field operators.
    pub fn builtin() -> Result<Self, RegistrationError> {
        let mut registry = Self::new();
        for def in builtin::operator_defs() {
            registry.register_def(def)?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        inputs: Vec<IoType>,
        output: IoType,
        code: impl Into<String>,
    ) -> Result<Arc<OperatorType>, RegistrationError> {
        self.insert(OperatorType::new(inputs, output, code)?)
    }

    pub fn register_with_defaults(
        &mut self,
        inputs: Vec<IoType>,
        output: IoType,
        code: impl Into<String>,
        defaults: Vec<Option<Literal>>,
    ) -> Result<Arc<OperatorType>, RegistrationError> {
        self.insert(OperatorType::with_defaults(inputs, output, code, defaults)?)
    }

    pub fn register_def(
        &mut self,
        def: OperatorDef,
    ) -> Result<Arc<OperatorType>, RegistrationError> {
        self.register_with_defaults(def.inputs, def.output, def.code, def.defaults)
    }

    /// Register every definition in order, stopping at the first rejection.
    pub fn register_all(
        &mut self,
        defs: impl IntoIterator<Item = OperatorDef>,
    ) -> Result<(), RegistrationError> {
        for def in defs {
            self.register_def(def)?;
        }
        Ok(())
    }

    fn insert(&mut self, op: OperatorType) -> Result<Arc<OperatorType>, RegistrationError> {
        if self.index_by_symbol.contains_key(op.symbol()) {
            return Err(RegistrationError::DuplicateSymbol(op.symbol));
        }

        let index = self.operators.len();
        let op = Arc::new(op);
        self.index_by_symbol.insert(op.symbol().to_string(), index);
        self.operators.push(op.clone());

        debug!(symbol = op.symbol(), index, arity = op.arity(), "registered operator");
        Ok(op)
    }

    pub fn get(&self, symbol: &str) -> Option<&Arc<OperatorType>> {
        self.index_by_symbol
            .get(symbol)
            .map(|&idx| &self.operators[idx])
    }

    /// Registration index of `symbol`.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index_by_symbol.get(symbol).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<OperatorType>> {
        self.operators.iter()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// All operator bodies, concatenated in registration order.
    pub fn preamble(&self) -> String {
        let mut out = String::new();
        for op in &self.operators {
            out.push_str(op.code().trim_end());
            out.push_str("\n\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_round_trip() {
        let op = OperatorType::new(
            vec![IoType::Scalar, IoType::Vec3],
            IoType::Scalar,
            "float f(float a, vec3 b) { return a + b.x; }",
        )
        .unwrap();
        assert_eq!(op.symbol(), "f");
        assert_eq!(op.arity(), 2);
    }

    #[test]
    fn swapped_input_order_is_rejected() {
        let err = OperatorType::new(
            vec![IoType::Vec3, IoType::Scalar],
            IoType::Scalar,
            "float f(float a, vec3 b) { return a + b.x; }",
        )
        .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::TypeMismatch {
                symbol: "f".to_string(),
                index: 0,
                expected: IoType::Vec3,
                found: "float".to_string(),
            }
        );
    }

    #[test]
    fn arity_is_checked() {
        let err = OperatorType::new(
            vec![IoType::Vec3],
            IoType::Scalar,
            "float sdf_sphere(vec3 p, float r) { return length(p) - r; }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::ArityMismatch { expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let err = OperatorType::new(vec![], IoType::Scalar, "return 1.0;").unwrap_err();
        assert!(matches!(err, RegistrationError::SignatureNotFound { .. }));
    }

    #[test]
    fn return_type_must_match_output() {
        let err = OperatorType::new(
            vec![IoType::Vec3],
            IoType::Scalar,
            "vec3 id(vec3 p) { return p; }",
        )
        .unwrap_err();
        assert!(matches!(err, RegistrationError::ReturnTypeMismatch { .. }));
    }

    #[test]
    fn out_parameters_are_rejected() {
        let err = OperatorType::new(
            vec![IoType::Scalar],
            IoType::Scalar,
            "float f(out float a) { a = 1.0; return a; }",
        )
        .unwrap_err();
        assert!(matches!(err, RegistrationError::TypeMismatch { index: 0, .. }));
    }

    #[test]
    fn root_type_is_reserved() {
        let err = OperatorType::new(vec![IoType::Root], IoType::Scalar, "float f(float a) {}")
            .unwrap_err();
        assert_eq!(err, RegistrationError::ReservedType);
        let err = OperatorType::new(vec![], IoType::Root, "float f() {}").unwrap_err();
        assert_eq!(err, RegistrationError::ReservedType);
    }

    #[test]
    fn defaults_are_type_checked() {
        let code = "float sdf_sphere(vec3 p, float r) { return length(p) - r; }";
        let err = OperatorType::with_defaults(
            vec![IoType::Vec3, IoType::Scalar],
            IoType::Scalar,
            code,
            vec![None, Some(Literal::vec2(1.0, 1.0))],
        )
        .unwrap_err();
        assert_eq!(err, RegistrationError::DefaultMismatch { index: 1 });

        let err = OperatorType::with_defaults(
            vec![IoType::Vec3, IoType::Scalar],
            IoType::Scalar,
            code,
            vec![None],
        )
        .unwrap_err();
        assert_eq!(err, RegistrationError::DefaultsLength { expected: 2, found: 1 });
    }

    #[test]
    fn shader_owned_names_are_rejected() {
        let mut registry = OperatorRegistry::builtin().unwrap();
        let before = registry.len();
        let cases = [
            "float distance_map(vec3 p) { return length(p); }",
            "float main(vec3 p) { return length(p); }",
            "float length(vec3 p) { return 0.0; }",
            "float node_ball(vec3 p) { return 0.0; }",
            "float gl_thing(vec3 p) { return 0.0; }",
        ];
        for code in cases {
            let err = registry
                .register(vec![IoType::Vec3], IoType::Scalar, code)
                .unwrap_err();
            assert!(matches!(err, RegistrationError::ReservedSymbol(_)), "{code}");
        }
        assert_eq!(registry.len(), before);
        assert_eq!(
            OperatorType::new(vec![], IoType::Scalar, "float soft_shadow() { return 1.0; }"),
            Err(RegistrationError::ReservedSymbol("soft_shadow".to_string()))
        );
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let mut registry = OperatorRegistry::new();
        let code = "float f(float a) { return a; }";
        registry.register(vec![IoType::Scalar], IoType::Scalar, code).unwrap();
        let err = registry
            .register(vec![IoType::Scalar], IoType::Scalar, code)
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateSymbol("f".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn preamble_follows_registration_order() {
        let mut registry = OperatorRegistry::new();
        registry
            .register(vec![], IoType::Scalar, "float b() { return 2.0; }")
            .unwrap();
        registry
            .register(vec![], IoType::Scalar, "float a() { return 1.0; }")
            .unwrap();
        let preamble = registry.preamble();
        assert!(preamble.find("float b()").unwrap() < preamble.find("float a()").unwrap());
        assert_eq!(registry.index_of("a"), Some(1));
    }

    #[test]
    fn builtin_registry_is_valid() {
        let registry = OperatorRegistry::builtin().unwrap();
        assert!(registry.get("sdf_sphere").is_some());
        assert!(registry.get("sample_point").is_some());
        assert_eq!(registry.index_of("sample_point"), Some(0));
        let sphere = registry.get("sdf_sphere").unwrap();
        assert_eq!(sphere.inputs(), &[IoType::Vec3, IoType::Scalar]);
        assert_eq!(sphere.defaults()[1], Some(Literal::scalar(1.0)));
    }
}
