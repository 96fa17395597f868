//! Scoped symbol table: four independent scope stacks (identifiers, types,
//! template structs, template functions), matching
//! `examples/original_source/include/Environment.hh` exactly, generalized
//! from the teacher's two-map `CodegenContext` scope (variables + functions)
//! to the four namespaces the spec requires.
//!
//! Dispatch between the identifier and type namespaces is by the
//! case of the name's first letter, exactly as in the original: uppercase
//! initial means "this is a type", lowercase (or non-ASCII) means "this is a
//! value".

use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::ast::TemplateFunctionDefinition;
use crate::diagnostics::{CraeftError, CraeftResult, SourcePos};
use crate::types::{FloatPrecision, TemplateType, Type};

/// The built-in type names every environment starts with: `Float`, `Double`,
/// and `I1..I64`/`U1..U64`. Computed once and cloned into each fresh scope.
static BUILTIN_TYPES: Lazy<Vec<(String, Type)>> = Lazy::new(|| {
    let mut types = vec![
        ("Float".to_string(), Type::Float(FloatPrecision::Single)),
        ("Double".to_string(), Type::Float(FloatPrecision::Double)),
    ];
    for n in 1..=64u32 {
        types.push((format!("I{n}"), Type::SignedInt(n)));
        types.push((format!("U{n}"), Type::UnsignedInt(n)));
    }
    types
});

/// A struct type that still has unbound type parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateStruct {
    pub name: String,
    pub type_params: Vec<String>,
    pub fields: Vec<(String, TemplateType)>,
}

/// A registered `fn <: T, ... :>` template: its AST body plus the template
/// type signature built from its declared parameter/return type
/// expressions. The body is reference-counted because the translator keeps
/// it alive across every specialization it codegens on demand.
#[derive(Debug, Clone)]
pub struct TemplateValue {
    pub def: Rc<TemplateFunctionDefinition>,
    pub ty: TemplateType,
    pub arg_names: Vec<String>,
}

/// A bound identifier: the logical Craeft type plus an opaque handle `V`
/// (an LLVM value in the translator, but this module knows nothing about
/// LLVM). The handle's *actual* representation is a pointer to storage for
/// every type except `Function`, where the handle is the function itself;
/// see `get_type` on the translator's own value wrapper for how that
/// distinction is exploited.
#[derive(Debug, Clone)]
pub struct Variable<V> {
    pub handle: V,
    pub ty: Type,
}

#[derive(Debug, Clone, Default)]
struct Scope<V> {
    identifiers: HashMap<String, Variable<V>>,
    types: HashMap<String, Type>,
    template_structs: HashMap<String, TemplateStruct>,
    template_functions: HashMap<String, TemplateValue>,
}

pub struct Environment<V> {
    scopes: Vec<Scope<V>>,
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

impl<V: Clone> Environment<V> {
    /// A fresh environment with one scope, pre-populated with the built-in
    /// types `Float`, `Double`, and `I1..I64`/`U1..U64`.
    pub fn new() -> Self {
        let mut env = Environment {
            scopes: vec![Scope::default()],
        };
        for (name, ty) in BUILTIN_TYPES.iter() {
            env.scopes[0].types.insert(name.clone(), ty.clone());
        }
        env
    }

    pub fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop(&mut self) -> CraeftResult<()> {
        if self.scopes.len() <= 1 {
            return Err(CraeftError::internal(
                "scope stack underflow",
                SourcePos::synthetic(),
            ));
        }
        self.scopes.pop();
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Whether `name` is bound to *something* in its namespace (identifier
    /// namespace if lowercase-initial, type namespace otherwise).
    pub fn bound(&self, name: &str) -> bool {
        if starts_uppercase(name) {
            self.scopes.iter().any(|s| s.types.contains_key(name))
        } else {
            self.scopes.iter().any(|s| s.identifiers.contains_key(name))
        }
    }

    pub fn add_identifier(&mut self, name: impl Into<String>, var: Variable<V>) {
        self.innermost_mut().identifiers.insert(name.into(), var);
    }

    pub fn add_type(&mut self, name: impl Into<String>, ty: Type) {
        self.innermost_mut().types.insert(name.into(), ty);
    }

    pub fn add_template_struct(&mut self, name: impl Into<String>, ts: TemplateStruct) {
        self.innermost_mut()
            .template_structs
            .insert(name.into(), ts);
    }

    pub fn add_template_function(&mut self, name: impl Into<String>, tv: TemplateValue) {
        self.innermost_mut()
            .template_functions
            .insert(name.into(), tv);
    }

    pub fn lookup_identifier(&self, name: &str, pos: &SourcePos) -> CraeftResult<&Variable<V>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.identifiers.get(name))
            .ok_or_else(|| {
                CraeftError::name(format!("variable \"{name}\" not found"), pos.clone())
            })
    }

    pub fn lookup_type(&self, name: &str, pos: &SourcePos) -> CraeftResult<&Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.types.get(name))
            .ok_or_else(|| CraeftError::name(format!("type \"{name}\" not found"), pos.clone()))
    }

    pub fn lookup_template_struct(
        &self,
        name: &str,
        pos: &SourcePos,
    ) -> CraeftResult<&TemplateStruct> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.template_structs.get(name))
            .ok_or_else(|| {
                CraeftError::name(format!("template type \"{name}\" not found"), pos.clone())
            })
    }

    pub fn lookup_template_function(
        &self,
        name: &str,
        pos: &SourcePos,
    ) -> CraeftResult<&TemplateValue> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.template_functions.get(name))
            .ok_or_else(|| {
                CraeftError::name(
                    format!("template function \"{name}\" not found"),
                    pos.clone(),
                )
            })
    }

    fn innermost_mut(&mut self) -> &mut Scope<V> {
        self.scopes
            .last_mut()
            .expect("environment always has at least one scope")
    }
}

impl<V: Clone> Default for Environment<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SourcePos {
        SourcePos::new("t.cr", 1, 1)
    }

    #[test]
    fn test_builtins_preloaded() {
        let env: Environment<i32> = Environment::new();
        assert_eq!(
            env.lookup_type("I64", &pos()).unwrap(),
            &Type::SignedInt(64)
        );
        assert_eq!(
            env.lookup_type("Float", &pos()).unwrap(),
            &Type::Float(FloatPrecision::Single)
        );
    }

    #[test]
    fn test_push_pop_shadowing() {
        let mut env: Environment<i32> = Environment::new();
        env.add_identifier(
            "x",
            Variable {
                handle: 1,
                ty: Type::SignedInt(64),
            },
        );
        env.push();
        env.add_identifier(
            "x",
            Variable {
                handle: 2,
                ty: Type::SignedInt(64),
            },
        );
        assert_eq!(env.lookup_identifier("x", &pos()).unwrap().handle, 2);
        env.pop().unwrap();
        assert_eq!(env.lookup_identifier("x", &pos()).unwrap().handle, 1);
    }

    #[test]
    fn test_pop_underflow_is_internal_error() {
        let mut env: Environment<i32> = Environment::new();
        assert!(env.pop().is_err());
    }

    #[test]
    fn test_missing_identifier_is_name_error() {
        let env: Environment<i32> = Environment::new();
        let err = env.lookup_identifier("nope", &pos()).unwrap_err();
        assert_eq!(err.msg, "variable \"nope\" not found");
    }

    #[test]
    fn test_bound_dispatches_on_case() {
        let mut env: Environment<i32> = Environment::new();
        assert!(env.bound("I64"));
        assert!(!env.bound("x"));
        env.add_identifier(
            "x",
            Variable {
                handle: 0,
                ty: Type::Void,
            },
        );
        assert!(env.bound("x"));
    }
}
