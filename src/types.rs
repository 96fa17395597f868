//! The Craeft type algebra: fully-resolved types, template (generic) types
//! with positional parameter placeholders, specialization, and name
//! mangling.

use std::fmt;

/// IEEE-754 precision tags for `Float`/`Double`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloatPrecision {
    Single,
    Double,
}

/// A fully-resolved Craeft type: no unbound parameters remain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    SignedInt(u32),
    UnsignedInt(u32),
    Float(FloatPrecision),
    Void,
    Pointer(Box<Type>),
    Function {
        ret: Box<Type>,
        args: Vec<Type>,
    },
    Struct {
        name: String,
        fields: Vec<(String, Type)>,
    },
}

impl Type {
    pub fn is_integral(&self) -> bool {
        matches!(self, Type::SignedInt(_) | Type::UnsignedInt(_))
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::SignedInt(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// Field lookup by name; mirrors `Type::operator[]` in the original
    /// compiler, which returns `(-1, nullptr)` on a miss.
    pub fn field(&self, name: &str) -> Option<(usize, &Type)> {
        match self {
            Type::Struct { fields, .. } => fields
                .iter()
                .enumerate()
                .find(|(_, (n, _))| n == name)
                .map(|(i, (_, ty))| (i, ty)),
            _ => None,
        }
    }

    /// Deterministic, injective, self-delimiting mangled fragment for this
    /// type. See `SPEC_FULL.md` §4.3 for the rationale: every compound form
    /// is either fixed-width (primitives) or explicitly length-prefixed
    /// (structs, function argument lists), so concatenating fragments for a
    /// sequence of argument types can never be mis-split.
    pub fn mangle(&self) -> String {
        match self {
            Type::SignedInt(n) => format!("i{n}"),
            Type::UnsignedInt(n) => format!("u{n}"),
            Type::Float(FloatPrecision::Single) => "f".to_string(),
            Type::Float(FloatPrecision::Double) => "d".to_string(),
            Type::Void => "v".to_string(),
            Type::Pointer(inner) => format!("p{}", inner.mangle()),
            Type::Struct { name, fields } => {
                let mut s = format!("S{}_{}", name.len(), name);
                s.push_str(&fields.len().to_string());
                for (_, ty) in fields {
                    let m = ty.mangle();
                    s.push_str(&m.len().to_string());
                    s.push('_');
                    s.push_str(&m);
                }
                s
            }
            Type::Function { ret, args } => {
                let mut s = format!("F{}_", args.len());
                for arg in args {
                    let m = arg.mangle();
                    s.push_str(&m.len().to_string());
                    s.push('_');
                    s.push_str(&m);
                }
                s.push('_');
                s.push_str(&ret.mangle());
                s
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::SignedInt(n) => write!(f, "I{n}"),
            Type::UnsignedInt(n) => write!(f, "U{n}"),
            Type::Float(FloatPrecision::Single) => write!(f, "Float"),
            Type::Float(FloatPrecision::Double) => write!(f, "Double"),
            Type::Void => write!(f, "Void"),
            Type::Pointer(inner) => write!(f, "{inner}*"),
            Type::Struct { name, .. } => write!(f, "{name}"),
            Type::Function { ret, args } => {
                write!(f, "fn(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ") -> {ret}")
            }
        }
    }
}

/// Mangle a function name together with its concrete argument types. This is
/// the operation the original compiler declares as `mangle_name` but whose
/// definition was lost; see `SPEC_FULL.md` §4.3 and `DESIGN.md`.
pub fn mangle_name(fname: &str, args: &[Type]) -> String {
    let mut out = format!("{}${}_", fname, args.len());
    for arg in args {
        let m = arg.mangle();
        out.push_str(&m.len().to_string());
        out.push('_');
        out.push_str(&m);
    }
    out
}

/// A type that may still contain positional parameter placeholders,
/// produced when parsing `fn <: T :>` / `struct <: T :>` declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateType {
    SignedInt(u32),
    UnsignedInt(u32),
    Float(FloatPrecision),
    Void,
    Parameter(usize),
    Pointer(Box<TemplateType>),
    Function {
        ret: Box<TemplateType>,
        args: Vec<TemplateType>,
    },
    Struct {
        name: String,
        fields: Vec<(String, TemplateType)>,
    },
}

impl TemplateType {
    /// Substitute each `Parameter(i)` with `args[i]`, producing a fully
    /// resolved `Type`. Mirrors `SpecializerTypeVisitor` in the original
    /// compiler: primitives pass through unchanged, compound forms recurse.
    pub fn specialize(&self, args: &[Type]) -> Option<Type> {
        Some(match self {
            TemplateType::SignedInt(n) => Type::SignedInt(*n),
            TemplateType::UnsignedInt(n) => Type::UnsignedInt(*n),
            TemplateType::Float(p) => Type::Float(*p),
            TemplateType::Void => Type::Void,
            TemplateType::Parameter(i) => args.get(*i)?.clone(),
            TemplateType::Pointer(inner) => Type::Pointer(Box::new(inner.specialize(args)?)),
            TemplateType::Function { ret, args: params } => Type::Function {
                ret: Box::new(ret.specialize(args)?),
                args: params
                    .iter()
                    .map(|p| p.specialize(args))
                    .collect::<Option<Vec<_>>>()?,
            },
            TemplateType::Struct { name, fields } => Type::Struct {
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|(n, t)| Some((n.clone(), t.specialize(args)?)))
                    .collect::<Option<Vec<_>>>()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_structural() {
        let a = Type::Struct {
            name: "Point".into(),
            fields: vec![
                ("x".into(), Type::SignedInt(64)),
                ("y".into(), Type::SignedInt(64)),
            ],
        };
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mangling_distinguishes_arities() {
        let f1 = mangle_name("foo", &[Type::SignedInt(32)]);
        let f2 = mangle_name("foo", &[Type::SignedInt(32), Type::SignedInt(32)]);
        assert_ne!(f1, f2);
    }

    #[test]
    fn test_mangling_distinguishes_widths() {
        let a = mangle_name("id", &[Type::SignedInt(32)]);
        let b = mangle_name("id", &[Type::SignedInt(64)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_mangling_is_injective_for_nested_pointers() {
        let a = mangle_name(
            "f",
            &[Type::Pointer(Box::new(Type::Pointer(Box::new(Type::SignedInt(8)))))],
        );
        let b = mangle_name("f", &[Type::Pointer(Box::new(Type::SignedInt(8)))]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_specialize_substitutes_parameter() {
        let tmpl = TemplateType::Pointer(Box::new(TemplateType::Parameter(0)));
        let resolved = tmpl.specialize(&[Type::SignedInt(64)]).unwrap();
        assert_eq!(resolved, Type::Pointer(Box::new(Type::SignedInt(64))));
    }

    #[test]
    fn test_field_lookup() {
        let s = Type::Struct {
            name: "Point".into(),
            fields: vec![("x".into(), Type::SignedInt(64))],
        };
        assert_eq!(s.field("x"), Some((0, &Type::SignedInt(64))));
        assert_eq!(s.field("y"), None);
    }
}
