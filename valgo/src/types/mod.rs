//! Type model shared by the source and the target trees
//!
//! Types are immutable values. Two types are the same type when their
//! rendered forms are equal, which is also how `PartialEq` and `Hash`
//! are implemented.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base name of the runtime's immutable wrapper type
pub const IMMUTABLE: &str = "Immutable";

/// Base name of the runtime's optional type
pub const OPTION: &str = "Option";

/// Smallest and largest tuple arity the runtime provides
pub const MIN_TUPLE_ARITY: usize = 2;
pub const MAX_TUPLE_ARITY: usize = 10;

/// Basic types the target language knows without declarations
const BUILTIN_BASICS: &[&str] = &[
    "bool", "string", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr", "float32", "float64", "complex64", "complex128", "byte",
    "rune", "error", "any",
];

const NUMERIC_BASICS: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64",
    "uintptr", "float32", "float64", "byte", "rune",
];

/// Structural violations of the type model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("immutable wrapper cannot wrap another immutable value: {0}")]
    DoubleWrap(String),
}

/// Type representation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// Builtin type or unqualified type parameter (`int`, `string`, `T`)
    Basic { name: String },
    /// Declared type, qualified by package (empty package = current package)
    Named { package: String, name: String },
    /// Generic instantiation: `Base[P1, P2]`
    Generic { base: Box<Type>, params: Vec<Type> },
    /// Slice type `[]T`
    Array { elem: Box<Type> },
    /// Pointer type `*T`
    Pointer { elem: Box<Type> },
    /// Map type `map[K]V`
    Map { key: Box<Type>, elem: Box<Type> },
    /// Function type
    Func { params: Vec<Type>, results: Vec<Type> },
    /// The explicit "any" escape hatch; compatible with everything
    Any,
    /// Absence of a type; compatible with everything
    Nil,
    /// Statement-only absence of a value
    Void,
}

impl Type {
    pub fn basic(name: impl Into<String>) -> Self {
        Type::Basic { name: name.into() }
    }

    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        Type::Named {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Named type in the package being lowered
    pub fn local(name: impl Into<String>) -> Self {
        Type::named("", name)
    }

    /// Generic instantiation without the wrapper check.
    ///
    /// Use [`Type::checked_generic`] whenever `base` may be the immutable wrapper.
    pub fn generic(base: Type, params: Vec<Type>) -> Self {
        if params.is_empty() {
            return base;
        }
        Type::Generic {
            base: Box::new(base),
            params,
        }
    }

    /// Generic instantiation that rejects double wrapping, recursively
    pub fn checked_generic(base: Type, params: Vec<Type>) -> Result<Self, TypeError> {
        let ty = Type::generic(base, params);
        ty.validate()?;
        Ok(ty)
    }

    /// `Immutable[inner]` in the given runtime package
    pub fn immutable(runtime: &str, inner: Type) -> Result<Self, TypeError> {
        Type::checked_generic(Type::named(runtime, IMMUTABLE), vec![inner])
    }

    pub fn array(elem: Type) -> Self {
        Type::Array {
            elem: Box::new(elem),
        }
    }

    pub fn pointer(elem: Type) -> Self {
        Type::Pointer {
            elem: Box::new(elem),
        }
    }

    pub fn map(key: Type, elem: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            elem: Box::new(elem),
        }
    }

    pub fn func(params: Vec<Type>, results: Vec<Type>) -> Self {
        Type::Func { params, results }
    }

    pub fn int() -> Self {
        Type::basic("int")
    }

    pub fn bool() -> Self {
        Type::basic("bool")
    }

    pub fn string() -> Self {
        Type::basic("string")
    }

    pub fn float64() -> Self {
        Type::basic("float64")
    }

    /// Runtime tuple type of the given element types
    pub fn tuple(runtime: &str, elems: Vec<Type>) -> Self {
        let base = Type::named(runtime, tuple_name(elems.len()));
        Type::generic(base, elems)
    }

    /// Canonical string form; equality of types is equality of renders
    pub fn render(&self) -> String {
        match self {
            Type::Basic { name } => name.clone(),
            Type::Named { package, name } => {
                if package.is_empty() {
                    name.clone()
                } else {
                    format!("{package}.{name}")
                }
            }
            Type::Generic { base, params } => {
                let params: Vec<String> = params.iter().map(Type::render).collect();
                format!("{}[{}]", base.render(), params.join(", "))
            }
            Type::Array { elem } => format!("[]{}", elem.render()),
            Type::Pointer { elem } => format!("*{}", elem.render()),
            Type::Map { key, elem } => format!("map[{}]{}", key.render(), elem.render()),
            Type::Func { params, results } => {
                let params: Vec<String> = params.iter().map(Type::render).collect();
                let mut out = format!("func({})", params.join(", "));
                match results.as_slice() {
                    [] => {}
                    [single] => {
                        out.push(' ');
                        out.push_str(&single.render());
                    }
                    many => {
                        let many: Vec<String> = many.iter().map(Type::render).collect();
                        out.push_str(&format!(" ({})", many.join(", ")));
                    }
                }
                out
            }
            Type::Any => "any".to_string(),
            Type::Nil => "nil".to_string(),
            Type::Void => "void".to_string(),
        }
    }

    /// Unqualified name of the outermost declared type
    pub fn base_name(&self) -> String {
        match self {
            Type::Basic { name } => name.clone(),
            Type::Named { name, .. } => name.clone(),
            Type::Generic { base, .. } => base.base_name(),
            Type::Pointer { elem } => elem.base_name(),
            other => other.render(),
        }
    }

    /// Package qualifier of the outermost declared type, if any
    pub fn package(&self) -> Option<&str> {
        match self {
            Type::Named { package, .. } if !package.is_empty() => Some(package),
            Type::Generic { base, .. } => base.package(),
            Type::Pointer { elem } => elem.package(),
            _ => None,
        }
    }

    /// Type without its generic arguments
    pub fn base(&self) -> &Type {
        match self {
            Type::Generic { base, .. } => base,
            other => other,
        }
    }

    pub fn generic_args(&self) -> &[Type] {
        match self {
            Type::Generic { params, .. } => params,
            _ => &[],
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Nil)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_any(&self) -> bool {
        match self {
            Type::Any => true,
            Type::Basic { name } => name == "any" || name == "interface{}",
            _ => false,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Basic { name } if name == "bool")
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Basic { name } if name == "string")
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Basic { name } if NUMERIC_BASICS.contains(&name.as_str()))
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Type::Basic { name } if BUILTIN_BASICS.contains(&name.as_str()))
    }

    /// Name of a leaf that may stand for a type parameter
    pub fn leaf_name(&self) -> Option<&str> {
        match self {
            Type::Basic { name } => Some(name),
            Type::Named { package, name } if package.is_empty() => Some(name),
            _ => None,
        }
    }

    pub fn is_immutable(&self) -> bool {
        match self {
            Type::Generic { base, params } => base.base_name() == IMMUTABLE && params.len() == 1,
            _ => false,
        }
    }

    pub fn immutable_inner(&self) -> Option<&Type> {
        if self.is_immutable() {
            self.generic_args().first()
        } else {
            None
        }
    }

    /// The wrapped type for `Immutable[T]`, the type itself otherwise
    pub fn strip_immutable(&self) -> Type {
        self.immutable_inner().cloned().unwrap_or_else(|| self.clone())
    }

    pub fn is_option(&self) -> bool {
        self.base_name() == OPTION && self.generic_args().len() == 1
    }

    pub fn tuple_arity(&self) -> Option<usize> {
        match self {
            Type::Generic { base, params } if base.base_name() == tuple_name(params.len()) => {
                Some(params.len())
            }
            _ => None,
        }
    }

    pub fn is_tuple(&self) -> bool {
        self.tuple_arity().is_some()
    }

    /// True when any leaf names one of `params`
    pub fn mentions(&self, params: &[String]) -> bool {
        if params.is_empty() {
            return false;
        }
        match self {
            Type::Basic { .. } | Type::Named { .. } => self
                .leaf_name()
                .map(|n| params.iter().any(|p| p == n))
                .unwrap_or(false),
            Type::Generic { base, params: args } => {
                base.mentions(params) || args.iter().any(|a| a.mentions(params))
            }
            Type::Array { elem } | Type::Pointer { elem } => elem.mentions(params),
            Type::Map { key, elem } => key.mentions(params) || elem.mentions(params),
            Type::Func {
                params: ps,
                results,
            } => ps.iter().chain(results.iter()).any(|t| t.mentions(params)),
            Type::Any | Type::Nil | Type::Void => false,
        }
    }

    /// True when the type is fully known (no `Nil` or `Void` anywhere)
    pub fn is_concrete(&self) -> bool {
        match self {
            Type::Nil | Type::Void => false,
            Type::Basic { .. } | Type::Named { .. } | Type::Any => true,
            Type::Generic { base, params } => {
                base.is_concrete() && params.iter().all(Type::is_concrete)
            }
            Type::Array { elem } | Type::Pointer { elem } => elem.is_concrete(),
            Type::Map { key, elem } => key.is_concrete() && elem.is_concrete(),
            Type::Func { params, results } => {
                params.iter().all(Type::is_concrete) && results.iter().all(Type::is_concrete)
            }
        }
    }

    /// Replace leaves named in `subst`, recursing through composite types
    pub fn substitute(&self, subst: &HashMap<String, Type>) -> Type {
        if subst.is_empty() {
            return self.clone();
        }
        match self {
            Type::Basic { name } => subst.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Named { package, name } if package.is_empty() => {
                subst.get(name).cloned().unwrap_or_else(|| self.clone())
            }
            Type::Generic { base, params } => Type::Generic {
                base: Box::new(base.substitute(subst)),
                params: params.iter().map(|p| p.substitute(subst)).collect(),
            },
            Type::Array { elem } => Type::array(elem.substitute(subst)),
            Type::Pointer { elem } => Type::pointer(elem.substitute(subst)),
            Type::Map { key, elem } => Type::map(key.substitute(subst), elem.substitute(subst)),
            Type::Func { params, results } => Type::Func {
                params: params.iter().map(|p| p.substitute(subst)).collect(),
                results: results.iter().map(|r| r.substitute(subst)).collect(),
            },
            _ => self.clone(),
        }
    }

    /// Reject immutable wrappers that wrap immutable wrappers, at any depth
    pub fn validate(&self) -> Result<(), TypeError> {
        match self {
            Type::Generic { base, params } => {
                if self.is_immutable() && params[0].is_immutable() {
                    return Err(TypeError::DoubleWrap(self.render()));
                }
                base.validate()?;
                params.iter().try_for_each(Type::validate)
            }
            Type::Array { elem } | Type::Pointer { elem } => elem.validate(),
            Type::Map { key, elem } => {
                key.validate()?;
                elem.validate()
            }
            Type::Func { params, results } => params
                .iter()
                .chain(results.iter())
                .try_for_each(Type::validate),
            _ => Ok(()),
        }
    }

    /// Same type with the package qualifier removed from the outermost name
    pub fn unqualified(&self) -> Type {
        match self {
            Type::Named { name, .. } => Type::local(name.clone()),
            Type::Generic { base, params } => Type::Generic {
                base: Box::new(base.unqualified()),
                params: params.clone(),
            },
            other => other.clone(),
        }
    }
}

/// Name of the runtime tuple type with `arity` elements
pub fn tuple_name(arity: usize) -> String {
    if arity == 2 {
        "Tuple".to_string()
    } else {
        format!("Tuple{arity}")
    }
}

/// Positional field name of tuple element `index` (0-based)
pub fn tuple_field(index: usize) -> String {
    format!("V{}", index + 1)
}

/// Build a substitution from parallel parameter names and arguments
pub fn substitution(params: &[String], args: &[Type]) -> HashMap<String, Type> {
    params
        .iter()
        .cloned()
        .zip(args.iter().cloned())
        .collect()
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.render() == other.render()
    }
}

impl Eq for Type {}

impl Default for Type {
    fn default() -> Self {
        Type::Void
    }
}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.render().hash(state);
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(elem: Type) -> Type {
        Type::generic(Type::named("std", "List"), vec![elem])
    }

    #[test]
    fn test_render_shapes() {
        assert_eq!(Type::int().render(), "int");
        assert_eq!(Type::named("fmt", "Stringer").render(), "fmt.Stringer");
        assert_eq!(Type::local("Person").render(), "Person");
        assert_eq!(list(Type::int()).render(), "std.List[int]");
        assert_eq!(Type::array(Type::string()).render(), "[]string");
        assert_eq!(Type::pointer(Type::local("Node")).render(), "*Node");
        assert_eq!(Type::map(Type::string(), Type::int()).render(), "map[string]int");
        assert_eq!(
            Type::func(vec![Type::int()], vec![Type::bool()]).render(),
            "func(int) bool"
        );
        assert_eq!(
            Type::func(vec![], vec![Type::int(), Type::bool()]).render(),
            "func() (int, bool)"
        );
    }

    #[test]
    fn test_equality_is_by_render() {
        assert_eq!(Type::basic("Person"), Type::local("Person"));
        assert_ne!(Type::local("Person"), Type::named("model", "Person"));
    }

    #[test]
    fn test_base_name_strips_package_and_params() {
        assert_eq!(list(Type::int()).base_name(), "List");
        assert_eq!(Type::pointer(list(Type::int())).base_name(), "List");
        assert_eq!(list(Type::int()).package(), Some("std"));
    }

    #[test]
    fn test_generic_without_params_is_base() {
        assert_eq!(Type::generic(Type::local("Box"), vec![]), Type::local("Box"));
    }

    #[test]
    fn test_any_and_nil() {
        assert!(Type::Any.is_any());
        assert!(Type::basic("any").is_any());
        assert!(Type::Nil.is_nil());
        assert!(!Type::int().is_any());
    }

    #[test]
    fn test_substitute_recurses_into_children() {
        let mut subst = HashMap::new();
        subst.insert("T".to_string(), Type::int());
        let ty = Type::func(
            vec![Type::array(Type::basic("T"))],
            vec![Type::map(Type::string(), list(Type::local("T")))],
        );
        assert_eq!(ty.substitute(&subst).render(), "func([]int) map[string]std.List[int]");
    }

    #[test]
    fn test_substitute_leaves_qualified_names() {
        let mut subst = HashMap::new();
        subst.insert("T".to_string(), Type::int());
        assert_eq!(Type::named("pkg", "T").substitute(&subst).render(), "pkg.T");
        assert_eq!(Type::Any.substitute(&subst), Type::Any);
    }

    #[test]
    fn test_double_wrap_rejected() {
        let once = Type::immutable("std", Type::int()).unwrap();
        assert!(once.is_immutable());
        assert_eq!(once.immutable_inner(), Some(&Type::int()));
        let twice = Type::immutable("std", once);
        assert!(matches!(twice, Err(TypeError::DoubleWrap(_))));
    }

    #[test]
    fn test_double_wrap_detected_when_nested() {
        let inner = Type::Generic {
            base: Box::new(Type::named("std", IMMUTABLE)),
            params: vec![Type::immutable("std", Type::int()).unwrap()],
        };
        let nested = list(inner);
        assert!(nested.validate().is_err());
    }

    #[test]
    fn test_tuple_arity() {
        let pair = Type::tuple("std", vec![Type::int(), Type::string()]);
        assert_eq!(pair.render(), "std.Tuple[int, string]");
        assert_eq!(pair.tuple_arity(), Some(2));
        let triple = Type::tuple("std", vec![Type::int(); 3]);
        assert_eq!(triple.tuple_arity(), Some(3));
        assert!(!list(Type::int()).is_tuple());
    }

    #[test]
    fn test_mentions_type_params() {
        let params = vec!["T".to_string()];
        assert!(list(Type::basic("T")).mentions(&params));
        assert!(!list(Type::int()).mentions(&params));
        assert!(!Type::named("pkg", "T").mentions(&params));
    }

    #[test]
    fn test_is_concrete() {
        assert!(list(Type::int()).is_concrete());
        assert!(!list(Type::Nil).is_concrete());
        assert!(!Type::Void.is_concrete());
    }

    #[test]
    fn test_default_is_void() {
        assert!(Type::default().is_void());
    }
}
