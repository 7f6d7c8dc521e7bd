//! Structural unification of a pattern type against a concrete type
//!
//! The pattern side mentions unresolved type parameters; the concrete side
//! comes from an argument, subject or expected type. Unification only ever
//! binds parameters; it never rewrites the concrete side.

use std::collections::HashMap;

use tracing::trace;

use crate::types::Type;

/// Conflicting bindings found while unifying
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub param: String,
    pub first: Type,
    pub second: Type,
}

/// Accumulates a substitution for a fixed set of type parameters
#[derive(Debug, Clone)]
pub struct Unifier {
    params: Vec<String>,
    subst: HashMap<String, Type>,
}

impl Unifier {
    pub fn new(params: &[String]) -> Self {
        Self {
            params: params.to_vec(),
            subst: HashMap::new(),
        }
    }

    /// Seed a binding, e.g. from explicit type arguments
    pub fn bind(&mut self, param: &str, ty: Type) {
        self.subst.insert(param.to_string(), ty);
    }

    pub fn bindings(&self) -> &HashMap<String, Type> {
        &self.subst
    }

    fn param_name<'t>(&self, ty: &'t Type) -> Option<&'t str> {
        ty.leaf_name()
            .filter(|name| self.params.iter().any(|p| p == name))
    }

    /// Unify `pattern` with `concrete`, extending the substitution.
    ///
    /// Shapes that do not line up contribute nothing. Only a parameter bound
    /// to two different types is an error.
    pub fn unify(&mut self, pattern: &Type, concrete: &Type) -> Result<(), Conflict> {
        if concrete.is_nil() || concrete.is_void() {
            return Ok(());
        }

        // Reads through the wrapper yield the wrapped value
        if concrete.is_immutable() && !pattern.is_immutable() {
            if let Some(inner) = concrete.immutable_inner() {
                return self.unify(pattern, inner);
            }
        }

        if let Some(name) = self.param_name(pattern) {
            if concrete.is_any() || concrete.mentions(&self.params) {
                return Ok(());
            }
            return match self.subst.get(name) {
                Some(existing) if existing != concrete => Err(Conflict {
                    param: name.to_string(),
                    first: existing.clone(),
                    second: concrete.clone(),
                }),
                Some(_) => Ok(()),
                None => {
                    trace!(param = name, ty = %concrete, "bound type parameter");
                    self.subst.insert(name.to_string(), concrete.clone());
                    Ok(())
                }
            };
        }

        match (pattern, concrete) {
            (
                Type::Generic { base: pb, params: pp },
                Type::Generic { base: cb, params: cp },
            ) if pb.base_name() == cb.base_name() && pp.len() == cp.len() => {
                for (p, c) in pp.iter().zip(cp.iter()) {
                    self.unify(p, c)?;
                }
                Ok(())
            }
            (
                Type::Func {
                    params: pp,
                    results: pr,
                },
                Type::Func {
                    params: cp,
                    results: cr,
                },
            ) => {
                for (p, c) in pr.iter().zip(cr.iter()) {
                    self.unify(p, c)?;
                }
                if pp.len() == cp.len() {
                    for (p, c) in pp.iter().zip(cp.iter()) {
                        if c.is_concrete() {
                            self.unify(p, c)?;
                        }
                    }
                }
                Ok(())
            }
            (Type::Pointer { elem: p }, Type::Pointer { elem: c })
            | (Type::Array { elem: p }, Type::Array { elem: c }) => self.unify(p, c),
            (Type::Map { key: pk, elem: pe }, Type::Map { key: ck, elem: ce }) => {
                self.unify(pk, ck)?;
                self.unify(pe, ce)
            }
            _ => Ok(()),
        }
    }

    /// Binding for every parameter in declaration order, or `None` when any
    /// parameter is unbound or bound to something not fully concrete
    pub fn resolve(&self) -> Option<Vec<Type>> {
        self.params
            .iter()
            .map(|p| {
                self.subst
                    .get(p)
                    .filter(|t| t.is_concrete())
                    .cloned()
            })
            .collect()
    }

    /// Apply the bindings found so far
    pub fn apply(&self, ty: &Type) -> Type {
        ty.substitute(&self.subst)
    }

    pub fn into_substitution(self) -> HashMap<String, Type> {
        self.subst
    }
}

/// One-shot unification: the parameter bindings making `pattern` match
/// `concrete`, or `None` when inference is impossible
pub fn unify_all(params: &[String], pattern: &Type, concrete: &Type) -> Option<Vec<Type>> {
    let mut unifier = Unifier::new(params);
    unifier.unify(pattern, concrete).ok()?;
    unifier.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> Type {
        Type::basic(name)
    }

    fn option(inner: Type) -> Type {
        Type::generic(Type::named("std", "Option"), vec![inner])
    }

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_generic_by_position() {
        let got = unify_all(&params(&["T"]), &option(t("T")), &option(Type::int()));
        assert_eq!(got, Some(vec![Type::int()]));
    }

    #[test]
    fn test_package_stripped_base_names() {
        let pattern = Type::generic(Type::local("Option"), vec![t("T")]);
        let got = unify_all(&params(&["T"]), &pattern, &option(Type::string()));
        assert_eq!(got, Some(vec![Type::string()]));
    }

    #[test]
    fn test_arity_mismatch_gives_nothing() {
        let pair = Type::tuple("std", vec![t("A"), t("B")]);
        let triple = Type::tuple("std", vec![Type::int(); 3]);
        assert_eq!(unify_all(&params(&["A", "B"]), &pair, &triple), None);
    }

    #[test]
    fn test_func_results_and_known_params() {
        let pattern = Type::func(vec![t("A")], vec![t("B")]);
        let concrete = Type::func(vec![Type::int()], vec![Type::string()]);
        assert_eq!(
            unify_all(&params(&["A", "B"]), &pattern, &concrete),
            Some(vec![Type::int(), Type::string()])
        );

        let unknown_param = Type::func(vec![Type::Nil], vec![Type::string()]);
        let mut unifier = Unifier::new(&params(&["A", "B"]));
        unifier.unify(&pattern, &unknown_param).unwrap();
        assert_eq!(unifier.bindings().get("B"), Some(&Type::string()));
        assert_eq!(unifier.resolve(), None);
    }

    #[test]
    fn test_conflicting_bindings() {
        let mut unifier = Unifier::new(&params(&["T"]));
        unifier.unify(&t("T"), &Type::int()).unwrap();
        let err = unifier.unify(&t("T"), &Type::string()).unwrap_err();
        assert_eq!(err.param, "T");
        assert_eq!(err.first, Type::int());
    }

    #[test]
    fn test_containers_elementwise() {
        let pattern = Type::map(t("K"), Type::array(Type::pointer(t("V"))));
        let concrete = Type::map(Type::string(), Type::array(Type::pointer(Type::float64())));
        assert_eq!(
            unify_all(&params(&["K", "V"]), &pattern, &concrete),
            Some(vec![Type::string(), Type::float64()])
        );
    }

    #[test]
    fn test_wrapper_is_looked_through() {
        let wrapped = Type::immutable("std", Type::int()).unwrap();
        assert_eq!(unify_all(&params(&["T"]), &t("T"), &wrapped), Some(vec![Type::int()]));
    }

    #[test]
    fn test_nil_and_any_bind_nothing() {
        assert_eq!(unify_all(&params(&["T"]), &t("T"), &Type::Nil), None);
        assert_eq!(unify_all(&params(&["T"]), &t("T"), &Type::Any), None);
    }
}
