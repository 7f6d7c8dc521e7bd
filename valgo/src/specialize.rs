//! Generic specialization planning
//!
//! The target language forbids type parameters on methods and rejects
//! generic types whose methods instantiate the type with different
//! arguments. Such methods are extracted into standalone functions named
//! `Receiver_Method`, taking the receiver as their first parameter.

use tracing::debug;

use crate::metadata::{MethodMetadata, TypeMetadata};
use crate::names::TempNames;
use crate::types::Type;

/// How a method is emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodPlan {
    /// Emitted as a method on its receiver type
    Keep,
    /// Emitted as a standalone generic function
    Extract {
        function: String,
        /// Receiver's parameters, then the method's own minus duplicates
        type_params: Vec<String>,
        /// For each of the method's own parameters, whether it survives
        kept: Vec<bool>,
    },
}

impl MethodPlan {
    pub fn is_extracted(&self) -> bool {
        matches!(self, MethodPlan::Extract { .. })
    }
}

/// Decide whether `method` of `owner` stays a method
pub fn plan(owner: &TypeMetadata, name: &str, method: &MethodMetadata) -> MethodPlan {
    let recv = owner.self_type(&owner.package);
    let reason = if !method.type_params.is_empty() {
        Some("method has its own type parameters")
    } else if method.generic {
        Some("marked generic by metadata")
    } else if has_instantiation_cycle(&recv, &method.result) {
        Some("result instantiates the receiver with different arguments")
    } else {
        None
    };
    let Some(reason) = reason else {
        return MethodPlan::Keep;
    };

    let kept: Vec<bool> = method
        .type_params
        .iter()
        .map(|p| !owner.type_params.contains(p))
        .collect();
    let type_params = owner
        .type_params
        .iter()
        .cloned()
        .chain(
            method
                .type_params
                .iter()
                .zip(&kept)
                .filter(|(_, keep)| **keep)
                .map(|(p, _)| p.clone()),
        )
        .collect();
    let function = TempNames::extracted(&owner.name, name);
    debug!(%function, reason, "extracting method");
    MethodPlan::Extract {
        function,
        type_params,
        kept,
    }
}

/// True when `result` mentions the generic base of `recv` applied to
/// arguments other than `recv`'s own. Bases match by unqualified name, so
/// a result written with a package qualifier still finds its receiver.
pub fn has_instantiation_cycle(recv: &Type, result: &Type) -> bool {
    if recv.generic_args().is_empty() {
        return false;
    }
    match result {
        Type::Generic { base, params } => {
            (base.base_name() == recv.base_name() && params.as_slice() != recv.generic_args())
                || params.iter().any(|p| has_instantiation_cycle(recv, p))
        }
        Type::Array { elem } | Type::Pointer { elem } => has_instantiation_cycle(recv, elem),
        Type::Map { key, elem } => {
            has_instantiation_cycle(recv, key) || has_instantiation_cycle(recv, elem)
        }
        Type::Func { params, results } => params
            .iter()
            .chain(results)
            .any(|t| has_instantiation_cycle(recv, t)),
        _ => false,
    }
}

/// Call-site type arguments of an extracted method
pub fn type_args(recv_args: &[Type], method_args: &[Type], kept: &[bool]) -> Vec<Type> {
    recv_args
        .iter()
        .cloned()
        .chain(
            method_args
                .iter()
                .zip(kept)
                .filter(|(_, keep)| **keep)
                .map(|(t, _)| t.clone()),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TypeKind;

    fn container() -> TypeMetadata {
        let mut meta = TypeMetadata::new("", "C", TypeKind::Struct);
        meta.type_params = vec!["T".into()];
        meta
    }

    fn c(arg: Type) -> Type {
        Type::generic(Type::local("C"), vec![arg])
    }

    fn returning(result: Type) -> MethodMetadata {
        MethodMetadata {
            result,
            ..MethodMetadata::default()
        }
    }

    #[test]
    fn test_same_instantiation_is_kept() {
        let plan = plan(&container(), "Self", &returning(c(Type::basic("T"))));
        assert_eq!(plan, MethodPlan::Keep);
    }

    #[test]
    fn test_other_type_is_kept() {
        let d = Type::generic(Type::local("D"), vec![Type::basic("T")]);
        assert_eq!(plan(&container(), "ToD", &returning(d)), MethodPlan::Keep);
    }

    #[test]
    fn test_cycle_is_extracted() {
        let pair = Type::tuple("std", vec![Type::basic("T"), Type::int()]);
        let plan = plan(&container(), "Zip", &returning(c(pair)));
        assert_eq!(
            plan,
            MethodPlan::Extract {
                function: "C_Zip".into(),
                type_params: vec!["T".into()],
                kept: vec![],
            }
        );
    }

    #[test]
    fn test_nested_cycle_is_found() {
        let nested = Type::array(c(Type::string()));
        assert!(has_instantiation_cycle(&c(Type::basic("T")), &nested));
        assert!(!has_instantiation_cycle(&Type::local("C"), &nested));
    }

    #[test]
    fn test_method_type_params_are_merged() {
        let method = MethodMetadata {
            result: Type::basic("U"),
            type_params: vec!["T".into(), "U".into()],
            ..MethodMetadata::default()
        };
        let MethodPlan::Extract {
            type_params, kept, ..
        } = plan(&container(), "Fold", &method)
        else {
            panic!("expected extraction");
        };
        assert_eq!(type_params, vec!["T", "U"]);
        assert_eq!(kept, vec![false, true]);
        assert_eq!(
            type_args(&[Type::int()], &[Type::int(), Type::string()], &kept),
            vec![Type::int(), Type::string()]
        );
    }

    #[test]
    fn test_metadata_flag_forces_extraction() {
        let method = MethodMetadata {
            generic: true,
            ..returning(Type::int())
        };
        assert!(plan(&container(), "Len", &method).is_extracted());
    }

    #[test]
    fn test_qualified_self_result_is_kept() {
        let mut stack = TypeMetadata::new("coll", "Stack", TypeKind::Opaque);
        stack.type_params = vec!["T".into()];
        let own = Type::generic(Type::named("coll", "Stack"), vec![Type::basic("T")]);
        assert_eq!(plan(&stack, "Push", &returning(own)), MethodPlan::Keep);

        let other = Type::generic(Type::named("coll", "Stack"), vec![Type::int()]);
        assert!(plan(&stack, "Counts", &returning(other)).is_extracted());
    }

    #[test]
    fn test_runtime_list_methods_are_kept() {
        let file = crate::metadata::prelude("std");
        let list = file.types.iter().find(|t| t.name == "List").unwrap();
        for (name, method) in &list.methods {
            assert_eq!(plan(list, name, method), MethodPlan::Keep, "{name}");
        }
    }
}
