//! Metadata of the runtime package
//!
//! Emitted code depends on a small runtime: the immutable wrapper, an
//! optional type with its `Some`/`None` extractors, tuples, a sequence type,
//! and the copy and reflective-unapply helpers.

use super::{
    CompanionObjectMetadata, FunctionMetadata, MetadataFile, MethodMetadata, TypeKind,
    TypeMetadata,
};
use crate::types::{self, IMMUTABLE, OPTION, Type};

fn t(name: &str) -> Type {
    Type::basic(name)
}

fn method(params: Vec<Type>, result: Type) -> MethodMetadata {
    MethodMetadata {
        params,
        result,
        ..MethodMetadata::default()
    }
}

fn generic_type(runtime: &str, name: &str, kind: TypeKind, params: &[&str]) -> TypeMetadata {
    let mut ty = TypeMetadata::new(runtime, name, kind);
    ty.type_params = params.iter().map(|p| p.to_string()).collect();
    ty
}

fn function(runtime: &str, name: &str, tparams: &[&str], params: Vec<Type>, result: Type) -> FunctionMetadata {
    FunctionMetadata {
        package: runtime.to_string(),
        name: name.to_string(),
        params,
        result,
        type_params: tparams.iter().map(|p| p.to_string()).collect(),
    }
}

/// Runtime prelude for the runtime package named `runtime`
pub fn prelude(runtime: &str) -> MetadataFile {
    let of = |name: &str, params: Vec<Type>| Type::generic(Type::named(runtime, name), params);
    let option_t = of(OPTION, vec![t("T")]);
    let list_t = of("List", vec![t("T")]);
    let immutable_t = Type::Generic {
        base: Box::new(Type::named(runtime, IMMUTABLE)),
        params: vec![t("T")],
    };

    let mut immutable = generic_type(runtime, IMMUTABLE, TypeKind::Opaque, &["T"]);
    immutable.methods.insert("Get".into(), method(vec![], t("T")));

    let mut option = generic_type(runtime, OPTION, TypeKind::Sealed, &["T"]);
    option.variants = vec!["Some".into(), "None".into()];
    option.methods.insert("IsDefined".into(), method(vec![], Type::bool()));
    option.methods.insert("Get".into(), method(vec![], t("T")));

    let mut some = generic_type(runtime, "Some", TypeKind::Companion, &["T"]);
    some.methods.insert("Apply".into(), method(vec![t("T")], option_t.clone()));
    some.methods.insert("Unapply".into(), method(vec![option_t.clone()], option_t.clone()));

    let mut none = generic_type(runtime, "None", TypeKind::Companion, &["T"]);
    none.methods.insert("Apply".into(), method(vec![], option_t.clone()));
    none.methods.insert("Unapply".into(), method(vec![option_t.clone()], Type::bool()));

    let mut list = generic_type(runtime, "List", TypeKind::Opaque, &["T"]);
    list.methods.insert("Size".into(), method(vec![], Type::int()));
    list.methods.insert("Get".into(), method(vec![Type::int()], t("T")));
    list.methods.insert("Drop".into(), method(vec![Type::int()], list_t.clone()));

    let mut type_table = vec![immutable, option, some, none, list];
    for arity in types::MIN_TUPLE_ARITY..=types::MAX_TUPLE_ARITY {
        let params: Vec<String> = (1..=arity).map(|i| format!("T{i}")).collect();
        let mut tuple = TypeMetadata::new(runtime, types::tuple_name(arity), TypeKind::Struct);
        tuple.fields = (0..arity).map(types::tuple_field).collect();
        tuple.immut_flags = vec![false; arity];
        tuple.field_types = params.iter().map(|p| t(p)).collect();
        tuple.type_params = params;
        type_table.push(tuple);
    }

    let companion = |name: &str| CompanionObjectMetadata {
        package: runtime.to_string(),
        name: name.to_string(),
        target: OPTION.to_string(),
        extract_indices: vec![0],
    };

    MetadataFile {
        types: type_table,
        functions: vec![
            function(runtime, "NewImmutable", &["T"], vec![t("T")], immutable_t.clone()),
            function(runtime, "Copy", &["T"], vec![immutable_t.clone()], immutable_t),
            function(runtime, "UnapplyFull", &[], vec![Type::Any, Type::Any], Type::array(Type::Any)),
            function(runtime, "UnapplyCheck", &[], vec![Type::Any, Type::Any], Type::bool()),
            function(runtime, "ListOf", &["T"], vec![Type::array(t("T"))], list_t),
        ],
        companions: vec![companion("Some"), companion("None")],
        imports: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_tuples() {
        let file = prelude("std");
        let triple = file.types.iter().find(|t| t.name == "Tuple3").unwrap();
        assert_eq!(triple.fields, vec!["V1", "V2", "V3"]);
        assert_eq!(triple.type_params, vec!["T1", "T2", "T3"]);
        assert!(file.types.iter().any(|t| t.name == "Tuple10"));
        assert!(!file.types.iter().any(|t| t.name == "Tuple11"));
    }

    #[test]
    fn test_prelude_option_extractors() {
        let file = prelude("rt");
        let some = file.types.iter().find(|t| t.name == "Some").unwrap();
        let unapply = some.method("Unapply").unwrap();
        assert_eq!(unapply.result.render(), "rt.Option[T]");
        let option = file.types.iter().find(|t| t.name == "Option").unwrap();
        assert_eq!(option.variants, vec!["Some", "None"]);
    }
}
