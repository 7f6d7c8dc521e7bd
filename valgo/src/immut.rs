//! Immutability insertion
//!
//! Value bindings and `val` struct fields are stored in the runtime's
//! immutable wrapper. Declarations wrap with `NewImmutable[T](v)`, reads
//! append `Get()`. Writes through a value binding or a non-`var` field are
//! rejected here, at lowering time.

use crate::ast::Span;
use crate::error::{CompileError, Result};
use crate::metadata::{Env, TypeMetadata};
use crate::scope::{Mutability, ScopeStack};
use crate::target::{Element, Expr};
use crate::types::Type;
use crate::util;

/// `Immutable[inner]`, rejecting an `inner` that is already wrapped
pub fn wrapper_type(env: &Env, inner: &Type, span: Span) -> Result<Type> {
    env.immutable(inner.clone())
        .map_err(|e| CompileError::from_type_error(e, span))
}

/// `std.NewImmutable[inner](value)`
pub fn wrap(env: &Env, value: Expr, inner: &Type, span: Span) -> Result<Expr> {
    wrapper_type(env, inner, span)?;
    Ok(Expr::call_generic(
        Expr::qualified(env.runtime(), "NewImmutable"),
        vec![inner.clone()],
        vec![value],
    ))
}

/// Wrap a value that was read out of a wrapper: `x.Get()` gives back `x`
pub fn rewrap(env: &Env, read: Expr, inner: &Type, span: Span) -> Result<Expr> {
    match read.get_receiver() {
        Some(wrapper) => {
            wrapper_type(env, inner, span)?;
            Ok(wrapper.clone())
        }
        None => wrap(env, read, inner, span),
    }
}

/// `value.Get()`
pub fn read(value: Expr) -> Expr {
    Expr::method(value, "Get", vec![])
}

/// Read of `recv.field`, unwrapped when the field is stored wrapped
pub fn read_field(env: &Env, recv: Expr, recv_ty: &Type, field: &str) -> Option<(Expr, Type)> {
    let info = env.field(recv_ty, field)?;
    let select = Expr::select(recv, field);
    let value = if info.immutable { read(select) } else { select };
    Some((value, info.ty))
}

/// Reject assignment to the binding `name`
pub fn check_assign_binding(scope: &ScopeStack, name: &str, span: Span) -> Result<()> {
    match scope.lookup_class(name) {
        Some(Mutability::Val) => Err(CompileError::immutability(
            format!("cannot assign to `{name}`: it is a value binding"),
            span,
        )),
        Some(Mutability::Var) => Ok(()),
        None => Err(CompileError::inference(
            format!("cannot assign to unknown name `{name}`"),
            span,
        )),
    }
}

/// Reject assignment to a field that is not declared `var`
pub fn check_assign_field(env: &Env, recv_ty: &Type, field: &str, span: Span) -> Result<()> {
    match env.field(recv_ty, field) {
        Some(info) if info.immutable => Err(CompileError::immutability(
            format!("cannot assign to field `{field}` of `{recv_ty}`: it is not declared var"),
            span,
        )),
        Some(_) => Ok(()),
        None => Err(unknown_field(env, recv_ty, field, span)),
    }
}

/// Error for a field `recv_ty` does not have, with a suggestion when close
pub fn unknown_field(env: &Env, recv_ty: &Type, field: &str, span: Span) -> CompileError {
    let suggestion = env.type_meta(recv_ty).and_then(|meta| {
        util::find_similar_name(
            field,
            meta.fields.iter().map(String::as_str),
            util::suggestion_threshold(field),
        )
        .map(str::to_string)
    });
    CompileError::pattern(
        format!(
            "`{recv_ty}` has no field `{field}`{}",
            util::format_suggestion_hint(suggestion.as_deref())
        ),
        span,
    )
}

/// Store `value` into field `idx` of a struct literal, wrapping `val` fields.
///
/// A `wrapper_read` value is a `Get()` on a wrapper of the field's type; the
/// wrapper itself is stored instead of a fresh one.
pub fn store_field(
    env: &Env,
    owner: &TypeMetadata,
    ty: &Type,
    idx: usize,
    value: Expr,
    wrapper_read: bool,
    span: Span,
) -> Result<Element> {
    let name = owner.fields.get(idx).cloned().ok_or_else(|| {
        CompileError::invariant(format!("`{ty}` has no field at position {idx}"), span)
    })?;
    let info = env
        .field(ty, &name)
        .ok_or_else(|| unknown_field(env, ty, &name, span))?;
    let value = match (info.immutable, wrapper_read) {
        (true, true) => rewrap(env, value, &info.ty, span)?,
        (true, false) => wrap(env, value, &info.ty, span)?,
        (false, _) => value,
    };
    Ok(Element {
        key: Some(name),
        value,
    })
}

/// Field override of a `Copy` call
#[derive(Debug, Clone)]
pub struct Override {
    pub field: String,
    pub value: Expr,
    pub wrapper_read: bool,
}

/// Struct literal copying `recv` with some fields overridden.
///
/// Overridden `val` fields are wrapped (or keep the wrapper they were read
/// from); untouched `val` fields are deep-copied with `std.Copy`; `var`
/// fields are copied by value. `recv` is read once per field, so it must be
/// a pure read.
pub fn copy_struct(
    env: &Env,
    owner: &TypeMetadata,
    recv: &Expr,
    recv_ty: &Type,
    mut overrides: Vec<Override>,
    span: Span,
) -> Result<Expr> {
    let mut elts = Vec::with_capacity(owner.fields.len());
    for (idx, name) in owner.fields.iter().enumerate() {
        match overrides.iter().position(|o| o.field == *name) {
            Some(pos) => {
                let o = overrides.swap_remove(pos);
                elts.push(store_field(env, owner, recv_ty, idx, o.value, o.wrapper_read, span)?);
            }
            None => {
                let info = env
                    .field(recv_ty, name)
                    .ok_or_else(|| unknown_field(env, recv_ty, name, span))?;
                let current = Expr::select(recv.clone(), name.as_str());
                let value = if info.immutable {
                    Expr::call_generic(
                        Expr::qualified(env.runtime(), "Copy"),
                        vec![info.ty],
                        vec![current],
                    )
                } else {
                    current
                };
                elts.push(Element {
                    key: Some(name.clone()),
                    value,
                });
            }
        }
    }
    if let Some(o) = overrides.first() {
        return Err(unknown_field(env, recv_ty, &o.field, span));
    }
    Ok(Expr::Composite {
        ty: recv_ty.clone(),
        elts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::config::LowerConfig;
    use crate::metadata::{Metadata, ProgramIndex};

    fn with_env<R>(f: impl FnOnce(&Env) -> R) -> R {
        let prog = program(vec![struct_decl(
            "Person",
            &[],
            vec![field("name", Type::string()), var_field("age", Type::int())],
        )]);
        let metadata = Metadata::with_prelude("std");
        let config = LowerConfig::default();
        let env = Env::new(ProgramIndex::build(&prog, "std").unwrap(), &metadata, &config);
        f(&env)
    }

    #[test]
    fn test_wrap_then_read_round_trips() {
        with_env(|env| {
            let wrapped = wrap(env, Expr::int(5), &Type::int(), Span::synthetic()).unwrap();
            assert_eq!(wrapped.to_string(), "std.NewImmutable[int](5)");
            let x = Expr::ident("x");
            assert_eq!(
                rewrap(env, read(x.clone()), &Type::int(), Span::synthetic()).unwrap(),
                x
            );
        });
    }

    #[test]
    fn test_double_wrap_is_invariant_violation() {
        with_env(|env| {
            let inner = Type::immutable("std", Type::int()).unwrap();
            let err = wrap(env, Expr::ident("x"), &inner, Span::synthetic()).unwrap_err();
            assert!(matches!(err, CompileError::Invariant { .. }));
        });
    }

    #[test]
    fn test_field_reads_follow_flags() {
        with_env(|env| {
            let person = Type::local("Person");
            let (name, ty) = read_field(env, Expr::ident("p"), &person, "name").unwrap();
            assert_eq!(name.to_string(), "p.name.Get()");
            assert_eq!(ty, Type::string());
            let (age, _) = read_field(env, Expr::ident("p"), &person, "age").unwrap();
            assert_eq!(age.to_string(), "p.age");
        });
    }

    #[test]
    fn test_assignment_checks() {
        with_env(|env| {
            let person = Type::local("Person");
            assert!(check_assign_field(env, &person, "age", Span::synthetic()).is_ok());
            let err = check_assign_field(env, &person, "name", Span::synthetic()).unwrap_err();
            assert!(matches!(err, CompileError::Immutability { .. }));
            let err = check_assign_field(env, &person, "nam", Span::synthetic()).unwrap_err();
            assert!(err.message().contains("did you mean `name`"));

            let mut scope = ScopeStack::new();
            scope.bind("v", Mutability::Val, Type::int());
            scope.bind("w", Mutability::Var, Type::int());
            assert!(check_assign_binding(&scope, "v", Span::synthetic()).is_err());
            assert!(check_assign_binding(&scope, "w", Span::synthetic()).is_ok());
        });
    }

    #[test]
    fn test_copy_struct_overrides() {
        with_env(|env| {
            let person = Type::local("Person");
            let owner = env.lookup_type("Person").unwrap().clone();
            let copy = copy_struct(
                env,
                &owner,
                &Expr::ident("p"),
                &person,
                vec![Override {
                    field: "name".into(),
                    value: Expr::string("Bo"),
                    wrapper_read: false,
                }],
                Span::synthetic(),
            )
            .unwrap();
            assert_eq!(
                copy.to_string(),
                "Person{name: std.NewImmutable[string](\"Bo\"), age: p.age}"
            );

            let unknown = copy_struct(
                env,
                &owner,
                &Expr::ident("p"),
                &person,
                vec![Override {
                    field: "agee".into(),
                    value: Expr::int(1),
                    wrapper_read: false,
                }],
                Span::synthetic(),
            )
            .unwrap_err();
            assert!(unknown.message().contains("did you mean `age`"));
        });
    }

    #[test]
    fn test_stored_wrapper_read_keeps_wrapper() {
        with_env(|env| {
            let person = Type::local("Person");
            let owner = env.lookup_type("Person").unwrap().clone();
            let n = Expr::ident("n");
            let reused = store_field(env, &owner, &person, 0, read(n.clone()), true, Span::synthetic()).unwrap();
            assert_eq!(reused.value, n);
            let fresh = store_field(env, &owner, &person, 0, read(n), false, Span::synthetic()).unwrap();
            assert_eq!(fresh.value.to_string(), "std.NewImmutable[string](n.Get())");
            // var fields are never wrapped
            let age = store_field(env, &owner, &person, 1, Expr::int(3), true, Span::synthetic()).unwrap();
            assert_eq!(age.value.to_string(), "3");
        });
    }
}
