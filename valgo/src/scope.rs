//! Scope tracker for lowering
//!
//! A stack of lexical frames. Each frame records, per binding name, the
//! binding's mutability class and its declared type. Lookups walk from the
//! innermost frame outwards and stop at the first hit, so inner bindings
//! shadow outer ones.
//!
//! Frames are pushed and popped in strict stack order. Prefer
//! [`ScopeStack::scoped`], which pops the frame it pushed on every exit path
//! of the closure, including `?` early returns.

use std::collections::HashMap;

use crate::types::Type;

/// Mutability class of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Read-only after initialization (`val`, parameters, pattern bindings)
    Val,
    /// Reassignable (`var`)
    Var,
}

#[derive(Debug, Default)]
struct Frame {
    mutability: HashMap<String, Mutability>,
    types: HashMap<String, Type>,
}

/// Stack-based scope chain
#[derive(Debug)]
pub struct ScopeStack {
    /// Index 0 is the package frame
    frames: Vec<Frame>,
}

impl ScopeStack {
    /// Create a scope stack holding only the package frame
    pub fn new() -> Self {
        ScopeStack {
            frames: vec![Frame::default()],
        }
    }

    /// Push a new innermost frame; returns the new depth
    pub fn push(&mut self) -> usize {
        self.frames.push(Frame::default());
        self.frames.len()
    }

    /// Pop the innermost frame. The package frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Run `f` inside a fresh frame, popping it whatever `f` returns
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let depth = self.push();
        let out = f(self);
        debug_assert_eq!(self.frames.len(), depth, "unbalanced scope frames");
        self.pop();
        out
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bind `name` in the innermost frame, overwriting a binding of the same frame
    pub fn bind(&mut self, name: impl Into<String>, class: Mutability, ty: Type) {
        let name = name.into();
        if let Some(frame) = self.frames.last_mut() {
            frame.mutability.insert(name.clone(), class);
            frame.types.insert(name, ty);
        }
    }

    /// Declared type of `name`, or `Type::Nil` when unbound
    pub fn lookup_type(&self, name: &str) -> Type {
        for frame in self.frames.iter().rev() {
            if let Some(ty) = frame.types.get(name) {
                return ty.clone();
            }
        }
        Type::Nil
    }

    /// Mutability class of `name`, if bound
    pub fn lookup_class(&self, name: &str) -> Option<Mutability> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.mutability.get(name).copied())
    }

    /// True when `name` is bound as a value binding
    pub fn lookup_mutability(&self, name: &str) -> bool {
        self.lookup_class(name) == Some(Mutability::Val)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup_class(name).is_some()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_is_nil() {
        let scope = ScopeStack::new();
        assert!(scope.lookup_type("x").is_nil());
        assert!(!scope.lookup_mutability("x"));
        assert_eq!(scope.lookup_class("x"), None);
    }

    #[test]
    fn test_bind_and_lookup() {
        let mut scope = ScopeStack::new();
        scope.bind("x", Mutability::Val, Type::int());
        scope.bind("y", Mutability::Var, Type::string());
        assert_eq!(scope.lookup_type("x"), Type::int());
        assert!(scope.lookup_mutability("x"));
        assert!(!scope.lookup_mutability("y"));
    }

    #[test]
    fn test_rebind_in_same_frame_overwrites() {
        let mut scope = ScopeStack::new();
        scope.bind("x", Mutability::Val, Type::int());
        scope.bind("x", Mutability::Var, Type::string());
        assert_eq!(scope.lookup_type("x"), Type::string());
        assert_eq!(scope.lookup_class("x"), Some(Mutability::Var));
    }

    #[test]
    fn test_inner_frame_shadows_outer() {
        let mut scope = ScopeStack::new();
        scope.bind("x", Mutability::Var, Type::int());
        scope.push();
        scope.bind("x", Mutability::Val, Type::string());
        assert_eq!(scope.lookup_type("x"), Type::string());
        scope.pop();
        assert_eq!(scope.lookup_type("x"), Type::int());
        assert_eq!(scope.lookup_class("x"), Some(Mutability::Var));
    }

    #[test]
    fn test_scoped_pops_on_error() {
        let mut scope = ScopeStack::new();
        let result: Result<(), &str> = scope.scoped(|s| {
            s.bind("tmp", Mutability::Val, Type::int());
            Err::<(), _>("early exit")?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(scope.depth(), 1);
        assert!(!scope.contains("tmp"));
    }

    #[test]
    fn test_package_frame_never_popped() {
        let mut scope = ScopeStack::new();
        scope.bind("global", Mutability::Val, Type::int());
        scope.pop();
        scope.pop();
        assert_eq!(scope.depth(), 1);
        assert!(scope.contains("global"));
    }
}
