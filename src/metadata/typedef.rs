//! The type model shared by the catalog and the plugin resolver.
//!
//! A [`TypeDef`] is one type declared by a module. Its base type and implemented interfaces are
//! [`TypeReference`]s, which either point at another declaration of the same module
//! ([`TypeTarget::Local`]) or name a type in another assembly ([`TypeTarget::External`]); the
//! catalog resolves the latter by assembly name when it walks inheritance chains.

use std::fmt;

use bitflags::bitflags;

use crate::metadata::token::Token;

bitflags! {
    /// `TypeAttributes` (ECMA-335 II.23.1.15), the bits the crate interprets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeAttributes: u32 {
        /// Visibility mask
        const VISIBILITY_MASK = 0x0000_0007;
        /// Top-level public type
        const PUBLIC = 0x0000_0001;
        /// Nested public type
        const NESTED_PUBLIC = 0x0000_0002;
        /// The type is an interface
        const INTERFACE = 0x0000_0020;
        /// The type is abstract
        const ABSTRACT = 0x0000_0080;
        /// The type can not be derived from
        const SEALED = 0x0000_0100;
    }
}

/// Where an external type lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeScope {
    /// Another assembly, by simple name
    Assembly(String),
    /// The referencing module itself (or another module of the same assembly)
    CurrentModule,
}

/// A type named by a module but not declared in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalType {
    /// Where to look the type up
    pub scope: TypeScope,
    /// Namespace of the outermost type
    pub namespace: String,
    /// Type names from the outermost enclosing type down to the type itself
    pub path: Vec<String>,
}

impl ExternalType {
    /// Full name in `Namespace.Outer+Inner` form.
    #[must_use]
    pub fn full_name(&self) -> String {
        full_name(&self.namespace, &self.path)
    }
}

/// What a [`TypeReference`] points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTarget {
    /// A `TypeDef` of the same module
    Local(Token),
    /// A type of another assembly
    External(ExternalType),
}

/// A reference from one type to another (base type or interface).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeReference {
    /// The referenced type, for generic instantiations the generic definition
    pub target: TypeTarget,
    /// `true` if the reference is a closed instantiation of `target`
    pub generic_instance: bool,
}

impl TypeReference {
    /// A plain reference to a local type.
    #[must_use]
    pub fn local(token: Token) -> Self {
        TypeReference {
            target: TypeTarget::Local(token),
            generic_instance: false,
        }
    }

    /// A plain reference to an external type.
    #[must_use]
    pub fn external(external: ExternalType) -> Self {
        TypeReference {
            target: TypeTarget::External(external),
            generic_instance: false,
        }
    }

    /// The external type this reference names, `None` for local references.
    #[must_use]
    pub fn as_external(&self) -> Option<&ExternalType> {
        match &self.target {
            TypeTarget::External(external) => Some(external),
            TypeTarget::Local(_) => None,
        }
    }
}

/// One type declared by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// `TypeDef` token
    pub token: Token,
    /// Namespace; nested types carry the namespace of their outermost type
    pub namespace: String,
    /// Simple name, including any generic arity suffix such as `` `1 ``
    pub name: String,
    /// Full name in `Namespace.Outer+Inner` form
    pub full_name: String,
    /// Type attributes
    pub flags: TypeAttributes,
    /// Base type
    pub extends: Option<TypeReference>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeReference>,
    /// Names of the generic parameters, empty for non-generic types
    pub generic_params: Vec<String>,
    /// Enclosing type of a nested type
    pub enclosing: Option<Token>,
    /// Directly nested types
    pub nested: Vec<Token>,
}

impl TypeDef {
    /// `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// `true` for abstract types (interfaces included).
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeAttributes::ABSTRACT)
    }

    /// `true` for open generic type definitions.
    #[must_use]
    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// `true` if instances of this type can exist: not an interface, not abstract and not an
    /// open generic definition.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        !self.is_interface() && !self.is_abstract() && !self.is_generic_definition()
    }

    /// `true` for nested types.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing.is_some()
    }

    /// `true` if the type is visible outside its module.
    #[must_use]
    pub fn is_public(&self) -> bool {
        let visibility = self.flags & TypeAttributes::VISIBILITY_MASK;
        visibility == TypeAttributes::PUBLIC || visibility == TypeAttributes::NESTED_PUBLIC
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Join a namespace and a nesting path into `Namespace.Outer+Inner`.
#[must_use]
pub fn full_name(namespace: &str, path: &[String]) -> String {
    let nested = path.join("+");
    if namespace.is_empty() {
        nested
    } else {
        format!("{}.{}", namespace, nested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_def(flags: TypeAttributes, generic_params: &[&str]) -> TypeDef {
        TypeDef {
            token: Token::new(0x0200_0002),
            namespace: "Plugins".to_string(),
            name: "Worker".to_string(),
            full_name: "Plugins.Worker".to_string(),
            flags,
            extends: None,
            interfaces: Vec::new(),
            generic_params: generic_params.iter().map(|p| p.to_string()).collect(),
            enclosing: None,
            nested: Vec::new(),
        }
    }

    #[test]
    fn concreteness() {
        assert!(type_def(TypeAttributes::PUBLIC, &[]).is_concrete());
        assert!(!type_def(TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT, &[]).is_concrete());
        assert!(!type_def(
            TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
            &[]
        )
        .is_concrete());
        assert!(!type_def(TypeAttributes::PUBLIC, &["T"]).is_concrete());
    }

    #[test]
    fn visibility() {
        assert!(type_def(TypeAttributes::PUBLIC, &[]).is_public());
        assert!(type_def(TypeAttributes::NESTED_PUBLIC, &[]).is_public());
        assert!(!type_def(TypeAttributes::empty(), &[]).is_public());
    }

    #[test]
    fn names() {
        assert_eq!(
            full_name("Plugins", &["Outer".to_string(), "Inner".to_string()]),
            "Plugins.Outer+Inner"
        );
        assert_eq!(full_name("", &["Global".to_string()]), "Global");

        let external = ExternalType {
            scope: TypeScope::Assembly("Core".to_string()),
            namespace: "Core.Contracts".to_string(),
            path: vec!["IPlugin".to_string()],
        };
        assert_eq!(external.full_name(), "Core.Contracts.IPlugin");
    }
}
