//! A capability-set API over types, objects and values.
//!
//! [`TypeFacade`] is what callers consume: resolving types by name, finding implementations
//! of a capability, constructing instances, reading and writing members, invoking methods
//! and converting values. Where types come from is decided by the injected
//! [`TypeProvider`], so a catalog-backed provider and a static registry are interchangeable.
//!
//! # Failure semantics
//!
//! - unknown types, members and methods fail with [`crate::Error::TypeNotFound`],
//!   [`crate::Error::MemberNotFound`] and [`crate::Error::MethodNotFound`]
//! - errors raised by a method body propagate unchanged
//! - construction failures are wrapped in [`crate::Error::Construction`], naming the type and
//!   the arguments and keeping the cause as the error source
//!
//! # Examples
//!
//! ```rust
//! use modscope::facade::{
//!     Arguments, ClassType, Primitive, RegistryProvider, RuntimeType, TypeFacade, Value,
//! };
//! use std::sync::Arc;
//!
//! let registry = RegistryProvider::new();
//! registry.register_class(
//!     ClassType::builder("Demo.Greeter")
//!         .field("Name", RuntimeType::Primitive(Primitive::String))
//!         .method("Greet", &[], |this, _| {
//!             Ok(Value::from(format!("Hello, {}", this.get("Name").cloned().unwrap_or(Value::Null))))
//!         })
//!         .build(),
//! );
//! let facade = TypeFacade::new(Arc::new(registry));
//!
//! let ty = facade.resolve_type("Demo.Greeter", false)?;
//! let greeter = facade.create_instance(&ty, &[])?;
//! facade.set_member(&greeter, "name", Value::from("world"))?;
//! let greeting = facade.invoke(&greeter, "Greet", Arguments::Positional(vec![]))?;
//! assert_eq!(greeting, Value::from("Hello, world"));
//! # Ok::<(), modscope::Error>(())
//! ```

mod convert;
mod object;
mod primitives;
mod provider;
mod value;

pub use convert::{can_convert, change_type};
pub use object::{
    ClassType, ClassTypeBuilder, Constructor, ConstructorBody, EnumType, EnumValue, Field, Method,
    MethodBody, Object, Parameter, RuntimeType,
};
pub use primitives::Primitive;
pub use provider::{CatalogProvider, RegistryProvider, TypeProvider};
pub use value::{ObjectRef, Value};

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, trace};

use crate::{catalog::ModuleCatalog, resolver::FindOptions, Error, Result};

/// Nesting depth at which [`TypeFacade::to_dictionary`] gives up.
const MAX_DICTIONARY_DEPTH: usize = 32;

/// Name under which constructors are reported in lookup failures.
const CONSTRUCTOR_NAME: &str = ".ctor";

/// Arguments of an invocation.
#[derive(Debug, Clone)]
pub enum Arguments {
    /// Bound by position
    Positional(Vec<Value>),
    /// Bound by parameter name, ignoring ASCII case when no exact name matches
    Named(BTreeMap<String, Value>),
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Arguments::Positional(values)
    }
}

/// The capability-set API over an injected [`TypeProvider`].
#[derive(Clone)]
pub struct TypeFacade {
    provider: Arc<dyn TypeProvider>,
}

impl TypeFacade {
    /// A facade over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn TypeProvider>) -> Self {
        TypeFacade { provider }
    }

    /// A facade over a [`CatalogProvider`] for `catalog`.
    #[must_use]
    pub fn from_catalog(catalog: Arc<ModuleCatalog>) -> Self {
        TypeFacade::new(Arc::new(CatalogProvider::new(catalog)))
    }

    /// The provider types come from.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn TypeProvider> {
        &self.provider
    }

    /// Resolve a type name. `T?` is nullable, `T[]` a list; primitive aliases such as `int`
    /// or `System.Int32` are answered without consulting the provider.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if the provider does not know the name.
    pub fn resolve_type(&self, name: &str, allow_unloaded: bool) -> Result<RuntimeType> {
        let name = name.trim();
        if let Some(inner) = name.strip_suffix('?') {
            return Ok(RuntimeType::Nullable(Box::new(self.resolve_type(inner, allow_unloaded)?)));
        }
        if let Some(inner) = name.strip_suffix("[]") {
            return Ok(RuntimeType::List(Box::new(self.resolve_type(inner, allow_unloaded)?)));
        }
        if let Some(primitive) = Primitive::from_alias(name) {
            return Ok(RuntimeType::Primitive(primitive));
        }

        self.provider.resolve(name, allow_unloaded)
    }

    /// Concrete implementations of the capability named `capability`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if the capability is unknown.
    pub fn implementations(&self, capability: &str, options: FindOptions) -> Result<Vec<RuntimeType>> {
        self.provider.implementations(capability, options)
    }

    /// Create an instance of `ty`.
    ///
    /// Classes pick the first constructor whose parameter count matches and whose parameters
    /// accept the converted arguments; a class without constructors accepts no arguments.
    /// Other types produce their default value, or convert a single argument.
    ///
    /// # Errors
    /// Returns [`crate::Error::Construction`] wrapping the cause.
    pub fn create_instance(&self, ty: &RuntimeType, arguments: &[Value]) -> Result<Value> {
        construct(ty, arguments).map_err(|source| {
            debug!(type_name = %ty, %source, "construction failed");
            Error::Construction {
                type_name: ty.name(),
                arguments: render(arguments),
                source: Box::new(source),
            }
        })
    }

    /// Read the member `name` of an object (or the entry of a dictionary). An exact-case
    /// match wins; otherwise case is ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotFound`] if there is no such member.
    pub fn get_member(&self, target: &Value, name: &str) -> Result<Value> {
        let found = match target {
            Value::Object(object) => {
                let object = read_lock!(object);
                object
                    .class()
                    .field(name)
                    .and_then(|field| object.get(&field.name).cloned())
            }
            Value::Map(entries) => entries.get(name).cloned().or_else(|| {
                entries
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value.clone())
            }),
            _ => None,
        };

        found.ok_or_else(|| member_not_found(target, name))
    }

    /// Write the member `name` of an object, converting `value` to the member type.
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotFound`] if there is no such member and
    /// [`crate::Error::TypeConversion`] if the value does not fit.
    pub fn set_member(&self, target: &Value, name: &str, value: Value) -> Result<()> {
        let Value::Object(object) = target else {
            return Err(member_not_found(target, name));
        };

        let class = read_lock!(object).class().clone();
        let field = class
            .field(name)
            .ok_or_else(|| member_not_found(target, name))?;
        let converted = change_type(&value, &field.ty)?;
        write_lock!(object).set(&field.name, converted);
        Ok(())
    }

    /// Invoke the method `name` on an object.
    ///
    /// Overloads are narrowed by name (exact case first), then by parameter count, then by
    /// whether every argument converts to its parameter type; the first remaining overload
    /// runs.
    ///
    /// # Errors
    /// Returns [`crate::Error::MethodNotFound`] if no overload accepts the arguments. Errors
    /// of the method body are returned unchanged.
    pub fn invoke(&self, target: &Value, name: &str, arguments: Arguments) -> Result<Value> {
        let Value::Object(object) = target else {
            return Err(method_not_found(target.type_name(), name));
        };

        let class = read_lock!(object).class().clone();
        let overloads = class.methods(name);
        let selected = match &arguments {
            Arguments::Positional(values) => select(
                overloads
                    .iter()
                    .map(|method| (method.parameters.as_slice(), *method)),
                values,
            ),
            Arguments::Named(values) => overloads.iter().find_map(|method| {
                let ordered = bind_named(&method.parameters, values)?;
                let converted = convert_all(&method.parameters, &ordered)?;
                Some((*method, converted))
            }),
        };

        let Some((method, converted)) = selected else {
            return Err(method_not_found(class.name().to_string(), name));
        };
        trace!(class = class.name(), method = method.name.as_str(), "invoking");

        let body = method.body.clone();
        let mut receiver = write_lock!(object);
        body(&mut receiver, &converted)
    }

    /// Copy members by convention: every member of `source` (an object or a dictionary)
    /// whose name matches a field of `target`, ignoring case, and whose value converts to the
    /// field type is written. Returns the number of members copied.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeConversion`] if `target` is not an object or `source` is
    /// neither an object nor a dictionary.
    pub fn copy_members(&self, source: &Value, target: &Value) -> Result<usize> {
        let Value::Object(object) = target else {
            return Err(not_convertible(target, "object"));
        };
        let entries = self.to_dictionary(source)?;

        let class = read_lock!(object).class().clone();
        let mut receiver = write_lock!(object);
        let mut copied = 0;
        for (key, value) in &entries {
            let Some(field) = class.field(key) else {
                continue;
            };
            match change_type(value, &field.ty) {
                Ok(converted) => {
                    receiver.set(&field.name, converted);
                    copied += 1;
                }
                Err(error) => trace!(member = key.as_str(), %error, "member not copied"),
            }
        }
        Ok(copied)
    }

    /// Convert `value` to `target`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeConversion`] if the conversion is not possible.
    pub fn change_type(&self, value: &Value, target: &RuntimeType) -> Result<Value> {
        change_type(value, target)
    }

    /// Field names and values of an object, nested objects converted as well. Dictionaries
    /// are returned as they are.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeConversion`] for other values and
    /// [`crate::Error::RecursionLimit`] for object graphs nested too deeply.
    pub fn to_dictionary(&self, value: &Value) -> Result<BTreeMap<String, Value>> {
        match dictionary_value(value, 0)? {
            Value::Map(entries) => Ok(entries),
            _ => Err(not_convertible(value, "dictionary")),
        }
    }

    /// Write dictionary entries into the matching fields of an object. Returns the number of
    /// fields written.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeConversion`] if `target` is not an object or a value does
    /// not fit its field.
    pub fn populate(&self, target: &Value, values: &BTreeMap<String, Value>) -> Result<usize> {
        let Value::Object(object) = target else {
            return Err(not_convertible(target, "object"));
        };
        convert::populate(&mut write_lock!(object), values)
    }
}

impl std::fmt::Debug for TypeFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeFacade").finish_non_exhaustive()
    }
}

fn construct(ty: &RuntimeType, arguments: &[Value]) -> Result<Value> {
    match ty {
        RuntimeType::Class(class) => {
            let mut object = Object::new(class.clone());
            if class.constructors().is_empty() {
                if !arguments.is_empty() {
                    return Err(method_not_found(class.name().to_string(), CONSTRUCTOR_NAME));
                }
                return Ok(Value::object(object));
            }

            let (constructor, converted) = select(
                class
                    .constructors()
                    .iter()
                    .map(|constructor| (constructor.parameters.as_slice(), constructor)),
                arguments,
            )
            .ok_or_else(|| method_not_found(class.name().to_string(), CONSTRUCTOR_NAME))?;

            (constructor.body)(&mut object, &converted)?;
            Ok(Value::object(object))
        }
        RuntimeType::Declared(_) => Err(Error::NotSupported),
        RuntimeType::List(_) if arguments.is_empty() => Ok(Value::List(Vec::new())),
        _ => match arguments {
            [] => Ok(ty.default_value()),
            [value] => change_type(value, ty),
            _ => Err(method_not_found(ty.name(), CONSTRUCTOR_NAME)),
        },
    }
}

/// The first candidate whose parameter list accepts `arguments` after conversion.
fn select<'a, T>(
    candidates: impl Iterator<Item = (&'a [Parameter], T)>,
    arguments: &[Value],
) -> Option<(T, Vec<Value>)> {
    candidates
        .filter(|(parameters, _)| parameters.len() == arguments.len())
        .find_map(|(parameters, candidate)| {
            convert_all(parameters, arguments).map(|converted| (candidate, converted))
        })
}

fn convert_all(parameters: &[Parameter], arguments: &[Value]) -> Option<Vec<Value>> {
    parameters
        .iter()
        .zip(arguments)
        .map(|(parameter, argument)| change_type(argument, &parameter.ty).ok())
        .collect()
}

/// Order named arguments by parameter; every parameter must be given and no name may be
/// left over.
fn bind_named(parameters: &[Parameter], values: &BTreeMap<String, Value>) -> Option<Vec<Value>> {
    if parameters.len() != values.len() {
        return None;
    }

    parameters
        .iter()
        .map(|parameter| {
            values.get(&parameter.name).cloned().or_else(|| {
                values
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&parameter.name))
                    .map(|(_, value)| value.clone())
            })
        })
        .collect()
}

fn dictionary_value(value: &Value, depth: usize) -> Result<Value> {
    if depth > MAX_DICTIONARY_DEPTH {
        return Err(Error::RecursionLimit(MAX_DICTIONARY_DEPTH));
    }

    match value {
        Value::Object(object) => {
            let object = read_lock!(object);
            let mut entries = BTreeMap::new();
            for (name, field) in object.values() {
                entries.insert(name.to_string(), dictionary_value(field, depth + 1)?);
            }
            Ok(Value::Map(entries))
        }
        Value::List(items) => items
            .iter()
            .map(|item| dictionary_value(item, depth + 1))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        other => Ok(other.clone()),
    }
}

fn render(arguments: &[Value]) -> String {
    arguments
        .iter()
        .map(|argument| match argument {
            Value::String(text) => format!("\"{}\"", text),
            Value::Null => "null".to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn member_not_found(target: &Value, member: &str) -> Error {
    Error::MemberNotFound {
        type_name: target.type_name(),
        member: member.to_string(),
    }
}

fn method_not_found(type_name: String, method: &str) -> Error {
    Error::MethodNotFound {
        type_name,
        method: method.to_string(),
    }
}

fn not_convertible(value: &Value, target: &str) -> Error {
    Error::TypeConversion {
        value: value.to_string(),
        target: target.to_string(),
    }
}
