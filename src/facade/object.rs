//! The dynamic object protocol behind [`crate::facade::TypeFacade`].
//!
//! Modules are inspected, never executed, so runtime behaviour is attached by binding a
//! [`ClassType`] or an [`EnumType`] to a type name. A [`ClassType`] lists fields, constructors
//! and methods; method and constructor bodies are plain closures over the receiving
//! [`Object`].
//!
//! # Examples
//!
//! ```rust
//! use modscope::facade::{ClassType, Primitive, RuntimeType, Value};
//!
//! let counter = ClassType::builder("Demo.Counter")
//!     .field("Count", RuntimeType::Primitive(Primitive::I32))
//!     .method("Add", &[("amount", RuntimeType::Primitive(Primitive::I32))], |this, args| {
//!         let count = this.get("Count").and_then(Value::as_i128).unwrap_or(0);
//!         let amount = args[0].as_i128().unwrap_or(0);
//!         this.set("Count", Value::I32((count + amount) as i32));
//!         Ok(Value::Null)
//!     })
//!     .build();
//!
//! assert_eq!(counter.name(), "Demo.Counter");
//! ```

use std::{fmt, sync::Arc};

use crate::{
    catalog::TypeDescriptor,
    facade::{primitives::Primitive, value::Value},
    Result,
};

/// Body of a method: receives the object and the converted arguments.
pub type MethodBody = Arc<dyn Fn(&mut Object, &[Value]) -> Result<Value> + Send + Sync>;

/// Body of a constructor: initialises a default-valued object from the converted arguments.
pub type ConstructorBody = Arc<dyn Fn(&mut Object, &[Value]) -> Result<()> + Send + Sync>;

/// A type as seen by the facade.
#[derive(Clone)]
pub enum RuntimeType {
    /// A well-known primitive
    Primitive(Primitive),
    /// `T?`: the inner type or null
    Nullable(Box<RuntimeType>),
    /// `T[]`
    List(Box<RuntimeType>),
    /// An enumeration with runtime members
    Enum(Arc<EnumType>),
    /// A class with runtime behaviour
    Class(Arc<ClassType>),
    /// A type declared by a catalogued module without runtime behaviour
    Declared(TypeDescriptor),
}

impl RuntimeType {
    /// Full name of the type.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            RuntimeType::Primitive(primitive) => primitive.to_string(),
            RuntimeType::Nullable(inner) => format!("{}?", inner.name()),
            RuntimeType::List(inner) => format!("{}[]", inner.name()),
            RuntimeType::Enum(enum_type) => enum_type.name().to_string(),
            RuntimeType::Class(class) => class.name().to_string(),
            RuntimeType::Declared(descriptor) => descriptor.full_name().to_string(),
        }
    }

    /// `true` if null is a valid value of this type.
    #[must_use]
    pub fn accepts_null(&self) -> bool {
        matches!(
            self,
            RuntimeType::Nullable(_)
                | RuntimeType::Class(_)
                | RuntimeType::List(_)
                | RuntimeType::Declared(_)
                | RuntimeType::Primitive(Primitive::String | Primitive::Object)
        )
    }

    /// The default value of the type: zero, `false`, the first enum member or null.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            RuntimeType::Primitive(primitive) => match primitive {
                Primitive::Bool => Value::Bool(false),
                Primitive::Char => Value::Char('\0'),
                Primitive::I8 => Value::I8(0),
                Primitive::U8 => Value::U8(0),
                Primitive::I16 => Value::I16(0),
                Primitive::U16 => Value::U16(0),
                Primitive::I32 => Value::I32(0),
                Primitive::U32 => Value::U32(0),
                Primitive::I64 => Value::I64(0),
                Primitive::U64 => Value::U64(0),
                Primitive::F32 => Value::F32(0.0),
                Primitive::F64 => Value::F64(0.0),
                Primitive::Decimal => Value::Decimal(rust_decimal::Decimal::ZERO),
                Primitive::DateTime => Value::DateTime(chrono::NaiveDateTime::default()),
                Primitive::String | Primitive::Object => Value::Null,
            },
            RuntimeType::Enum(enum_type) => Value::Enum(EnumValue::new(enum_type.clone(), 0)),
            _ => Value::Null,
        }
    }

    /// The declaration behind this type, for catalog-backed types.
    #[must_use]
    pub fn descriptor(&self) -> Option<&TypeDescriptor> {
        match self {
            RuntimeType::Declared(descriptor) => Some(descriptor),
            RuntimeType::Class(class) => class.descriptor.as_ref(),
            _ => None,
        }
    }
}

impl PartialEq for RuntimeType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuntimeType::Primitive(a), RuntimeType::Primitive(b)) => a == b,
            (RuntimeType::Nullable(a), RuntimeType::Nullable(b))
            | (RuntimeType::List(a), RuntimeType::List(b)) => a == b,
            (RuntimeType::Enum(a), RuntimeType::Enum(b)) => Arc::ptr_eq(a, b) || a.name == b.name,
            (RuntimeType::Class(a), RuntimeType::Class(b)) => Arc::ptr_eq(a, b) || a.name == b.name,
            (RuntimeType::Declared(a), RuntimeType::Declared(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeType({})", self.name())
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// An enumeration: named integral constants, optionally combinable as flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    members: Vec<(String, i64)>,
    flags: bool,
}

impl EnumType {
    /// An enumeration with `members` in declaration order.
    #[must_use]
    pub fn new(name: impl Into<String>, members: &[(&str, i64)]) -> Arc<EnumType> {
        Arc::new(EnumType {
            name: name.into(),
            members: members
                .iter()
                .map(|(member, value)| ((*member).to_string(), *value))
                .collect(),
            flags: false,
        })
    }

    /// A flags enumeration: comma-separated names combine with bitwise or.
    #[must_use]
    pub fn flags(name: impl Into<String>, members: &[(&str, i64)]) -> Arc<EnumType> {
        let mut enum_type = Arc::unwrap_or_clone(EnumType::new(name, members));
        enum_type.flags = true;
        Arc::new(enum_type)
    }

    /// Full name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in declaration order.
    #[must_use]
    pub fn members(&self) -> &[(String, i64)] {
        &self.members
    }

    /// `true` for flags enumerations.
    #[must_use]
    pub fn is_flags(&self) -> bool {
        self.flags
    }

    /// Value of the member `name`, ignoring ASCII case.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<i64> {
        let name = name.trim();
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .or_else(|| {
                self.members
                    .iter()
                    .find(|(member, _)| member.eq_ignore_ascii_case(name))
            })
            .map(|(_, value)| *value)
    }

    /// Name of the member with `value`.
    #[must_use]
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, member)| *member == value)
            .map(|(name, _)| name.as_str())
    }

    /// Parse a member name, a comma-separated list of flag names, or a number.
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<i64> {
        let text = text.trim();
        if let Ok(number) = text.parse::<i64>() {
            return Some(number);
        }
        if !self.flags || !text.contains(',') {
            return self.value_of(text);
        }

        text.split(',')
            .map(|part| self.value_of(part))
            .try_fold(0, |acc, value| value.map(|value| acc | value))
    }
}

/// A value of an [`EnumType`].
#[derive(Debug, Clone)]
pub struct EnumValue {
    enum_type: Arc<EnumType>,
    value: i64,
}

impl EnumValue {
    /// Wrap `value`; numbers without a member are allowed.
    #[must_use]
    pub fn new(enum_type: Arc<EnumType>, value: i64) -> Self {
        EnumValue { enum_type, value }
    }

    /// The enumeration.
    #[must_use]
    pub fn enum_type(&self) -> &Arc<EnumType> {
        &self.enum_type
    }

    /// Underlying integral value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Member name, `None` for undeclared values.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.enum_type.name_of(self.value)
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.enum_type.name == other.enum_type.name
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.value),
        }
    }
}

/// A named, typed slot of a [`ClassType`].
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: RuntimeType,
}

/// A named, typed parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: RuntimeType,
}

/// A method overload.
#[derive(Clone)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    pub(crate) body: MethodBody,
}

/// A constructor overload.
#[derive(Clone)]
pub struct Constructor {
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    pub(crate) body: ConstructorBody,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A class with runtime behaviour.
#[derive(Debug, Clone)]
pub struct ClassType {
    name: String,
    fields: Vec<Field>,
    methods: Vec<Method>,
    constructors: Vec<Constructor>,
    interfaces: Vec<String>,
    base: Option<Arc<ClassType>>,
    descriptor: Option<TypeDescriptor>,
}

impl ClassType {
    /// Start describing the class `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ClassTypeBuilder {
        ClassTypeBuilder {
            class: ClassType {
                name: name.into(),
                fields: Vec::new(),
                methods: Vec::new(),
                constructors: Vec::new(),
                interfaces: Vec::new(),
                base: None,
                descriptor: None,
            },
        }
    }

    /// Full name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields, base class fields first.
    #[must_use]
    pub fn fields(&self) -> Vec<&Field> {
        let mut fields = self
            .base
            .as_ref()
            .map(|base| base.fields())
            .unwrap_or_default();
        fields.extend(self.fields.iter());
        fields
    }

    /// The field `name`; an exact match wins over a case-insensitive one.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        let fields = self.fields();
        fields
            .iter()
            .find(|field| field.name == name)
            .or_else(|| fields.iter().find(|field| field.name.eq_ignore_ascii_case(name)))
            .copied()
    }

    /// Overloads named `name`, own methods before inherited ones. Exact-case matches are
    /// returned if any exist, case-insensitive matches otherwise.
    #[must_use]
    pub fn methods(&self, name: &str) -> Vec<&Method> {
        let mut all: Vec<&Method> = self.methods.iter().collect();
        let mut base = self.base.as_deref();
        while let Some(class) = base {
            all.extend(class.methods.iter());
            base = class.base.as_deref();
        }

        let exact: Vec<&Method> = all.iter().copied().filter(|m| m.name == name).collect();
        if !exact.is_empty() {
            return exact;
        }
        all.into_iter()
            .filter(|m| m.name.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Declared constructors.
    #[must_use]
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// `true` if the class is `name`, derives from it or implements it.
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name
            || self.interfaces.iter().any(|interface| interface == name)
            || self.base.as_ref().is_some_and(|base| base.is_a(name))
    }

    /// The catalogued declaration this class is bound to.
    #[must_use]
    pub fn descriptor(&self) -> Option<&TypeDescriptor> {
        self.descriptor.as_ref()
    }

    pub(crate) fn bound_to(&self, descriptor: TypeDescriptor) -> Arc<ClassType> {
        let mut class = self.clone();
        class.descriptor = Some(descriptor);
        Arc::new(class)
    }
}

/// Builder returned by [`ClassType::builder`].
#[derive(Debug)]
pub struct ClassTypeBuilder {
    class: ClassType,
}

impl ClassTypeBuilder {
    /// Add a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: RuntimeType) -> Self {
        self.class.fields.push(Field {
            name: name.into(),
            ty,
        });
        self
    }

    /// Add a method overload.
    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, parameters: &[(&str, RuntimeType)], body: F) -> Self
    where
        F: Fn(&mut Object, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.class.methods.push(Method {
            name: name.into(),
            parameters: parameters_of(parameters),
            body: Arc::new(body),
        });
        self
    }

    /// Add a constructor overload.
    #[must_use]
    pub fn constructor<F>(mut self, parameters: &[(&str, RuntimeType)], body: F) -> Self
    where
        F: Fn(&mut Object, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.class.constructors.push(Constructor {
            parameters: parameters_of(parameters),
            body: Arc::new(body),
        });
        self
    }

    /// Declare an implemented interface by full name.
    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.class.interfaces.push(interface.into());
        self
    }

    /// Set the base class.
    #[must_use]
    pub fn extends(mut self, base: Arc<ClassType>) -> Self {
        self.class.base = Some(base);
        self
    }

    /// Finish the class.
    #[must_use]
    pub fn build(self) -> Arc<ClassType> {
        Arc::new(self.class)
    }
}

fn parameters_of(parameters: &[(&str, RuntimeType)]) -> Vec<Parameter> {
    parameters
        .iter()
        .map(|(name, ty)| Parameter {
            name: (*name).to_string(),
            ty: ty.clone(),
        })
        .collect()
}

/// An instance of a [`ClassType`].
#[derive(Debug, Clone)]
pub struct Object {
    class: Arc<ClassType>,
    values: Vec<(String, Value)>,
}

impl Object {
    /// An instance with every field at its default value.
    #[must_use]
    pub fn new(class: Arc<ClassType>) -> Self {
        let values = class
            .fields()
            .into_iter()
            .map(|field| (field.name.clone(), field.ty.default_value()))
            .collect();
        Object { class, values }
    }

    /// The class of the object.
    #[must_use]
    pub fn class(&self) -> &Arc<ClassType> {
        &self.class
    }

    /// Field values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Value of the field `name` (exact case).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Store `value` in the field `name` (exact case) without conversion. Returns `false`
    /// if there is no such field.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.values.iter_mut().find(|(field, _)| field == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
