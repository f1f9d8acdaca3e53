use std::fmt;

/// Static type of a CEL expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    // Primitives.
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    Null,

    // Well-known types.
    Timestamp,
    Duration,

    // Collections.
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),

    /// `optional_type(T)`, available when optional types are enabled.
    Optional(Box<Type>),

    /// Type of a type value, e.g. `type(1)` has type `type(int)`.
    Type(Box<Type>),

    /// Dynamic type, assignable to and from anything.
    Dyn,

    /// Result of an expression that failed to check.
    Error,
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: Type) -> Self {
        Type::Optional(Box::new(inner))
    }

    pub fn type_of(inner: Type) -> Self {
        Type::Type(Box::new(inner))
    }

    /// Built-in type denoted by a bare identifier such as `int` or `list`.
    pub fn from_name(name: &str) -> Option<Type> {
        let ty = match name {
            "bool" => Type::Bool,
            "int" => Type::Int,
            "uint" => Type::Uint,
            "double" => Type::Double,
            "string" => Type::String,
            "bytes" => Type::Bytes,
            "null_type" => Type::Null,
            "list" => Type::list(Type::Dyn),
            "map" => Type::map(Type::Dyn, Type::Dyn),
            "type" => Type::type_of(Type::Dyn),
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, Type::Dyn)
    }

    /// Dynamic or erroneous types match any signature.
    pub fn is_dyn_or_error(&self) -> bool {
        matches!(self, Type::Dyn | Type::Error)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Uint | Type::Double)
    }

    /// Types usable as map keys.
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Int | Type::Uint | Type::String | Type::Dyn | Type::Error
        )
    }

    pub fn list_elem(&self) -> Option<&Type> {
        match self {
            Type::List(elem) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Uint => write!(f, "uint"),
            Type::Double => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Bytes => write!(f, "bytes"),
            Type::Null => write!(f, "null_type"),
            Type::Timestamp => write!(f, "google.protobuf.Timestamp"),
            Type::Duration => write!(f, "google.protobuf.Duration"),
            Type::List(elem) => write!(f, "list({})", elem),
            Type::Map(key, value) => write!(f, "map({}, {})", key, value),
            Type::Optional(inner) => write!(f, "optional_type({})", inner),
            Type::Type(inner) => write!(f, "type({})", inner),
            Type::Dyn => write!(f, "dyn"),
            Type::Error => write!(f, "*error*"),
        }
    }
}
