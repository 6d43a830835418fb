use core::fmt;

/// A primitive type keyword.
///
/// `integer` and `NULL` spellings collapse onto [`Primitive::Int`] and
/// [`Primitive::Null`]. `Mixed` and `Any` stay distinct: `mixed` still
/// rejects class instances, `any` accepts everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// `int`
    Int,
    /// `float` (accepts ints too)
    Float,
    /// `string`
    Str,
    /// `bool`
    Bool,
    /// the `false` literal type
    False,
    /// the `true` literal type
    True,
    /// `null`
    Null,
    /// `mixed`: any scalar, or an array of such
    Mixed,
    /// `any`: no check at all
    Any,
}

impl Primitive {
    /// The canonical keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Str => "string",
            Primitive::Bool => "bool",
            Primitive::False => "false",
            Primitive::True => "true",
            Primitive::Null => "null",
            Primitive::Mixed => "mixed",
            Primitive::Any => "any",
        }
    }

    /// Whether a null value satisfies this primitive on its own.
    pub fn is_null_allowed(&self) -> bool {
        matches!(
            self,
            Primitive::Null | Primitive::Mixed | Primitive::Any
        )
    }
}

/// A parsed phpdoc type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A primitive keyword.
    Primitive(Primitive),
    /// A class, stored as the resolved fully-qualified name.
    Instance(String),
    /// `T[]`, or the bare `array` keyword (then `any[]`).
    Array(Box<TypeExpr>),
    /// `tuple(T1, T2, ..)`.
    Tuple(Vec<TypeExpr>),
    /// `A|B`. The left branch is tried first everywhere.
    Or(Box<TypeExpr>, Box<TypeExpr>),
}

impl TypeExpr {
    /// Whether null satisfies this type. `A` alone does not allow null,
    /// only `?A` (which is `null|A`) does.
    pub fn is_null_allowed(&self) -> bool {
        match self {
            TypeExpr::Primitive(p) => p.is_null_allowed(),
            TypeExpr::Instance(_) | TypeExpr::Array(_) | TypeExpr::Tuple(_) => false,
            TypeExpr::Or(a, b) => a.is_null_allowed() || b.is_null_allowed(),
        }
    }

    /// Whether a class type occurs anywhere inside.
    pub fn has_instance_inside(&self) -> bool {
        match self {
            TypeExpr::Primitive(_) => false,
            TypeExpr::Instance(_) => true,
            TypeExpr::Array(inner) => inner.has_instance_inside(),
            TypeExpr::Tuple(items) => items.iter().any(TypeExpr::has_instance_inside),
            TypeExpr::Or(a, b) => a.has_instance_inside() || b.has_instance_inside(),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(p) => write!(f, "{}", p.keyword()),
            TypeExpr::Instance(name) => write!(f, "{name}"),
            TypeExpr::Array(inner) => match inner.as_ref() {
                TypeExpr::Or(..) => write!(f, "({inner})[]"),
                _ => write!(f, "{inner}[]"),
            },
            TypeExpr::Tuple(items) => {
                write!(f, "tuple(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            TypeExpr::Or(a, b) => write!(f, "{a}|{b}"),
        }
    }
}
