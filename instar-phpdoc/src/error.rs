use core::fmt;

/// Hard failures while parsing a phpdoc type.
///
/// Distinct from a plain no-match: [`crate::parse`] returns `Ok(None)`
/// when the input simply does not start with a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeParseError {
    /// `static` or `object` used as a type.
    ForbiddenKeyword,
    /// The resolved class name is not registered.
    UnknownClass {
        /// The fully-qualified name as resolved.
        name: String,
    },
    /// An alternative inside `tuple(...)` did not parse.
    TupleSyntax,
    /// `,` or `)` missing after a tuple member.
    ExpectedCommaOrParen,
    /// `)` missing after a parenthesized type.
    UnclosedParen,
    /// `|` with nothing parseable on the right.
    EmptyUnion,
}

impl fmt::Display for TypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeParseError::ForbiddenKeyword => {
                write!(f, "static|object are forbidden in phpdoc")
            }
            TypeParseError::UnknownClass { name } => {
                write!(f, "Can't find class: {name}")
            }
            TypeParseError::TupleSyntax => {
                write!(f, "something went wrong in parsing tuple phpdoc")
            }
            TypeParseError::ExpectedCommaOrParen => {
                write!(f, "phpdoc parsing error `,` or `)` expected")
            }
            TypeParseError::UnclosedParen => {
                write!(f, "phpdoc parsing error `)` expected")
            }
            TypeParseError::EmptyUnion => {
                write!(f, "phpdoc parsing error: type expected after `|`")
            }
        }
    }
}

impl std::error::Error for TypeParseError {}
