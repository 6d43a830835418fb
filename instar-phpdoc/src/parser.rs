use instar_core::ClassRegistry;

use crate::{Primitive, TypeExpr, TypeParseError, UseResolver};

/// Keyword table in match order. `int` sits before `integer`, so the
/// longer spelling parses as `int` plus leftover input, exactly like the
/// historical behavior callers rely on (trailing junk after a type is
/// ignored).
const PRIMITIVES: &[(&str, Primitive)] = &[
    ("int", Primitive::Int),
    ("integer", Primitive::Int),
    ("float", Primitive::Float),
    ("string", Primitive::Str),
    ("boolean", Primitive::Bool),
    ("bool", Primitive::Bool),
    ("false", Primitive::False),
    ("true", Primitive::True),
    ("null", Primitive::Null),
    ("NULL", Primitive::Null),
    ("mixed", Primitive::Mixed),
    ("any", Primitive::Any),
];

/// Parses a type from the front of `s`, advancing the cursor past what
/// was consumed and any surrounding whitespace.
///
/// `Ok(None)` means the input does not start with a type at all; callers
/// report that as an unusable `@var`. `Err` is a malformed or forbidden
/// type. Trailing text is left in `s` and is the caller's business.
pub fn parse(s: &mut &str, resolver: &UseResolver) -> Result<Option<TypeExpr>, TypeParseError> {
    *s = s.trim_start();
    let res = parse_impl(s, resolver)?;
    *s = s.trim_start();
    Ok(res)
}

fn parse_impl(s: &mut &str, resolver: &UseResolver) -> Result<Option<TypeExpr>, TypeParseError> {
    // a leading `?` is stripped once and desugars at the end to `null|T`
    // over everything parsed here, so `?A|B` reads as `?(A|B)`
    let nullable = strip(s, "?");

    let base = match parse_instance(s, resolver)? {
        Some(t) => Some(t),
        None => match parse_primitive(s) {
            Some(t) => Some(t),
            None => match parse_tuple(s, resolver)? {
                Some(t) => Some(t),
                None => parse_paren_or_array(s, resolver)?,
            },
        },
    };
    let Some(mut res) = base else {
        return Ok(None);
    };

    // no whitespace allowed between a type and its `[]` suffixes
    while strip(s, "[]") {
        res = TypeExpr::Array(Box::new(res));
    }

    *s = s.trim_start();
    if strip(s, "|") {
        match parse(s, resolver)? {
            Some(rhs) => res = TypeExpr::Or(Box::new(res), Box::new(rhs)),
            None => return Err(TypeParseError::EmptyUnion),
        }
    }

    if nullable {
        res = TypeExpr::Or(
            Box::new(TypeExpr::Primitive(Primitive::Null)),
            Box::new(res),
        );
    }
    Ok(Some(res))
}

fn parse_primitive(s: &mut &str) -> Option<TypeExpr> {
    for (keyword, prim) in PRIMITIVES {
        if strip(s, keyword) {
            return Some(TypeExpr::Primitive(*prim));
        }
    }
    None
}

/// `"\"? [A-Z][a-zA-Z0-9_\x80-\xff\]*`, or the words `self`, `static`,
/// `object`. The latter two are recognized and rejected.
fn parse_instance(
    s: &mut &str,
    resolver: &UseResolver,
) -> Result<Option<TypeExpr>, TypeParseError> {
    let rest = *s;
    let b = rest.as_bytes();

    let mut idx = 0usize;
    if b.first() == Some(&b'\\') {
        idx = 1;
    }
    let relative_len = if idx < b.len() && b[idx].is_ascii_uppercase() {
        idx += 1;
        while idx < b.len()
            && (b[idx].is_ascii_alphanumeric()
                || b[idx] == b'_'
                || b[idx] == b'\\'
                || b[idx] >= 0x80)
        {
            idx += 1;
        }
        idx
    } else if rest.starts_with("self") {
        4
    } else if rest.starts_with("static") || rest.starts_with("object") {
        6
    } else {
        return Ok(None);
    };

    let relative = &rest[..relative_len];
    *s = &rest[relative_len..];

    if relative == "static" || relative == "object" {
        return Err(TypeParseError::ForbiddenKeyword);
    }

    let fqn = resolver.resolve(relative);
    if !ClassRegistry::global().contains(&fqn) {
        return Err(TypeParseError::UnknownClass { name: fqn });
    }
    Ok(Some(TypeExpr::Instance(fqn)))
}

fn parse_tuple(s: &mut &str, resolver: &UseResolver) -> Result<Option<TypeExpr>, TypeParseError> {
    if !strip(s, "\\tuple(") && !strip(s, "tuple(") {
        return Ok(None);
    }
    let mut items = Vec::new();
    loop {
        match parse(s, resolver)? {
            Some(t) => items.push(t),
            None => return Err(TypeParseError::TupleSyntax),
        }
        if strip(s, ",") {
            continue;
        }
        if strip(s, ")") {
            break;
        }
        return Err(TypeParseError::ExpectedCommaOrParen);
    }
    Ok(Some(TypeExpr::Tuple(items)))
}

fn parse_paren_or_array(
    s: &mut &str,
    resolver: &UseResolver,
) -> Result<Option<TypeExpr>, TypeParseError> {
    if strip(s, "(") {
        let Some(inner) = parse(s, resolver)? else {
            return Err(TypeParseError::UnclosedParen);
        };
        if !strip(s, ")") {
            return Err(TypeParseError::UnclosedParen);
        }
        *s = s.trim_start();
        return Ok(Some(inner));
    }
    if strip(s, "array") {
        return Ok(Some(TypeExpr::Array(Box::new(TypeExpr::Primitive(
            Primitive::Any,
        )))));
    }
    Ok(None)
}

fn strip(s: &mut &str, prefix: &str) -> bool {
    match s.strip_prefix(prefix) {
        Some(rest) => {
            *s = rest;
            true
        }
        None => false,
    }
}
