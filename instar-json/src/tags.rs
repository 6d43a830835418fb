use instar_core::DocComment;
use instar_phpdoc::UseResolver;

use crate::encoder::{self, RenamePolicy, VisibilityPolicy};
use crate::error::JsonPolicyError;

/// The normalized argument of a `skip` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonSkip {
    /// `skip` / `skip=true`: hidden in both directions.
    Always,
    /// `skip=false`: re-included, cancelling an earlier skip.
    Never,
    /// `skip=encode`: never written, still read.
    Encode,
    /// `skip=decode`: still written, never read.
    Decode,
}

impl JsonSkip {
    pub(crate) fn when_encoding(self) -> bool {
        matches!(self, JsonSkip::Always | JsonSkip::Encode)
    }

    pub(crate) fn when_decoding(self) -> bool {
        matches!(self, JsonSkip::Always | JsonSkip::Decode)
    }
}

/// One parsed `@kphp-json` attribute with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JsonAttr {
    Rename(String),
    Skip(JsonSkip),
    ArrayAsHashmap(bool),
    RawString(bool),
    Required(bool),
    FloatPrecision(u32),
    SkipIfDefault(bool),
    VisibilityPolicy(VisibilityPolicy),
    RenamePolicy(RenamePolicy),
    Flatten(bool),
    Fields(Vec<String>),
}

impl JsonAttr {
    /// The attribute keyword as written in docblocks.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            JsonAttr::Rename(_) => "rename",
            JsonAttr::Skip(_) => "skip",
            JsonAttr::ArrayAsHashmap(_) => "array_as_hashmap",
            JsonAttr::RawString(_) => "raw_string",
            JsonAttr::Required(_) => "required",
            JsonAttr::FloatPrecision(_) => "float_precision",
            JsonAttr::SkipIfDefault(_) => "skip_if_default",
            JsonAttr::VisibilityPolicy(_) => "visibility_policy",
            JsonAttr::RenamePolicy(_) => "rename_policy",
            JsonAttr::Flatten(_) => "flatten",
            JsonAttr::Fields(_) => "fields",
        }
    }

    /// Whether the attribute may sit above a class.
    pub(crate) fn allowed_above_class(&self) -> bool {
        matches!(
            self,
            JsonAttr::FloatPrecision(_)
                | JsonAttr::SkipIfDefault(_)
                | JsonAttr::VisibilityPolicy(_)
                | JsonAttr::RenamePolicy(_)
                | JsonAttr::Flatten(_)
                | JsonAttr::Fields(_)
        )
    }

    /// Whether the attribute may sit above a field.
    pub(crate) fn allowed_above_field(&self) -> bool {
        matches!(
            self,
            JsonAttr::Rename(_)
                | JsonAttr::Skip(_)
                | JsonAttr::ArrayAsHashmap(_)
                | JsonAttr::RawString(_)
                | JsonAttr::Required(_)
                | JsonAttr::FloatPrecision(_)
                | JsonAttr::SkipIfDefault(_)
        )
    }
}

/// A single `@kphp-json` tag, optionally scoped to one encoder by the
/// `for SomeEncoder` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JsonTag {
    pub(crate) for_encoder: Option<String>,
    pub(crate) attr: JsonAttr,
}

impl JsonTag {
    /// Parses the text after `@kphp-json`.
    pub(crate) fn parse(raw: &str, resolver: &UseResolver) -> Result<JsonTag, JsonPolicyError> {
        let mut rest = raw.trim();
        let mut for_encoder = None;
        if let Some(after) = rest.strip_prefix("for ") {
            let after = after.trim();
            let Some(space) = after.find(' ') else {
                return Err(JsonPolicyError::NothingAfterFor);
            };
            let fqn = resolver.resolve(&after[..space]);
            if !encoder::encoder_exists(&fqn) {
                return Err(JsonPolicyError::UnknownForEncoder { fqn });
            }
            for_encoder = Some(fqn);
            rest = after[space + 1..].trim();
        }

        // a missing `=` and an empty right-hand side are the same thing
        let (attr, rhs) = match rest.find('=') {
            Some(eq) => (rest[..eq].trim(), rest[eq + 1..].trim()),
            None => (rest, ""),
        };

        let attr = match attr {
            "rename" => JsonAttr::Rename(require_value(attr, rhs)?.to_string()),
            "skip" => {
                let skip = match rhs {
                    "" | "true" | "1" => JsonSkip::Always,
                    "false" | "0" => JsonSkip::Never,
                    "encode" => JsonSkip::Encode,
                    "decode" => JsonSkip::Decode,
                    other => {
                        return Err(JsonPolicyError::BadSkip {
                            rhs: other.to_string(),
                        });
                    }
                };
                JsonAttr::Skip(skip)
            }
            "array_as_hashmap" => JsonAttr::ArrayAsHashmap(bool_or_true(attr, rhs)?),
            "raw_string" => JsonAttr::RawString(bool_or_true(attr, rhs)?),
            "required" => JsonAttr::Required(bool_or_true(attr, rhs)?),
            "skip_if_default" => JsonAttr::SkipIfDefault(bool_or_true(attr, rhs)?),
            "flatten" => JsonAttr::Flatten(bool_or_true(attr, rhs)?),
            "float_precision" => {
                let rhs = require_value(attr, rhs)?;
                let precision =
                    rhs.parse::<u32>()
                        .map_err(|_| JsonPolicyError::BadFloatPrecision {
                            rhs: rhs.to_string(),
                        })?;
                JsonAttr::FloatPrecision(precision)
            }
            "visibility_policy" => match require_value(attr, rhs)? {
                "all" => JsonAttr::VisibilityPolicy(VisibilityPolicy::All),
                "public" => JsonAttr::VisibilityPolicy(VisibilityPolicy::Public),
                other => {
                    return Err(JsonPolicyError::BadVisibilityPolicy {
                        rhs: other.to_string(),
                    });
                }
            },
            "rename_policy" => match require_value(attr, rhs)? {
                "none" => JsonAttr::RenamePolicy(RenamePolicy::None),
                "snake_case" => JsonAttr::RenamePolicy(RenamePolicy::SnakeCase),
                "camelCase" => JsonAttr::RenamePolicy(RenamePolicy::CamelCase),
                other => {
                    return Err(JsonPolicyError::BadRenamePolicy {
                        rhs: other.to_string(),
                    });
                }
            },
            "fields" => {
                let names = require_value(attr, rhs)?
                    .split(|c: char| c.is_whitespace() || c == '$' || c == ',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                JsonAttr::Fields(names)
            }
            other => {
                return Err(JsonPolicyError::UnknownAttr {
                    attr: other.to_string(),
                });
            }
        };
        Ok(JsonTag { for_encoder, attr })
    }

    /// Whether this tag is in effect under the given encoder.
    pub(crate) fn applies_to(&self, encoder: &str) -> bool {
        self.for_encoder.as_deref().map_or(true, |e| e == encoder)
    }
}

fn require_value<'a>(attr: &str, rhs: &'a str) -> Result<&'a str, JsonPolicyError> {
    if rhs.is_empty() {
        return Err(JsonPolicyError::MissingValue {
            attr: attr.to_string(),
        });
    }
    Ok(rhs)
}

fn bool_or_true(attr: &str, rhs: &str) -> Result<bool, JsonPolicyError> {
    match rhs {
        "" | "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(JsonPolicyError::BadBool {
            attr: attr.to_string(),
            rhs: other.to_string(),
        }),
    }
}

/// Every `@kphp-json` tag of one docblock, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TagList {
    tags: Vec<JsonTag>,
}

impl TagList {
    /// Parses all `@kphp-json` tags out of a docblock, or `None` when
    /// the text carries none.
    pub(crate) fn from_doc(
        doc: Option<&str>,
        resolver: &UseResolver,
    ) -> Result<Option<TagList>, JsonPolicyError> {
        let Some(text) = doc else {
            return Ok(None);
        };
        if !text.contains("@kphp-json") {
            return Ok(None);
        }
        let parsed = DocComment::parse(text);
        let mut tags = Vec::new();
        for tag in parsed.tags_named("kphp-json") {
            tags.push(JsonTag::parse(tag.value_trimmed(), resolver)?);
        }
        Ok(Some(TagList { tags }))
    }

    pub(crate) fn tags(&self) -> &[JsonTag] {
        &self.tags
    }

    /// The latest tag in effect under `encoder` whose attribute `pick`
    /// accepts.
    pub(crate) fn find<T>(
        &self,
        encoder: &str,
        pick: impl Fn(&JsonAttr) -> Option<T>,
    ) -> Option<T> {
        self.tags
            .iter()
            .rev()
            .filter(|t| t.applies_to(encoder))
            .find_map(|t| pick(&t.attr))
    }

    /// Whether any tag marks the class flatten, under any encoder.
    pub(crate) fn any_flatten(&self) -> bool {
        self.tags.iter().any(|t| t.attr == JsonAttr::Flatten(true))
    }
}
