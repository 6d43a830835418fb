//! Cursor scanner for docblock annotations.
//!
//! Only segments shaped like `* @tag value` carry information; everything
//! else in the comment is prose and is skipped. Tag values run to the end
//! of their line and are kept raw; consumers trim as needed.

/// One `@tag value` entry. The name is stored without the `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTag {
    /// Tag name, e.g. `kphp-serialized-field`.
    pub name: String,
    /// The rest of the line, untrimmed. Empty for bare tags.
    pub value: String,
}

impl DocTag {
    /// The value with surrounding whitespace removed.
    pub fn value_trimmed(&self) -> &str {
        self.value.trim()
    }
}

/// A parsed docblock: its tags, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocComment {
    tags: Vec<DocTag>,
}

impl DocComment {
    /// Scans a docblock. Never fails; malformed lines are prose.
    ///
    /// The `/**` and `*/` fences may be present or not. A one-line
    /// `/** @var int */` works because the second `*` of the opening
    /// fence counts as the line's star.
    pub fn parse(text: &str) -> DocComment {
        let b = text.as_bytes();
        let mut pos = if b.starts_with(b"/*") { 2 } else { 0 };
        let len = if pos > 0 && text.ends_with("*/") {
            b.len() - 2
        } else {
            b.len()
        };

        let mut tags = Vec::new();
        while pos < len {
            // at line start, waiting for '*' after whitespace
            match b[pos] {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    pos += 1;
                    continue;
                }
                b'*' => {}
                _ => {
                    skip_line(b, &mut pos, len);
                    continue;
                }
            }
            pos += 1;
            while pos < len && b[pos] == b' ' {
                pos += 1;
            }
            if pos >= len || b[pos] != b'@' {
                skip_line(b, &mut pos, len);
                continue;
            }

            pos += 1;
            let start = pos;
            while pos < len && !matches!(b[pos], b' ' | b'\t' | b'\n') {
                pos += 1;
            }
            let name = &text[start..pos];

            while pos < len && b[pos] == b' ' {
                pos += 1;
            }
            let start = pos;
            while pos < len && b[pos] != b'\n' {
                pos += 1;
            }
            let value = &text[start..pos];

            if !name.is_empty() {
                tags.push(DocTag {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        DocComment { tags }
    }

    /// The first tag with this name.
    pub fn tag(&self, name: &str) -> Option<&DocTag> {
        self.tags.iter().find(|t| t.name == name)
    }

    /// All tags with this name, in declaration order.
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DocTag> {
        self.tags.iter().filter(move |t| t.name == name)
    }

    /// Whether any tag with this name is present.
    pub fn has_tag(&self, name: &str) -> bool {
        self.tag(name).is_some()
    }

    /// All tags, in declaration order.
    pub fn tags(&self) -> &[DocTag] {
        &self.tags
    }
}

fn skip_line(b: &[u8], pos: &mut usize, len: usize) {
    while *pos < len && b[*pos] != b'\n' {
        *pos += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r"/**
 * Keeps a user's profile.
 *
 * @kphp-serializable
 * @kphp-reserved-fields [3, 4]
 * some prose that is not a tag
 * @kphp-json rename_policy=snake_case
 * @kphp-json for MyEncoder skip
 */";

    #[test]
    fn scans_only_starred_tag_lines() {
        let doc = DocComment::parse(DOC);
        assert!(doc.has_tag("kphp-serializable"));
        assert_eq!(doc.tag("kphp-serializable").unwrap().value, "");
        assert_eq!(doc.tag("kphp-reserved-fields").unwrap().value, "[3, 4]");
        assert!(!doc.has_tag("some"));
    }

    #[test]
    fn repeated_tags_keep_declaration_order() {
        let doc = DocComment::parse(DOC);
        let values: Vec<_> = doc.tags_named("kphp-json").map(|t| t.value.as_str()).collect();
        assert_eq!(values, ["rename_policy=snake_case", "for MyEncoder skip"]);
    }

    #[test]
    fn one_line_docblocks_parse() {
        let doc = DocComment::parse("/** @var tuple(int, string)|false */");
        assert_eq!(doc.tag("var").unwrap().value, "tuple(int, string)|false ");
        assert_eq!(doc.tag("var").unwrap().value_trimmed(), "tuple(int, string)|false");
    }

    #[test]
    fn bare_text_without_a_star_is_ignored() {
        let doc = DocComment::parse("@kphp-serializable");
        assert!(!doc.has_tag("kphp-serializable"));
    }

    #[test]
    fn value_runs_to_the_end_of_the_line() {
        let doc = DocComment::parse(" * @var int   the count\n * @kphp-serialized-field 7");
        assert_eq!(doc.tag("var").unwrap().value, "int   the count");
        assert_eq!(doc.tag("kphp-serialized-field").unwrap().value, "7");
    }
}
