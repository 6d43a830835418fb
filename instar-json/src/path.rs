use core::fmt;

/// Where in the document the decoder currently is, for error messages.
///
/// Object keys render as `['key']`, array elements as `[.]`, so a
/// failure deep in a payload reads like `/['items'][.]['id']`.
#[derive(Debug, Default)]
pub(crate) struct JsonPath {
    parts: Vec<Option<String>>,
}

impl JsonPath {
    pub(crate) fn new() -> JsonPath {
        JsonPath { parts: Vec::new() }
    }

    /// Descends into an object key (`Some`) or an array element (`None`).
    pub(crate) fn enter(&mut self, key: Option<&str>) {
        self.parts.push(key.map(str::to_string));
    }

    pub(crate) fn leave(&mut self) {
        self.parts.pop();
    }

    /// Current depth, to rewind to after a failed union branch.
    pub(crate) fn depth(&self) -> usize {
        self.parts.len()
    }

    pub(crate) fn rewind(&mut self, depth: usize) {
        self.parts.truncate(depth);
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        for part in &self.parts {
            match part {
                Some(key) => write!(f, "['{key}']")?,
                None => write!(f, "[.]")?,
            }
        }
        Ok(())
    }
}
