use core::fmt::Write as _;

use crate::error::JsonEncodeError;

/// One open `{` or `[` level.
#[derive(Debug)]
struct Level {
    in_array: bool,
    values_count: usize,
}

/// A low-level JSON emitter over a growing string buffer.
///
/// The writer tracks open object/array levels for comma placement and
/// validates usage as it goes: keys only inside objects, matching
/// `start_*`/`end_*` pairs, exactly one root value. Floats never come
/// out as `NaN`/`Infinity` (both collapse to `0.0`), and an active
/// float precision rounds every double written under it; precisions
/// save and restore as a stack so a nested field's setting cannot leak
/// into its siblings.
#[derive(Debug)]
pub struct JsonWriter {
    buf: String,
    float_precision: u32,
    pretty: bool,
    preserve_zero_fraction: bool,
    indent: usize,
    has_root: bool,
    stack: Vec<Level>,
    precision_stack: Vec<u32>,
}

impl JsonWriter {
    /// A fresh writer. `pretty` indents with four spaces per level;
    /// `preserve_zero_fraction` keeps integral doubles as `3.0`, not `3`.
    pub fn new(pretty: bool, preserve_zero_fraction: bool) -> JsonWriter {
        JsonWriter {
            buf: String::new(),
            float_precision: 0,
            pretty,
            preserve_zero_fraction,
            indent: 0,
            has_root: false,
            stack: Vec::new(),
            precision_stack: Vec::new(),
        }
    }

    /// Writes `true` or `false`.
    pub fn write_bool(&mut self, b: bool) -> Result<(), JsonEncodeError> {
        self.register_value()?;
        self.buf.push_str(if b { "true" } else { "false" });
        Ok(())
    }

    /// Writes an integer.
    pub fn write_int(&mut self, i: i64) -> Result<(), JsonEncodeError> {
        self.register_value()?;
        let _ = write!(self.buf, "{i}");
        Ok(())
    }

    /// Writes a double, applying the active precision and the NaN/Inf
    /// and zero-fraction rules.
    pub fn write_double(&mut self, d: f64) -> Result<(), JsonEncodeError> {
        self.register_value()?;
        let d = if d.is_nan() || d.is_infinite() { 0.0 } else { d };
        if self.float_precision > 0 {
            let _ = write!(self.buf, "{}", round_to(d, self.float_precision));
        } else {
            let _ = write!(self.buf, "{d}");
        }
        // the integrality probe looks at the unrounded value, as the
        // original runtime does
        if self.preserve_zero_fraction && d == d.trunc() {
            self.buf.push_str(".0");
        }
        Ok(())
    }

    /// Writes a quoted, escaped string.
    pub fn write_string(&mut self, s: &str) -> Result<(), JsonEncodeError> {
        self.register_value()?;
        self.buf.push('"');
        escape_into(&mut self.buf, s);
        self.buf.push('"');
        Ok(())
    }

    /// Writes a pre-encoded JSON fragment verbatim, quotes and all.
    pub fn write_raw_string(&mut self, s: &str) -> Result<(), JsonEncodeError> {
        self.register_value()?;
        self.buf.push_str(s);
        Ok(())
    }

    /// Writes `null`.
    pub fn write_null(&mut self) -> Result<(), JsonEncodeError> {
        self.register_value()?;
        self.buf.push_str("null");
        Ok(())
    }

    /// Writes an object key. Escaping is opt-in: field keys from
    /// docblocks are written as-is, runtime array keys ask for it.
    pub fn write_key(&mut self, key: &str, escape: bool) -> Result<(), JsonEncodeError> {
        let Some(top) = self.stack.last() else {
            return Err(JsonEncodeError::KeyOutsideObject);
        };
        if top.in_array {
            return Err(JsonEncodeError::KeyOutsideObject);
        }
        if top.values_count > 0 {
            self.buf.push(',');
        }
        if self.pretty {
            self.buf.push('\n');
            self.write_indent();
        }
        self.buf.push('"');
        if escape {
            escape_into(&mut self.buf, key);
        } else {
            self.buf.push_str(key);
        }
        self.buf.push_str("\":");
        if self.pretty {
            self.buf.push(' ');
        }
        Ok(())
    }

    /// Opens an object level.
    pub fn start_object(&mut self) -> Result<(), JsonEncodeError> {
        self.new_level(false)
    }

    /// Closes an object level.
    pub fn end_object(&mut self) -> Result<(), JsonEncodeError> {
        self.exit_level(false)
    }

    /// Opens an array level.
    pub fn start_array(&mut self) -> Result<(), JsonEncodeError> {
        self.new_level(true)
    }

    /// Closes an array level.
    pub fn end_array(&mut self) -> Result<(), JsonEncodeError> {
        self.exit_level(true)
    }

    /// Whether exactly one root value was written and every level closed.
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && self.has_root
    }

    /// The accumulated JSON text.
    pub fn into_json(self) -> String {
        self.buf
    }

    /// Activates a float precision, saving the current one.
    pub fn set_float_precision(&mut self, precision: u32) {
        if self.float_precision > 0 {
            self.precision_stack.push(self.float_precision);
        }
        self.float_precision = precision;
    }

    /// Restores the previously saved precision, or none.
    pub fn restore_float_precision(&mut self) {
        self.float_precision = self.precision_stack.pop().unwrap_or(0);
    }

    fn register_value(&mut self) -> Result<(), JsonEncodeError> {
        if self.stack.is_empty() {
            if self.has_root {
                return Err(JsonEncodeError::SecondRootValue);
            }
            self.has_root = true;
            return Ok(());
        }
        let last = self.stack.len() - 1;
        if self.stack[last].in_array {
            if self.stack[last].values_count > 0 {
                self.buf.push(',');
            }
            if self.pretty {
                self.buf.push('\n');
                self.write_indent();
            }
        }
        self.stack[last].values_count += 1;
        Ok(())
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push(' ');
        }
    }

    fn new_level(&mut self, is_array: bool) -> Result<(), JsonEncodeError> {
        self.register_value()?;
        self.stack.push(Level {
            in_array: is_array,
            values_count: 0,
        });
        self.buf.push(if is_array { '[' } else { '{' });
        self.indent += 4;
        Ok(())
    }

    fn exit_level(&mut self, is_array: bool) -> Result<(), JsonEncodeError> {
        let Some(level) = self.stack.pop() else {
            return Err(JsonEncodeError::BraceDisbalance);
        };
        if level.in_array != is_array {
            return Err(JsonEncodeError::EnclosureMismatch {
                array_open: level.in_array,
            });
        }
        self.indent -= 4;
        if self.pretty && level.values_count > 0 {
            self.buf.push('\n');
            self.write_indent();
        }
        self.buf.push(if is_array { ']' } else { '}' });
        Ok(())
    }
}

/// Rounds half away from zero to `precision` decimal digits.
fn round_to(d: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(17) as i32);
    (d * factor).round() / factor
}

fn escape_into(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '/' => buf.push_str("\\/"),
            '\u{8}' => buf.push_str("\\b"),
            '\u{c}' => buf.push_str("\\f"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => buf.push(c),
        }
    }
}
