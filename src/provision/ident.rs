//! SQL quoting for generated DDL.
//!
//! DDL statements cannot take bind parameters for object names, so every
//! name is interpolated through [`quote_identifier`] and every value
//! through [`quote_literal`].

use std::fmt::Write;

/// Quote an identifier, such as a role or database name.
///
/// ASCII names are wrapped in `"` with inner quotes doubled. Anything else
/// uses the `U&"..."` form with each non-ASCII code point written as a
/// four hex digit escape (`\0441`); code points outside the BMP become a
/// UTF-16 surrogate pair of two such escapes.
pub fn quote_identifier(identifier: &str) -> String {
    if identifier.is_ascii() {
        return format!("\"{}\"", identifier.replace('"', "\"\""));
    }

    let mut escaped = String::with_capacity(identifier.len() + 8);
    for c in identifier.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\"\""),
            c if c.is_ascii() => escaped.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(escaped, "\\{:04x}", unit);
                }
            }
        }
    }
    format!("U&\"{}\"", escaped)
}

/// Quote a string value, such as a password.
pub fn quote_literal(value: &str) -> String {
    let doubled = value.replace('\'', "''");
    if value.contains('\\') {
        format!("E'{}'", doubled.replace('\\', "\\\\"))
    } else {
        format!("'{}'", doubled)
    }
}
