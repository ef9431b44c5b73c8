use crate::error::{CodecError, CodecResult};

/// Escaping rules for text placed in markup bodies and attribute values.
pub trait TextEscaper: Send + Sync {
    /// Make `raw` safe to embed in markup.
    fn escape(&self, raw: &str) -> String;

    /// Reverse [`escape`](TextEscaper::escape).
    fn unescape(&self, escaped: &str) -> CodecResult<String>;
}

/// Standard XML escaping of `& < > " '`.
///
/// Unescaping also accepts decimal and hexadecimal character references.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlEscaper;

impl TextEscaper for XmlEscaper {
    fn escape(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for ch in raw.chars() {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&apos;"),
                other => out.push(other),
            }
        }
        out
    }

    fn unescape(&self, escaped: &str) -> CodecResult<String> {
        let mut out = String::with_capacity(escaped.len());
        let mut rest = escaped;
        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let semi = after.find(';').ok_or_else(|| {
                CodecError::Malformed(format!("unterminated entity in {escaped:?}"))
            })?;
            out.push(decode_entity(&after[..semi])?);
            rest = &after[semi + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn decode_entity(name: &str) -> CodecResult<char> {
    let ch = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let hex = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"));
            let code = if let Some(hex) = hex {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            code.and_then(char::from_u32)
        }
    };
    ch.ok_or_else(|| CodecError::Malformed(format!("unknown entity &{name};")))
}
