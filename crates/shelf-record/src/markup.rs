//! Minimal pull-style markup reader and writer.
//!
//! Supports exactly what record documents use: elements with quoted
//! attributes, self-closing elements, escaped text bodies, an optional XML
//! declaration and comments. No namespaces, CDATA or DTDs.

use crate::error::{CodecError, CodecResult};
use crate::escape::TextEscaper;

/// XML declaration written at the top of every document.
pub const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// One parse event.
///
/// A self-closing element yields a `Start` immediately followed by its `End`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupEvent {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    /// Unescaped character data.
    Text(String),
}

impl MarkupEvent {
    /// Value of an attribute on a `Start` event.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            MarkupEvent::Start { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Pull parser over a complete document.
///
/// Iterating yields `Result<MarkupEvent>`; after the first error the
/// iterator is exhausted.
pub struct MarkupReader<'a> {
    text: &'a str,
    pos: usize,
    escaper: &'a dyn TextEscaper,
    open: Vec<String>,
    pending_end: Option<String>,
    root_seen: bool,
    failed: bool,
}

impl<'a> MarkupReader<'a> {
    /// Create a reader over `text`.
    pub fn new(text: &'a str, escaper: &'a dyn TextEscaper) -> Self {
        Self {
            text,
            pos: 0,
            escaper,
            open: Vec::new(),
            pending_end: None,
            root_seen: false,
            failed: false,
        }
    }

    fn fail(&self, reason: impl Into<String>) -> CodecError {
        CodecError::Markup {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_past(&mut self, terminator: &str, what: &str) -> CodecResult<()> {
        match self.rest().find(terminator) {
            Some(at) => {
                self.pos += at + terminator.len();
                Ok(())
            }
            None => Err(self.fail(format!("unterminated {what}"))),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn next_event(&mut self) -> CodecResult<Option<MarkupEvent>> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(MarkupEvent::End { name }));
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                if let Some(name) = self.open.last() {
                    return Err(self.fail(format!("unterminated element <{name}>")));
                }
                return Ok(None);
            }
            if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("</") {
                return self.read_end().map(Some);
            } else if rest.starts_with('<') {
                return self.read_start().map(Some);
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let raw = &rest[..end];
                if self.open.is_empty() {
                    if !raw.trim().is_empty() {
                        return Err(self.fail("text outside the root element"));
                    }
                    self.pos += end;
                    continue;
                }
                self.pos += end;
                return self.escaper.unescape(raw).map(|t| Some(MarkupEvent::Text(t)));
            }
        }
    }

    fn read_end(&mut self) -> CodecResult<MarkupEvent> {
        let rest = self.rest();
        let close = rest
            .find('>')
            .ok_or_else(|| self.fail("unterminated closing tag"))?;
        let name = rest[2..close].trim().to_string();
        match self.open.pop() {
            Some(open) if open == name => {
                self.pos += close + 1;
                Ok(MarkupEvent::End { name })
            }
            Some(open) => Err(self.fail(format!("expected </{open}>, found </{name}>"))),
            None => Err(self.fail(format!("unexpected </{name}>"))),
        }
    }

    fn read_start(&mut self) -> CodecResult<MarkupEvent> {
        if self.open.is_empty() && self.root_seen {
            return Err(self.fail("more than one root element"));
        }
        self.pos += 1;
        let name = self.read_name()?;

        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            if rest.is_empty() {
                return Err(self.fail(format!("unterminated tag <{name}")));
            }
            attributes.push(self.read_attribute()?);
        };

        self.root_seen = true;
        if self_closing {
            self.pending_end = Some(name.clone());
        } else {
            self.open.push(name.clone());
        }
        Ok(MarkupEvent::Start { name, attributes })
    }

    fn read_name(&mut self) -> CodecResult<String> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>' || c == '=')
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.fail("expected a name"));
        }
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    fn read_attribute(&mut self) -> CodecResult<(String, String)> {
        let key = self.read_name()?;
        self.skip_whitespace();
        if !self.rest().starts_with('=') {
            return Err(self.fail(format!("attribute {key} has no value")));
        }
        self.pos += 1;
        self.skip_whitespace();
        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.fail(format!("attribute {key} value is not quoted"))),
        };
        self.pos += 1;
        let rest = self.rest();
        let close = rest
            .find(quote)
            .ok_or_else(|| self.fail(format!("unterminated value for attribute {key}")))?;
        let value = self.escaper.unescape(&rest[..close])?;
        self.pos += close + 1;
        Ok((key, value))
    }
}

impl Iterator for MarkupReader<'_> {
    type Item = CodecResult<MarkupEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_event() {
            Ok(event) => event.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Indenting writer producing a complete document.
pub struct MarkupWriter<'a> {
    out: String,
    escaper: &'a dyn TextEscaper,
    open: Vec<String>,
}

impl<'a> MarkupWriter<'a> {
    /// Start a document with the XML declaration.
    pub fn new(escaper: &'a dyn TextEscaper) -> Self {
        let mut out = String::with_capacity(256);
        out.push_str(DECLARATION);
        out.push('\n');
        Self {
            out,
            escaper,
            open: Vec::new(),
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.open.len() {
            self.out.push_str("  ");
        }
    }

    fn open_tag(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(&self.escaper.escape(value));
            self.out.push('"');
        }
    }

    /// Open an element that will have children.
    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.open_tag(name, attributes);
        self.out.push_str(">\n");
        self.open.push(name.to_string());
    }

    /// Write a self-closing element.
    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.open_tag(name, attributes);
        self.out.push_str("/>\n");
    }

    /// Write an element whose only content is escaped text.
    pub fn text_element(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) {
        self.open_tag(name, attributes);
        self.out.push('>');
        self.out.push_str(&self.escaper.escape(text));
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push_str(">\n");
    }

    /// Close the innermost open element.
    pub fn end(&mut self) {
        if let Some(name) = self.open.pop() {
            self.indent();
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push_str(">\n");
        }
    }

    /// Close any open elements and return the document.
    pub fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.end();
        }
        self.out
    }
}
