//! Fragment Parser
//!
//! Turns a markup string into a sequence of detached nodes. A fragment may
//! hold any mix of top-level elements, text, comments and processing
//! instructions; it is not required to have a single root.
//!
//! Names are resolved against a caller-supplied [`NamespaceScope`], so an
//! unprefixed element with no `xmlns` of its own lands in the default
//! namespace of the place it will be spliced into. Unprefixed attributes are
//! never in a namespace.

use crate::config::DeclarationPolicy;
use crate::error::SpliceError;
use crate::namespace::NamespaceScope;
use crate::tree::QName;
use memchr::{memchr, memchr2, memmem};
use std::borrow::Cow;

/// A node that is not (yet) part of any tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNode {
    Element(FragmentElement),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentElement {
    pub name: QName,
    pub attributes: Vec<FragmentAttribute>,
    /// `(prefix, uri)` declarations made on this element; empty prefix is the
    /// default namespace.
    pub namespaces: Vec<(String, String)>,
    pub children: Vec<FragmentNode>,
    /// Written as `<a></a>` rather than `<a/>`.
    pub explicit_close: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentAttribute {
    pub name: QName,
    pub value: String,
}

impl FragmentElement {
    pub fn new(name: QName) -> Self {
        FragmentElement {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
            explicit_close: false,
        }
    }
}

/// Deeply nested fragments would otherwise be dropped one stack frame per
/// level.
impl Drop for FragmentElement {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(node) = pending.pop() {
            if let FragmentNode::Element(mut element) = node {
                pending.append(&mut element.children);
            }
        }
    }
}

/// Parses `input` using `scope` as the enclosing namespace context.
pub fn parse_fragment(
    input: &str,
    scope: &NamespaceScope,
    declarations: DeclarationPolicy,
) -> Result<Vec<FragmentNode>, SpliceError> {
    FragmentParser::new(input, scope.clone(), declarations).parse()
}

struct OpenElement {
    element: FragmentElement,
    raw_name: String,
    start: usize,
}

struct FragmentParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    scope: NamespaceScope,
    declarations: DeclarationPolicy,
    stack: Vec<OpenElement>,
    top_level: Vec<FragmentNode>,
}

impl<'a> FragmentParser<'a> {
    fn new(input: &'a str, scope: NamespaceScope, declarations: DeclarationPolicy) -> Self {
        FragmentParser {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            scope,
            declarations,
            stack: Vec::new(),
            top_level: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Vec<FragmentNode>, SpliceError> {
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'<' {
                self.parse_markup()?;
            } else {
                self.parse_text()?;
            }
        }

        if let Some(open) = self.stack.last() {
            return Err(SpliceError::malformed(
                open.start,
                format!("element '{}' is never closed", open.raw_name),
            ));
        }
        Ok(self.top_level)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn emit(&mut self, node: FragmentNode) {
        let siblings = match self.stack.last_mut() {
            Some(open) => &mut open.element.children,
            None => &mut self.top_level,
        };
        if let FragmentNode::Text(text) = &node {
            if let Some(FragmentNode::Text(previous)) = siblings.last_mut() {
                previous.push_str(text);
                return;
            }
        }
        siblings.push(node);
    }

    fn parse_text(&mut self) -> Result<(), SpliceError> {
        let start = self.pos;
        let end = memchr(b'<', &self.bytes[start..])
            .map(|offset| start + offset)
            .unwrap_or(self.bytes.len());
        let text = decode_entities(&self.input[start..end], start)?;
        self.pos = end;
        self.emit(FragmentNode::Text(text.into_owned()));
        Ok(())
    }

    fn parse_markup(&mut self) -> Result<(), SpliceError> {
        let rest = self.rest();
        if rest.starts_with("<!--") {
            self.parse_comment()
        } else if rest.starts_with("<![CDATA[") {
            self.parse_cdata()
        } else if rest.starts_with("<!") {
            Err(SpliceError::malformed(
                self.pos,
                "document type declarations are not allowed in a fragment",
            ))
        } else if rest.starts_with("<?") {
            self.parse_processing_instruction()
        } else if rest.starts_with("</") {
            self.parse_end_tag()
        } else {
            self.parse_start_tag()
        }
    }

    /// Byte offset of `needle` at or after `from`, or a malformed error naming `what`.
    fn find(&self, from: usize, needle: &str, what: &str) -> Result<usize, SpliceError> {
        memmem::find(&self.bytes[from..], needle.as_bytes())
            .map(|offset| from + offset)
            .ok_or_else(|| SpliceError::malformed(self.pos, format!("unterminated {what}")))
    }

    fn parse_comment(&mut self) -> Result<(), SpliceError> {
        let body_start = self.pos + 4;
        let end = self.find(body_start, "-->", "comment")?;
        let body = &self.input[body_start..end];
        if body.contains("--") || body.ends_with('-') {
            return Err(SpliceError::malformed(self.pos, "'--' is not allowed inside a comment"));
        }
        self.pos = end + 3;
        self.emit(FragmentNode::Comment(body.to_string()));
        Ok(())
    }

    fn parse_cdata(&mut self) -> Result<(), SpliceError> {
        let body_start = self.pos + 9;
        let end = self.find(body_start, "]]>", "CDATA section")?;
        let body = self.input[body_start..end].to_string();
        self.pos = end + 3;
        self.emit(FragmentNode::Text(body));
        Ok(())
    }

    fn parse_processing_instruction(&mut self) -> Result<(), SpliceError> {
        let start = self.pos;
        let end = self.find(start + 2, "?>", "processing instruction")?;
        let body = &self.input[start + 2..end];
        let (target, data) = match body.find(|c: char| c.is_ascii_whitespace()) {
            Some(split) => (&body[..split], body[split..].trim_start()),
            None => (body, ""),
        };
        if !is_valid_name(target) {
            return Err(SpliceError::malformed(start, "invalid processing instruction target"));
        }
        self.pos = end + 2;

        if target.eq_ignore_ascii_case("xml") {
            // A document-level declaration has no place in a fragment.
            return match self.declarations {
                DeclarationPolicy::Reject => Err(SpliceError::structural(
                    "a fragment cannot contain an XML declaration",
                )),
                DeclarationPolicy::Ignore => {
                    log::warn!("Ignoring XML declaration found inside a fragment.");
                    Ok(())
                }
            };
        }

        self.emit(FragmentNode::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }

    fn parse_end_tag(&mut self) -> Result<(), SpliceError> {
        let start = self.pos;
        self.pos += 2;
        let name = self.read_name()?;
        self.skip_whitespace();
        if self.bytes.get(self.pos) != Some(&b'>') {
            return Err(SpliceError::malformed(self.pos, "expected '>' to end the closing tag"));
        }
        self.pos += 1;

        let Some(mut open) = self.stack.pop() else {
            return Err(SpliceError::malformed(
                start,
                format!("closing tag '{name}' has no matching start tag"),
            ));
        };
        if open.raw_name != name {
            return Err(SpliceError::malformed(
                start,
                format!("expected '</{}>' but found '</{name}>'", open.raw_name),
            ));
        }
        open.element.explicit_close = true;
        self.scope.pop_scope();
        self.emit(FragmentNode::Element(open.element));
        Ok(())
    }

    fn parse_start_tag(&mut self) -> Result<(), SpliceError> {
        let start = self.pos;
        self.pos += 1;
        let raw_name = self.read_name()?;

        let mut raw_attributes: Vec<(String, String, usize)> = Vec::new();
        let self_closing = loop {
            let had_space = self.skip_whitespace();
            match self.bytes.get(self.pos) {
                Some(b'>') => {
                    self.pos += 1;
                    break false;
                }
                Some(b'/') => {
                    if self.bytes.get(self.pos + 1) != Some(&b'>') {
                        return Err(SpliceError::malformed(self.pos, "expected '/>'"));
                    }
                    self.pos += 2;
                    break true;
                }
                Some(_) if had_space => {
                    let attr_start = self.pos;
                    let name = self.read_name()?;
                    self.skip_whitespace();
                    if self.bytes.get(self.pos) != Some(&b'=') {
                        return Err(SpliceError::malformed(
                            self.pos,
                            format!("attribute '{name}' has no value"),
                        ));
                    }
                    self.pos += 1;
                    self.skip_whitespace();
                    let value = self.read_attribute_value()?;
                    raw_attributes.push((name, value, attr_start));
                }
                Some(_) => {
                    return Err(SpliceError::malformed(
                        self.pos,
                        "expected whitespace between attributes",
                    ));
                }
                None => {
                    return Err(SpliceError::malformed(start, "unterminated start tag"));
                }
            }
        };

        self.scope.push_scope();
        let element = self.build_element(&raw_name, raw_attributes, start)?;

        if self_closing {
            self.scope.pop_scope();
            self.emit(FragmentNode::Element(element));
        } else {
            self.stack.push(OpenElement {
                element,
                raw_name,
                start,
            });
        }
        Ok(())
    }

    fn build_element(
        &mut self,
        raw_name: &str,
        raw_attributes: Vec<(String, String, usize)>,
        start: usize,
    ) -> Result<FragmentElement, SpliceError> {
        let mut namespaces = Vec::new();
        let mut plain = Vec::new();
        for (name, value, offset) in raw_attributes {
            match declared_prefix(&name) {
                Some(prefix) => {
                    if namespaces.iter().any(|(p, _): &(String, String)| p == prefix) {
                        return Err(SpliceError::malformed(
                            offset,
                            format!("duplicate namespace declaration '{name}'"),
                        ));
                    }
                    if !prefix.is_empty() && value.is_empty() {
                        return Err(SpliceError::malformed(
                            offset,
                            format!("prefix '{prefix}' cannot be bound to an empty URI"),
                        ));
                    }
                    self.scope.declare(prefix, &value);
                    namespaces.push((prefix.to_string(), value));
                }
                None => plain.push((name, value, offset)),
            }
        }

        let name = self.resolve(raw_name, true, start)?;
        let mut attributes: Vec<FragmentAttribute> = Vec::with_capacity(plain.len());
        for (raw, value, offset) in plain {
            let name = self.resolve(&raw, false, offset)?;
            if attributes.iter().any(|a| {
                a.name.local_name == name.local_name && a.name.namespace_uri == name.namespace_uri
            }) {
                return Err(SpliceError::malformed(offset, format!("duplicate attribute '{raw}'")));
            }
            attributes.push(FragmentAttribute { name, value });
        }

        Ok(FragmentElement {
            name,
            attributes,
            namespaces,
            children: Vec::new(),
            explicit_close: false,
        })
    }

    fn resolve(&self, raw: &str, is_element: bool, offset: usize) -> Result<QName, SpliceError> {
        let (prefix, local) = split_qname(raw);
        if prefix.is_empty() {
            let uri = if is_element {
                self.scope.default_namespace()
            } else {
                ""
            };
            return Ok(QName::new("", local, uri));
        }
        match self.scope.resolve(prefix) {
            Some(uri) => Ok(QName::new(prefix, local, uri)),
            None => Err(SpliceError::malformed(
                offset,
                format!("namespace prefix '{prefix}' is not declared"),
            )),
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        self.pos > start
    }

    fn read_name(&mut self) -> Result<String, SpliceError> {
        let start = self.pos;
        let len = self.rest().find(is_name_terminator).unwrap_or(self.rest().len());
        let name = &self.input[start..start + len];
        if !is_valid_name(name) {
            return Err(SpliceError::malformed(start, "expected a name"));
        }
        self.pos += len;
        Ok(name.to_string())
    }

    fn read_attribute_value(&mut self) -> Result<String, SpliceError> {
        let start = self.pos;
        let quote = match self.bytes.get(start) {
            Some(&q) if q == b'"' || q == b'\'' => q,
            _ => return Err(SpliceError::malformed(start, "attribute value must be quoted")),
        };
        let body_start = start + 1;
        let Some(offset) = memchr2(quote, b'<', &self.bytes[body_start..]) else {
            return Err(SpliceError::malformed(start, "unterminated attribute value"));
        };
        let end = body_start + offset;
        if self.bytes[end] == b'<' {
            return Err(SpliceError::malformed(end, "'<' is not allowed in attribute values"));
        }
        let value = decode_entities(&self.input[body_start..end], body_start)?;
        self.pos = end + 1;
        Ok(value.into_owned())
    }
}

fn is_name_terminator(c: char) -> bool {
    c.is_ascii_whitespace() || matches!(c, '/' | '>' | '=' | '<' | '"' | '\'')
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == ':') {
        return false;
    }
    if name.starts_with(':') || name.ends_with(':') || name.matches(':').count() > 1 {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Splits `p:local` into `("p", "local")`; unprefixed names yield an empty prefix.
pub(crate) fn split_qname(raw: &str) -> (&str, &str) {
    match raw.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", raw),
    }
}

/// The prefix an `xmlns` / `xmlns:p` attribute declares, if it is one.
pub(crate) fn declared_prefix(raw: &str) -> Option<&str> {
    if raw == "xmlns" {
        Some("")
    } else {
        raw.strip_prefix("xmlns:")
    }
}

/// Decode entity and character references in `input`. `base` is the byte
/// offset of `input` within the fragment, used for error positions.
fn decode_entities(input: &str, base: usize) -> Result<Cow<'_, str>, SpliceError> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(input));
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let offset = base + (input.len() - rest.len()) + amp;
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';') else {
            return Err(SpliceError::malformed(offset, "unterminated entity reference"));
        };
        let entity = &after[..semi];
        let decoded = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => decode_char_reference(entity).ok_or_else(|| {
                SpliceError::malformed(offset, format!("unknown entity '&{entity};'"))
            })?,
        };
        result.push(decoded);
        rest = &after[semi + 1..];
    }
    result.push_str(rest);
    Ok(Cow::Owned(result))
}

fn decode_char_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code).filter(|&c| c != '\0')
}
