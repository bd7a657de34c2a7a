//! CSS selector subset used by page mods.
//!
//! Supported: type and universal selectors, `.class`, `#id`, attribute
//! selectors (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, `[a~=v]`, quoted
//! or bare values), the descendant and child combinators, and `,` lists.
//! Pseudo-classes and sibling combinators are rejected.

use std::fmt;

use super::ElementId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected '{found}' at offset {offset} in '{selector}'")]
    Unexpected {
        selector: String,
        found: char,
        offset: usize,
    },

    #[error("unterminated {what} in '{selector}'")]
    Unterminated { selector: String, what: &'static str },
}

// ── Selector model ───────────────────────────────────────────────────

/// How an attribute value is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
    /// Whitespace-separated word list contains the value.
    Includes(String),
}

impl AttributeOp {
    fn matches(&self, actual: &str) -> bool {
        match self {
            Self::Exists => true,
            Self::Equals(v) => actual == v,
            Self::Contains(v) => !v.is_empty() && actual.contains(v.as_str()),
            Self::Prefix(v) => !v.is_empty() && actual.starts_with(v.as_str()),
            Self::Suffix(v) => !v.is_empty() && actual.ends_with(v.as_str()),
            Self::Includes(v) => actual.split_whitespace().any(|w| w == v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeSelector {
    name: String,
    op: AttributeOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Simple selectors that must all hold for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.ids.is_empty() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches<A: ElementAdapter + ?Sized>(&self, adapter: &A, element: ElementId) -> bool {
        if let Some(tag) = &self.tag {
            if !adapter.tag_name(element).is_some_and(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        if !self.ids.is_empty() {
            let Some(id) = adapter.attr(element, "id") else {
                return false;
            };
            if self.ids.iter().any(|wanted| wanted != id) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let Some(class) = adapter.attr(element, "class") else {
                return false;
            };
            if !self
                .classes
                .iter()
                .all(|wanted| class.split_whitespace().any(|c| c == wanted))
            {
                return false;
            }
        }
        self.attributes.iter().all(|a| {
            adapter
                .attr(element, &a.name)
                .is_some_and(|actual| a.op.matches(actual))
        })
    }
}

/// Compound selectors joined by combinators, written left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    /// `parts[0].0` is unused; `parts[i].0` joins `parts[i - 1]` and `parts[i]`.
    parts: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches<A: ElementAdapter + ?Sized>(&self, adapter: &A, element: ElementId) -> bool {
        self.matches_at(adapter, element, self.parts.len() - 1)
    }

    fn matches_at<A: ElementAdapter + ?Sized>(&self, adapter: &A, element: ElementId, idx: usize) -> bool {
        let (combinator, compound) = &self.parts[idx];
        if !compound.matches(adapter, element) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => adapter
                .parent(element)
                .is_some_and(|p| self.matches_at(adapter, p, idx - 1)),
            Combinator::Descendant => {
                let mut current = adapter.parent(element);
                while let Some(ancestor) = current {
                    if self.matches_at(adapter, ancestor, idx - 1) {
                        return true;
                    }
                    current = adapter.parent(ancestor);
                }
                false
            }
        }
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        Parser::new(input).parse_list()
    }

    /// `tag[name=value]` without going through the text syntax.
    pub fn with_attribute(tag: Option<&str>, name: &str, value: &str) -> Self {
        let compound = Compound {
            tag: tag.map(str::to_ascii_lowercase),
            attributes: vec![AttributeSelector {
                name: name.to_ascii_lowercase(),
                op: AttributeOp::Equals(value.to_string()),
            }],
            ..Compound::default()
        };
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        Self {
            source: format!("{}[{}=\"{}\"]", tag.unwrap_or(""), name, escaped),
            alternatives: vec![Complex {
                parts: vec![(Combinator::Descendant, compound)],
            }],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn matches<A: ElementAdapter + ?Sized>(&self, adapter: &A, element: ElementId) -> bool {
        self.alternatives.iter().any(|c| c.matches(adapter, element))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Tree access needed for matching.
pub(crate) trait ElementAdapter {
    fn parent(&self, element: ElementId) -> Option<ElementId>;
    fn tag_name(&self, element: ElementId) -> Option<&str>;
    fn attr(&self, element: ElementId, name: &str) -> Option<&str>;
}

// ── Parser ───────────────────────────────────────────────────────────

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    index: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            index: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn skip_spaces(&mut self) -> bool {
        let start = self.index;
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.index += 1;
        }
        self.index > start
    }

    fn unexpected(&self) -> SelectorError {
        let found = self.input[self.index..].chars().next().unwrap_or(' ');
        SelectorError::Unexpected {
            selector: self.input.to_string(),
            found,
            offset: self.index,
        }
    }

    fn unterminated(&self, what: &'static str) -> SelectorError {
        SelectorError::Unterminated {
            selector: self.input.to_string(),
            what,
        }
    }

    fn parse_list(mut self) -> Result<Selector, SelectorError> {
        if self.input.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut alternatives = Vec::new();
        loop {
            self.skip_spaces();
            alternatives.push(self.parse_complex()?);
            match self.peek() {
                Some(b',') => self.index += 1,
                None => break,
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(Selector {
            source: self.input.trim().to_string(),
            alternatives,
        })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut parts = vec![(Combinator::Descendant, self.parse_compound()?)];
        loop {
            let had_space = self.skip_spaces();
            let combinator = match self.peek() {
                None | Some(b',') => break,
                Some(b'>') => {
                    self.index += 1;
                    self.skip_spaces();
                    Combinator::Child
                }
                Some(_) if had_space => Combinator::Descendant,
                Some(_) => return Err(self.unexpected()),
            };
            parts.push((combinator, self.parse_compound()?));
        }
        Ok(Complex { parts })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut universal = false;
        match self.peek() {
            Some(b'*') => {
                self.index += 1;
                universal = true;
            }
            Some(b) if is_ident_byte(b) => compound.tag = Some(self.ident().to_ascii_lowercase()),
            _ => {}
        }
        loop {
            match self.peek() {
                Some(b'.') => {
                    self.index += 1;
                    let class = self.required_ident()?;
                    compound.classes.push(class);
                }
                Some(b'#') => {
                    self.index += 1;
                    let id = self.required_ident()?;
                    compound.ids.push(id);
                }
                Some(b'[') => {
                    self.index += 1;
                    compound.attributes.push(self.attribute()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() && !universal {
            return Err(match self.peek() {
                Some(_) => self.unexpected(),
                None => SelectorError::Empty,
            });
        }
        Ok(compound)
    }

    fn ident(&mut self) -> &'a str {
        let start = self.index;
        while self.peek().is_some_and(is_ident_byte) {
            self.index += 1;
        }
        &self.input[start..self.index]
    }

    fn required_ident(&mut self) -> Result<String, SelectorError> {
        let ident = self.ident();
        if ident.is_empty() {
            return Err(self.unexpected());
        }
        Ok(ident.to_string())
    }

    fn attribute(&mut self) -> Result<AttributeSelector, SelectorError> {
        self.skip_spaces();
        let name = self.required_ident()?.to_ascii_lowercase();
        self.skip_spaces();

        let op: fn(String) -> AttributeOp = match self.peek() {
            Some(b']') => {
                self.index += 1;
                return Ok(AttributeSelector {
                    name,
                    op: AttributeOp::Exists,
                });
            }
            Some(b'=') => {
                self.index += 1;
                AttributeOp::Equals
            }
            Some(prefix @ (b'*' | b'^' | b'$' | b'~')) if self.bytes.get(self.index + 1) == Some(&b'=') => {
                self.index += 2;
                match prefix {
                    b'*' => AttributeOp::Contains,
                    b'^' => AttributeOp::Prefix,
                    b'$' => AttributeOp::Suffix,
                    _ => AttributeOp::Includes,
                }
            }
            None => return Err(self.unterminated("attribute selector")),
            Some(_) => return Err(self.unexpected()),
        };

        self.skip_spaces();
        let value = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.index += 1;
                self.quoted(quote)?
            }
            Some(_) => self.bare_value(),
            None => return Err(self.unterminated("attribute selector")),
        };
        self.skip_spaces();
        match self.peek() {
            Some(b']') => self.index += 1,
            None => return Err(self.unterminated("attribute selector")),
            Some(_) => return Err(self.unexpected()),
        }
        Ok(AttributeSelector { name, op: op(value) })
    }

    fn quoted(&mut self, quote: u8) -> Result<String, SelectorError> {
        let mut out = String::new();
        let mut start = self.index;
        loop {
            match self.peek() {
                None => return Err(self.unterminated("string")),
                Some(b'\\') => {
                    out.push_str(&self.input[start..self.index]);
                    self.index += 1;
                    start = self.index;
                    if self.peek().is_some() {
                        // Keep the escaped character, whatever its width.
                        let ch = self.input[self.index..].chars().next().unwrap_or('\\');
                        self.index += ch.len_utf8();
                    }
                }
                Some(b) if b == quote => {
                    out.push_str(&self.input[start..self.index]);
                    self.index += 1;
                    return Ok(out);
                }
                Some(_) => self.index += 1,
            }
        }
    }

    fn bare_value(&mut self) -> String {
        let start = self.index;
        while self.peek().is_some_and(|b| b != b']' && !b.is_ascii_whitespace()) {
            self.index += 1;
        }
        self.input[start..self.index].to_string()
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}
