//! RDF terms and their canonical serialization
//!
//! The canonical form is N-Triples style: `<iri>`, `_:label`, `"lex"`,
//! `"lex"@lang` and `"lex"^^<datatype>`. It is both the byte encoding stored
//! in the node object file and the input to the node hash.

use crate::error::{Result, TdbError};
use crate::sys::LEN_NODE_HASH;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Write};

/// XML Schema namespace
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// RDF term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Node {
    /// IRI reference
    Iri(String),
    /// Literal with optional datatype or language tag
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
    /// Blank node label
    BlankNode(String),
}

impl Node {
    /// Create an IRI
    pub fn iri<S: Into<String>>(iri: S) -> Self {
        Node::Iri(iri.into())
    }

    /// Create a plain literal
    pub fn literal<S: Into<String>>(value: S) -> Self {
        Node::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Create a typed literal
    pub fn typed_literal<S: Into<String>, T: Into<String>>(value: S, datatype: T) -> Self {
        Node::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Create a language-tagged literal
    pub fn lang_literal<S: Into<String>, L: Into<String>>(value: S, language: L) -> Self {
        Node::Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Create a blank node
    pub fn blank_node<S: Into<String>>(id: S) -> Self {
        Node::BlankNode(id.into())
    }

    /// Check if the node is an IRI
    pub fn is_iri(&self) -> bool {
        matches!(self, Node::Iri(_))
    }

    /// Check if the node is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal { .. })
    }

    /// Check if the node is a blank node
    pub fn is_blank_node(&self) -> bool {
        matches!(self, Node::BlankNode(_))
    }

    /// Lexical form of a literal with this XSD datatype local name, if it is one
    pub fn xsd_lexical(&self, local: &str) -> Option<&str> {
        match self {
            Node::Literal {
                value,
                datatype: Some(dt),
                language: None,
            } if dt.strip_prefix(XSD) == Some(local) => Some(value),
            _ => None,
        }
    }

    /// Check the node has a canonical form that parses back to it
    ///
    /// A literal takes a datatype or a language tag, not both; language
    /// tags and blank node labels are non-empty.
    pub fn validate(&self) -> Result<()> {
        let bad = |why: &str| Err(TdbError::InvalidNode(format!("{why}: {self:?}")));
        match self {
            Node::Literal {
                datatype: Some(_),
                language: Some(_),
                ..
            } => bad("literal has both a datatype and a language tag"),
            Node::Literal {
                language: Some(lang),
                ..
            } if lang.is_empty() => bad("empty language tag"),
            Node::BlankNode(label) if label.is_empty() => bad("empty blank node label"),
            _ => Ok(()),
        }
    }

    /// Canonical serialization
    pub fn to_canonical(&self) -> String {
        self.to_string()
    }

    /// Parse a canonical serialization
    pub fn parse(s: &str) -> Result<Node> {
        let bad = |why: &str| TdbError::InvalidNode(format!("{why}: {s:?}"));
        if let Some(label) = s.strip_prefix("_:") {
            if label.is_empty() {
                return Err(bad("empty blank node label"));
            }
            return Ok(Node::BlankNode(label.to_string()));
        }
        if s.starts_with('<') {
            let (iri, rest) = read_delimited(&s[1..], '>').ok_or_else(|| bad("unterminated IRI"))?;
            if !rest.is_empty() {
                return Err(bad("trailing characters after IRI"));
            }
            return Ok(Node::Iri(iri));
        }
        if let Some(body) = s.strip_prefix('"') {
            let (value, rest) = read_delimited(body, '"').ok_or_else(|| bad("unterminated literal"))?;
            if rest.is_empty() {
                return Ok(Node::literal(value));
            }
            if let Some(lang) = rest.strip_prefix('@') {
                if lang.is_empty() {
                    return Err(bad("empty language tag"));
                }
                return Ok(Node::lang_literal(value, lang));
            }
            if let Some(dt) = rest.strip_prefix("^^<") {
                let (dt, tail) = read_delimited(dt, '>').ok_or_else(|| bad("unterminated datatype"))?;
                if !tail.is_empty() {
                    return Err(bad("trailing characters after datatype"));
                }
                return Ok(Node::typed_literal(value, dt));
            }
            return Err(bad("unexpected literal suffix"));
        }
        Err(bad("not a node"))
    }

    /// Fixed-length hash of the canonical form, the node table's key
    pub fn hash_key(&self) -> [u8; LEN_NODE_HASH] {
        let digest = Sha256::digest(self.to_canonical().as_bytes());
        let mut key = [0u8; LEN_NODE_HASH];
        key.copy_from_slice(&digest[..LEN_NODE_HASH]);
        key
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str, close: char) -> fmt::Result {
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == close => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Read up to an unescaped `close`, returning the unescaped text and the rest
fn read_delimited(s: &str, close: char) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next()?.1 {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                '\\' => out.push('\\'),
                e if e == close => out.push(e),
                _ => return None,
            },
            c if c == close => return Some((out, &s[i + c.len_utf8()..])),
            c => out.push(c),
        }
    }
    None
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Iri(iri) => {
                f.write_char('<')?;
                write_escaped(f, iri, '>')?;
                f.write_char('>')
            }
            Node::Literal {
                value,
                datatype,
                language,
            } => {
                f.write_char('"')?;
                write_escaped(f, value, '"')?;
                f.write_char('"')?;
                if let Some(lang) = language {
                    write!(f, "@{lang}")?;
                } else if let Some(dt) = datatype {
                    f.write_str("^^<")?;
                    write_escaped(f, dt, '>')?;
                    f.write_char('>')?;
                }
                Ok(())
            }
            Node::BlankNode(id) => write!(f, "_:{id}"),
        }
    }
}

/// RDF triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Node,
    pub predicate: Node,
    pub object: Node,
}

impl Triple {
    /// Create a triple
    pub fn new(subject: Node, predicate: Node, object: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// RDF quad: a triple in a named graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub graph: Node,
    pub subject: Node,
    pub predicate: Node,
    pub object: Node,
}

impl Quad {
    /// Create a quad
    pub fn new(graph: Node, subject: Node, predicate: Node, object: Node) -> Self {
        Self {
            graph,
            subject,
            predicate,
            object,
        }
    }

    /// The triple part
    pub fn triple(&self) -> Triple {
        Triple::new(
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
        )
    }
}

impl Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} .",
            self.subject, self.predicate, self.object, self.graph
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_forms() {
        assert_eq!(Node::iri("http://example/s").to_string(), "<http://example/s>");
        assert_eq!(Node::blank_node("b0").to_string(), "_:b0");
        assert_eq!(Node::literal("hi").to_string(), "\"hi\"");
        assert_eq!(Node::lang_literal("chat", "fr").to_string(), "\"chat\"@fr");
        assert_eq!(
            Node::typed_literal("1", format!("{XSD}integer")).to_string(),
            "\"1\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn test_escapes_round_trip() -> Result<()> {
        let tricky = Node::literal("a \"quoted\"\nline\\with\ttab");
        let text = tricky.to_string();
        assert_eq!(text, r#""a \"quoted\"\nline\\with\ttab""#);
        assert_eq!(Node::parse(&text)?, tricky);

        let iri = Node::iri("http://example/a>b");
        assert_eq!(Node::parse(&iri.to_string())?, iri);
        Ok(())
    }

    #[test]
    fn test_parse_all_kinds() -> Result<()> {
        for node in [
            Node::iri("http://example/s"),
            Node::blank_node("x1"),
            Node::literal(""),
            Node::lang_literal("colour", "en-GB"),
            Node::typed_literal("2020-01-01", format!("{XSD}date")),
        ] {
            assert_eq!(Node::parse(&node.to_canonical())?, node);
        }
        Ok(())
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "x", "<open", "\"open", "\"x\"junk", "_:", "<a>b", "\"x\"@", "\"\\q\""] {
            assert!(Node::parse(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_validate_rejects_unreadable_nodes() {
        let both = Node::Literal {
            value: "x".into(),
            datatype: Some(format!("{XSD}string")),
            language: Some("en".into()),
        };
        for bad in [both, Node::lang_literal("x", ""), Node::blank_node("")] {
            assert!(matches!(bad.validate(), Err(TdbError::InvalidNode(_))), "{bad:?}");
        }
        for good in [
            Node::iri(""),
            Node::literal(""),
            Node::lang_literal("x", "en"),
            Node::typed_literal("x", format!("{XSD}string")),
            Node::blank_node("b"),
        ] {
            assert!(good.validate().is_ok(), "{good:?}");
        }
    }

    #[test]
    fn test_hash_key_distinguishes_kinds() {
        let a = Node::iri("x").hash_key();
        let b = Node::literal("x").hash_key();
        let c = Node::blank_node("x").hash_key();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(a, Node::iri("x").hash_key());
    }

    #[test]
    fn test_xsd_lexical() {
        let n = Node::typed_literal("42", format!("{XSD}integer"));
        assert_eq!(n.xsd_lexical("integer"), Some("42"));
        assert_eq!(n.xsd_lexical("decimal"), None);
        assert_eq!(Node::literal("42").xsd_lexical("integer"), None);
    }
}
