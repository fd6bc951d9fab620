//! Node identifiers and the value spaces encoded directly in them
//!
//! A `NodeId` is a big-endian `u64`. The top byte is a kind tag:
//!
//! | tag    | kind                    | low 56 bits                                 |
//! |--------|-------------------------|---------------------------------------------|
//! | `0x00` | node table entry        | object file offset                          |
//! | `0x01` | `xsd:integer`           | two's complement value                      |
//! | `0x02` | `xsd:decimal`           | scale (8 bits), unscaled value (48 bits)    |
//! | `0x03` | `xsd:date`              | year (14 bits), month (4 bits), day (5 bits)|
//! | `0x04` | `xsd:boolean`           | 0 or 1                                      |
//! | `0xFF` | sentinels               | `DOES_NOT_EXIST`, `ANY`                     |
//!
//! A literal is only inlined when decoding its id gives back the identical
//! node, lexical form included; `"+1"^^xsd:integer` stays in the table.

use super::term::{Node, XSD};
use crate::error::{Result, TdbError};
use crate::sys::SIZE_OF_NODE_ID;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

const TAG_SHIFT: u32 = 56;
const VALUE_MASK: u64 = (1 << TAG_SHIFT) - 1;

const TAG_TABLE: u8 = 0x00;
const TAG_INTEGER: u8 = 0x01;
const TAG_DECIMAL: u8 = 0x02;
const TAG_DATE: u8 = 0x03;
const TAG_BOOLEAN: u8 = 0x04;
const TAG_SPECIAL: u8 = 0xFF;

const INTEGER_BITS: u32 = 56;
const DECIMAL_BITS: u32 = 48;
const DECIMAL_MASK: u64 = (1 << DECIMAL_BITS) - 1;

/// What a node id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeIdKind {
    /// Entry in the node table
    Table,
    /// Inline `xsd:integer`
    Integer,
    /// Inline `xsd:decimal`
    Decimal,
    /// Inline `xsd:date`
    Date,
    /// Inline `xsd:boolean`
    Boolean,
    /// Sentinel value
    Special,
    /// Tag not assigned
    Unknown,
}

/// Fixed-size surrogate key for a node
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Marker for a node known not to be in the table
    pub const DOES_NOT_EXIST: NodeId = NodeId(u64::MAX - 1);
    /// Wildcard marker
    pub const ANY: NodeId = NodeId(u64::MAX);

    /// Id from its raw bits
    pub const fn from_raw(raw: u64) -> Self {
        NodeId(raw)
    }

    /// Raw bits
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Id of the node table entry stored at `offset`
    pub fn from_table_offset(offset: u64) -> Result<Self> {
        if offset > VALUE_MASK {
            return Err(TdbError::InvalidInput(format!(
                "node table offset {offset} exceeds the id space"
            )));
        }
        Ok(NodeId(offset))
    }

    /// Object file offset, for table ids
    pub fn table_offset(self) -> Option<u64> {
        self.is_table().then_some(self.0 & VALUE_MASK)
    }

    /// Big-endian bytes
    pub fn to_bytes(self) -> [u8; SIZE_OF_NODE_ID] {
        self.0.to_be_bytes()
    }

    /// Read from exactly eight big-endian bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; SIZE_OF_NODE_ID] = bytes.try_into().map_err(|_| TdbError::InvalidRecord {
            expected: SIZE_OF_NODE_ID,
            got: bytes.len(),
        })?;
        Ok(NodeId(u64::from_be_bytes(raw)))
    }

    fn tag(self) -> u8 {
        (self.0 >> TAG_SHIFT) as u8
    }

    fn value(self) -> u64 {
        self.0 & VALUE_MASK
    }

    fn tagged(tag: u8, value: u64) -> Self {
        NodeId((u64::from(tag) << TAG_SHIFT) | (value & VALUE_MASK))
    }

    /// Kind of this id
    pub fn kind(self) -> NodeIdKind {
        match self.tag() {
            TAG_TABLE => NodeIdKind::Table,
            TAG_INTEGER => NodeIdKind::Integer,
            TAG_DECIMAL => NodeIdKind::Decimal,
            TAG_DATE => NodeIdKind::Date,
            TAG_BOOLEAN => NodeIdKind::Boolean,
            TAG_SPECIAL => NodeIdKind::Special,
            _ => NodeIdKind::Unknown,
        }
    }

    /// Whether this id refers to a node table entry
    pub fn is_table(self) -> bool {
        self.tag() == TAG_TABLE
    }

    /// Whether this id carries its value inline
    pub fn is_inline(self) -> bool {
        matches!(
            self.kind(),
            NodeIdKind::Integer | NodeIdKind::Decimal | NodeIdKind::Date | NodeIdKind::Boolean
        )
    }

    /// Whether this id is a sentinel
    pub fn is_special(self) -> bool {
        self.tag() == TAG_SPECIAL
    }

    /// Inline id for a node, if its value space and lexical form allow it
    pub fn inline(node: &Node) -> Option<NodeId> {
        let id = encode_integer(node)
            .or_else(|| encode_decimal(node))
            .or_else(|| encode_date(node))
            .or_else(|| encode_boolean(node))?;
        // Only exact round trips may be inlined
        (id.decode_inline().as_ref() == Some(node)).then_some(id)
    }

    /// Node for an inline id
    pub fn decode_inline(self) -> Option<Node> {
        let v = self.value();
        let (lexical, local) = match self.kind() {
            NodeIdKind::Integer => (sign_extend(v, INTEGER_BITS).to_string(), "integer"),
            NodeIdKind::Decimal => {
                let scale = (v >> DECIMAL_BITS) as u32;
                let unscaled = sign_extend(v & DECIMAL_MASK, DECIMAL_BITS);
                (format_decimal(unscaled, scale), "decimal")
            }
            NodeIdKind::Date => {
                let (year, month, day) = (v >> 9, (v >> 5) & 0xF, v & 0x1F);
                (format!("{year:04}-{month:02}-{day:02}"), "date")
            }
            NodeIdKind::Boolean => match v {
                0 => ("false".to_string(), "boolean"),
                1 => ("true".to_string(), "boolean"),
                _ => return None,
            },
            _ => return None,
        };
        Some(Node::typed_literal(lexical, format!("{XSD}{local}")))
    }
}

fn sign_extend(v: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((v << shift) as i64) >> shift
}

fn fits(v: i64, bits: u32) -> bool {
    let limit = 1i64 << (bits - 1);
    (-limit..limit).contains(&v)
}

fn encode_integer(node: &Node) -> Option<NodeId> {
    let v: i64 = node.xsd_lexical("integer")?.parse().ok()?;
    fits(v, INTEGER_BITS).then(|| NodeId::tagged(TAG_INTEGER, v as u64))
}

fn encode_decimal(node: &Node) -> Option<NodeId> {
    let lex = node.xsd_lexical("decimal")?;
    let (int_part, frac_part) = lex.split_once('.').unwrap_or((lex, ""));
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let scale = u8::try_from(frac_part.len()).ok()?;
    let unscaled: i64 = format!("{int_part}{frac_part}").parse().ok()?;
    fits(unscaled, DECIMAL_BITS).then(|| {
        let bits = (u64::from(scale) << DECIMAL_BITS) | (unscaled as u64 & DECIMAL_MASK);
        NodeId::tagged(TAG_DECIMAL, bits)
    })
}

fn format_decimal(unscaled: i64, scale: u32) -> String {
    if scale == 0 {
        return unscaled.to_string();
    }
    let sign = if unscaled < 0 { "-" } else { "" };
    let digits = format!("{:0>width$}", unscaled.unsigned_abs(), width = scale as usize + 1);
    let (int_part, frac_part) = digits.split_at(digits.len() - scale as usize);
    format!("{sign}{int_part}.{frac_part}")
}

fn encode_date(node: &Node) -> Option<NodeId> {
    let date = NaiveDate::parse_from_str(node.xsd_lexical("date")?, "%Y-%m-%d").ok()?;
    let year = u64::try_from(date.year()).ok().filter(|y| *y <= 9999)?;
    let bits = (year << 9) | (u64::from(date.month()) << 5) | u64::from(date.day());
    Some(NodeId::tagged(TAG_DATE, bits))
}

fn encode_boolean(node: &Node) -> Option<NodeId> {
    match node.xsd_lexical("boolean")? {
        "true" => Some(NodeId::tagged(TAG_BOOLEAN, 1)),
        "false" => Some(NodeId::tagged(TAG_BOOLEAN, 0)),
        _ => None,
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            NodeId::ANY => write!(f, "NodeId[ANY]"),
            NodeId::DOES_NOT_EXIST => write!(f, "NodeId[DNE]"),
            id => write!(f, "NodeId[{:?}:{:#x}]", id.kind(), id.value()),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
