//! Key Codec Module
//!
//! Turns a logical key plus an optional tag into the identifier entries are
//! physically stored under.
//!
//! # Equivalence rule
//! Keys are canonicalised before encoding, so values that compare equal as
//! numbers share one entry:
//! - `true` is `1` and `false` is `0`
//! - a finite float without a fractional part inside the `i64` range is the
//!   equal integer (`3.0` is `3`, `-0.0` is `0`)
//! - any other float is identified by its bit pattern, with every NaN
//!   collapsed to a single canonical NaN
//!
//! Text keys never collide with numeric keys (`"1"` is not `1`).

use std::fmt;

use serde::{Deserialize, Serialize};

// == Key ==
/// A logical cache key.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Key::Str(value.clone())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(i64::from(value))
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Key::Int(i64::from(value))
    }
}

impl From<f64> for Key {
    fn from(value: f64) -> Self {
        Key::Float(value)
    }
}

impl From<f32> for Key {
    fn from(value: f32) -> Self {
        Key::Float(f64::from(value))
    }
}

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Key::Bool(value)
    }
}

// == Canonical Form ==
/// Key after the equivalence rule has been applied.
enum Canonical<'a> {
    Text(&'a str),
    Integer(i64),
    FloatBits(u64),
}

/// Smallest f64 strictly above the i64 range.
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn canonicalize(key: &Key) -> Canonical<'_> {
    match key {
        Key::Str(s) => Canonical::Text(s),
        Key::Int(i) => Canonical::Integer(*i),
        Key::Bool(b) => Canonical::Integer(i64::from(*b)),
        Key::Float(f) => {
            if f.is_nan() {
                Canonical::FloatBits(f64::NAN.to_bits())
            } else if f.fract() == 0.0 && *f >= -I64_UPPER && *f < I64_UPPER {
                Canonical::Integer(*f as i64)
            } else {
                Canonical::FloatBits(f.to_bits())
            }
        }
    }
}

// == Storage Identifier ==
/// Identifier an entry is stored under, derived from `(key, tag)`.
///
/// Layout is `<tag>|<key>` where the tag part is `~` for no tag or
/// `#<byte length>:<tag>`, and the key part is `s:<text>`, `i:<decimal>` or
/// `f:<hex bits>`. The length prefix keeps the encoding injective whatever
/// characters the tag contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageIdentifier(String);

impl StorageIdentifier {
    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier as raw bytes, as written to disk.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Rebuilds an identifier read back from storage.
    pub(crate) fn from_raw(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for StorageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Encode ==
/// Derives the storage identifier for `key` within `tag`.
///
/// Pure and infallible; identical inputs give identical output in every process.
pub fn encode(key: &Key, tag: Option<&str>) -> StorageIdentifier {
    let mut out = match tag {
        None => String::from("~"),
        Some(t) => format!("#{}:{}", t.len(), t),
    };
    out.push('|');

    match canonicalize(key) {
        Canonical::Text(s) => {
            out.push_str("s:");
            out.push_str(s);
        }
        Canonical::Integer(i) => {
            out.push_str("i:");
            out.push_str(&i.to_string());
        }
        Canonical::FloatBits(bits) => {
            out.push_str(&format!("f:{:016x}", bits));
        }
    }

    StorageIdentifier(out)
}
