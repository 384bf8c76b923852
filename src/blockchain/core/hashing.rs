//! Canonical block hashing.
//!
//! Nodes written in other languages hash the same blocks, so the byte layout
//! is fixed: the JSON form of the block with object keys sorted, `", "` between
//! items, `": "` after keys and every character outside printable ASCII
//! escaped as `\uXXXX`. SHA-256 over those bytes, lowercase hex.

use crate::blockchain::core::chain::Block;
use crate::transaction::Transaction;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Hex digest of a block's canonical form.
pub fn hash_block(block: &Block) -> String {
    sha256_hex(canonical_json(&block_value(block)).as_bytes())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// The field set that takes part in the hash.
pub fn block_value(block: &Block) -> Value {
    let mut map = Map::new();
    map.insert("index".to_string(), Value::from(block.index));
    map.insert("timestamp".to_string(), Value::from(block.timestamp));
    map.insert(
        "transactions".to_string(),
        Value::Array(block.transactions.iter().map(transaction_value).collect()),
    );
    map.insert("proof".to_string(), Value::from(block.proof));
    map.insert(
        "previous_hash".to_string(),
        Value::from(block.previous_hash.as_str()),
    );
    Value::Object(map)
}

fn transaction_value(tx: &Transaction) -> Value {
    let mut map = Map::new();
    map.insert("owner".to_string(), Value::from(tx.owner));
    map.insert("receiver".to_string(), Value::from(tx.receiver));
    map.insert("amount".to_string(), Value::from(tx.amount));
    map.insert("drug_id".to_string(), Value::from(tx.drug_id));
    map.insert("h".to_string(), Value::from(tx.h));
    map.insert("s0".to_string(), Value::from(tx.s0));
    map.insert("s1".to_string(), Value::from(tx.s1));
    Value::Object(map)
}

/// Renders `value` in the canonical text form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sorted here rather than relying on the map's iteration order,
            // which depends on serde_json's `preserve_order` feature.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(key, out);
                out.push_str(": ");
                write_value(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}
