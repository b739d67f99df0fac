//! Key encoding for structure records
//!
//! Every logical key owns three families of records in the ordered store.
//!
//! Key format: `<namespace>:<role>:<key>[:<identifier>]`
//!
//! Examples:
//! - `__redis:complex:meta:queue` (structural metadata)
//! - `__redis:complex:node:queue:17` (list node with sequence 17)
//! - `__redis:complex:data:queue:17` (payload of that node)
//! - `__redis:complex:node:scores:C00000000000000%3Aalice` (sorted-set node)
//!
//! The logical key and the identifier are percent-encoded, so the `:`
//! delimiter never occurs inside a component and the encoding is injective.

/// Record family under a logical key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Meta,
    Node,
    Data,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Meta => "meta",
            Role::Node => "node",
            Role::Data => "data",
        }
    }

    fn parse(s: &[u8]) -> Option<Role> {
        match s {
            b"meta" => Some(Role::Meta),
            b"node" => Some(Role::Node),
            b"data" => Some(Role::Data),
            _ => None,
        }
    }
}

const DELIMITER: u8 = b':';
const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Builds and parses namespaced record keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEncoder {
    namespace: Vec<u8>,
}

impl KeyEncoder {
    pub fn new(namespace: &str) -> Self {
        KeyEncoder {
            namespace: namespace.as_bytes().to_vec(),
        }
    }

    /// Encode a record key
    ///
    /// Format: `<namespace>:<role>:<pct(key)>[:<pct(identifier)>]`
    pub fn encode(&self, role: Role, key: &[u8], identifier: Option<&[u8]>) -> Vec<u8> {
        let role = role.as_str().as_bytes();
        let mut out = Vec::with_capacity(
            self.namespace.len() + role.len() + key.len() + identifier.map_or(0, |i| i.len()) + 3,
        );
        out.extend_from_slice(&self.namespace);
        out.push(DELIMITER);
        out.extend_from_slice(role);
        out.push(DELIMITER);
        percent_encode(key, &mut out);
        if let Some(id) = identifier {
            out.push(DELIMITER);
            percent_encode(id, &mut out);
        }
        out
    }

    pub fn meta_key(&self, key: &[u8]) -> Vec<u8> {
        self.encode(Role::Meta, key, None)
    }

    pub fn node_key(&self, key: &[u8], identifier: &[u8]) -> Vec<u8> {
        self.encode(Role::Node, key, Some(identifier))
    }

    pub fn data_key(&self, key: &[u8], identifier: &[u8]) -> Vec<u8> {
        self.encode(Role::Data, key, Some(identifier))
    }

    /// Whole-value data record (strings)
    pub fn value_key(&self, key: &[u8]) -> Vec<u8> {
        self.encode(Role::Data, key, None)
    }

    /// Prefix shared by every per-node record of `role` under `key`
    pub fn prefix(&self, role: Role, key: &[u8]) -> Vec<u8> {
        let mut out = self.encode(role, key, None);
        out.push(DELIMITER);
        out
    }

    /// Decode a record key back to components
    ///
    /// Returns: (role, logical key, identifier)
    pub fn decode(&self, encoded: &[u8]) -> Option<(Role, Vec<u8>, Option<Vec<u8>>)> {
        let rest = encoded.strip_prefix(self.namespace.as_slice())?;
        let rest = rest.strip_prefix(&[DELIMITER])?;
        let mut parts = rest.split(|b| *b == DELIMITER);

        let role = Role::parse(parts.next()?)?;
        let key = percent_decode(parts.next()?)?;
        let identifier = match parts.next() {
            Some(id) => Some(percent_decode(id)?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some((role, key, identifier))
    }
}

/// Identifier for a list node
pub fn sequence_identifier(seq: u64) -> Vec<u8> {
    seq.to_string().into_bytes()
}

/// Fixed-width hex of an order-preserving transform of `score`
pub fn score_hex(score: f64) -> [u8; 16] {
    let bits = score.to_bits();
    let ordered = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
    let mut out = [0u8; 16];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = HEX[((ordered >> (60 - i * 4)) & 0xF) as usize];
    }
    out
}

fn needs_escape(b: u8) -> bool {
    b == b'%' || b == DELIMITER || !(0x21..=0x7E).contains(&b)
}

pub fn percent_encode(input: &[u8], out: &mut Vec<u8>) {
    for &b in input {
        if needs_escape(b) {
            out.push(b'%');
            out.push(HEX[(b >> 4) as usize]);
            out.push(HEX[(b & 0xF) as usize]);
        } else {
            out.push(b);
        }
    }
}

pub fn percent_decode(input: &[u8]) -> Option<Vec<u8>> {
    fn nibble(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }

    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' {
            let hi = nibble(*input.get(i + 1)?)?;
            let lo = nibble(*input.get(i + 2)?)?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> KeyEncoder {
        KeyEncoder::new("__redis:complex")
    }

    #[test]
    fn test_encode_layout() {
        let enc = encoder();
        assert_eq!(enc.meta_key(b"queue"), b"__redis:complex:meta:queue".to_vec());
        assert_eq!(
            enc.node_key(b"queue", &sequence_identifier(17)),
            b"__redis:complex:node:queue:17".to_vec()
        );
        assert_eq!(
            enc.data_key(b"queue", &sequence_identifier(17)),
            b"__redis:complex:data:queue:17".to_vec()
        );
    }

    #[test]
    fn test_delimiter_escaped() {
        let enc = encoder();
        // "a:b" + id "c" must not collide with "a" + id "b:c"
        let first = enc.node_key(b"a:b", b"c");
        let second = enc.node_key(b"a", b"b:c");
        assert_ne!(first, second);
        assert_eq!(first, b"__redis:complex:node:a%3Ab:c".to_vec());
    }

    #[test]
    fn test_escape_non_printable_and_percent() {
        let mut out = Vec::new();
        percent_encode(b"50% \x00\xff", &mut out);
        assert_eq!(out, b"50%25%20%00%FF".to_vec());
        assert_eq!(percent_decode(&out).unwrap(), b"50% \x00\xff".to_vec());
    }

    #[test]
    fn test_decode_components() {
        let enc = encoder();
        let key = enc.node_key(b"user:1", b"x y");
        let (role, logical, id) = enc.decode(&key).unwrap();
        assert_eq!(role, Role::Node);
        assert_eq!(logical, b"user:1".to_vec());
        assert_eq!(id, Some(b"x y".to_vec()));

        let meta = enc.meta_key(b"k");
        assert_eq!(enc.decode(&meta), Some((Role::Meta, b"k".to_vec(), None)));
    }

    #[test]
    fn test_decode_invalid_key() {
        let enc = encoder();
        assert!(enc.decode(b"other:meta:k").is_none());
        assert!(enc.decode(b"__redis:complex:bogus:k").is_none());
        assert!(enc.decode(b"__redis:complex:meta:k%G1").is_none());
        assert!(enc.decode(b"__redis:complex:node:k:1:2").is_none());
    }

    #[test]
    fn test_prefix_isolates_keys() {
        let enc = encoder();
        let prefix = enc.prefix(Role::Node, b"ab");
        assert!(enc.node_key(b"ab", b"1").starts_with(&prefix));
        assert!(!enc.node_key(b"abc", b"1").starts_with(&prefix));
        assert!(!enc.value_key(b"ab").starts_with(&enc.prefix(Role::Data, b"ab")));
    }

    #[test]
    fn test_score_hex_preserves_order() {
        let scores = [
            f64::NEG_INFINITY,
            -1e10,
            -1.5,
            -0.0,
            0.0,
            1e-300,
            2.0,
            1e10,
            f64::INFINITY,
        ];
        let encoded: Vec<[u8; 16]> = scores.iter().map(|s| score_hex(*s)).collect();
        for pair in encoded.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
