//! Opaque public resource identifiers.
//!
//! Stores hand out sequential integer keys; the API never shows them. A
//! public ID is `<prefix>-<body>` where `body` is a fixed-width base-36
//! rendering of a bijective 64-bit scramble of the key. The scramble is
//! salted per prefix, so `user` and `post` keys with the same value do not
//! even share a body. This is obfuscation, not encryption.

use thiserror::Error;

use crate::errorx::{Code, ErrorX, ERR_INVALID_ARGUMENT};

/// Symbols used for the body, in digit order.
const ALPHABET: &[u8; 36] = b"k3v8m1q9xw0z5rjb7ncl2yte4fupg6sdhaio";

/// 36^12 < 2^64 <= 36^13, so every u64 fits in exactly 13 symbols.
pub const BODY_LEN: usize = 13;

pub const MAX_PREFIX_LEN: usize = 16;

const SEPARATOR: char = '-';

const M1: u64 = 0xbf58_476d_1ce4_e5b9;
const M2: u64 = 0x94d0_49bb_1331_11eb;
const M1_INV: u64 = mod_inverse(M1);
const M2_INV: u64 = mod_inverse(M2);

const DIGITS: [u8; 256] = digit_table();

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RidError {
    #[error("invalid resource prefix '{0}': expected 1-16 chars of [a-z0-9]")]
    InvalidPrefix(String),

    #[error("malformed resource id '{0}'")]
    Malformed(String),

    #[error("resource id '{found}' does not belong to '{expected}'")]
    PrefixMismatch { expected: &'static str, found: String },

    #[error("store key {0} is outside the identifier domain")]
    OutOfRange(i64),
}

impl From<RidError> for ErrorX {
    fn from(err: RidError) -> Self {
        match err {
            RidError::OutOfRange(_) => {
                ErrorX::new(Code::Internal, "InternalError.IdOutOfRange", err.to_string())
            }
            other => ERR_INVALID_ARGUMENT.with_message(other.to_string()),
        }
    }
}

/// A kind of resource that gets public identifiers (users, posts, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    prefix: &'static str,
    salt: u64,
}

pub const USER: ResourceKind = ResourceKind::new("user");
pub const POST: ResourceKind = ResourceKind::new("post");

impl ResourceKind {
    /// Declare a resource kind. Invalid prefixes fail const evaluation.
    pub const fn new(prefix: &'static str) -> Self {
        assert!(is_valid_prefix(prefix), "resource prefix must be 1-16 chars of [a-z0-9]");
        Self {
            prefix,
            salt: fnv1a(prefix),
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Public identifier for `sequence`. Deterministic.
    pub fn encode(&self, sequence: u64) -> String {
        render(self.prefix, self.salt, sequence)
    }

    /// Public identifier for a store primary key.
    ///
    /// Store keys are signed; negative ones have no identifier.
    pub fn from_key(&self, key: i64) -> Result<String, RidError> {
        let sequence = u64::try_from(key).map_err(|_| RidError::OutOfRange(key))?;
        Ok(self.encode(sequence))
    }

    /// Recover the sequence from an identifier of this kind.
    pub fn decode(&self, id: &str) -> Result<u64, RidError> {
        let (prefix, body) = split(id)?;
        if prefix != self.prefix {
            return Err(RidError::PrefixMismatch {
                expected: self.prefix,
                found: id.to_string(),
            });
        }
        let scrambled = parse_body(body).ok_or_else(|| RidError::Malformed(id.to_string()))?;
        Ok(unscramble(scrambled, self.salt))
    }
}

/// Encode with a runtime prefix.
pub fn encode(prefix: &str, sequence: u64) -> Result<String, RidError> {
    if !is_valid_prefix(prefix) {
        return Err(RidError::InvalidPrefix(prefix.to_string()));
    }
    Ok(render(prefix, fnv1a(prefix), sequence))
}

/// Split any identifier back into `(prefix, sequence)`.
pub fn decode(id: &str) -> Result<(String, u64), RidError> {
    let (prefix, body) = split(id)?;
    let scrambled = parse_body(body).ok_or_else(|| RidError::Malformed(id.to_string()))?;
    Ok((prefix.to_string(), unscramble(scrambled, fnv1a(prefix))))
}

fn render(prefix: &str, salt: u64, sequence: u64) -> String {
    let mut v = scramble(sequence, salt);
    let mut body = [ALPHABET[0]; BODY_LEN];
    for slot in body.iter_mut().rev() {
        *slot = ALPHABET[(v % 36) as usize];
        v /= 36;
    }

    let mut out = String::with_capacity(prefix.len() + 1 + BODY_LEN);
    out.push_str(prefix);
    out.push(SEPARATOR);
    // ALPHABET is ASCII
    out.extend(body.iter().map(|&b| b as char));
    out
}

fn split(id: &str) -> Result<(&str, &str), RidError> {
    let (prefix, body) = id
        .split_once(SEPARATOR)
        .ok_or_else(|| RidError::Malformed(id.to_string()))?;
    if !is_valid_prefix(prefix) || body.len() != BODY_LEN {
        return Err(RidError::Malformed(id.to_string()));
    }
    Ok((prefix, body))
}

fn parse_body(body: &str) -> Option<u64> {
    body.bytes().try_fold(0u64, |acc, b| {
        let digit = DIGITS[b as usize];
        if digit == u8::MAX {
            return None;
        }
        acc.checked_mul(36)?.checked_add(u64::from(digit))
    })
}

fn scramble(x: u64, salt: u64) -> u64 {
    let mut z = x.wrapping_add(salt);
    z = (z ^ (z >> 30)).wrapping_mul(M1);
    z = (z ^ (z >> 27)).wrapping_mul(M2);
    z ^ (z >> 31)
}

fn unscramble(z: u64, salt: u64) -> u64 {
    let mut x = unshift(z, 31);
    x = unshift(x.wrapping_mul(M2_INV), 27);
    x = unshift(x.wrapping_mul(M1_INV), 30);
    x.wrapping_sub(salt)
}

/// Inverse of `x ^ (x >> k)`.
const fn unshift(y: u64, k: u32) -> u64 {
    let mut x = y;
    let mut i = 0;
    while i < 64 / k {
        x = y ^ (x >> k);
        i += 1;
    }
    x
}

/// Multiplicative inverse of an odd number modulo 2^64 (Newton iteration).
const fn mod_inverse(a: u64) -> u64 {
    let mut x = a;
    let mut i = 0;
    while i < 5 {
        x = x.wrapping_mul(2u64.wrapping_sub(a.wrapping_mul(x)));
        i += 1;
    }
    x
}

const fn fnv1a(s: &str) -> u64 {
    let bytes = s.as_bytes();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

const fn is_valid_prefix(prefix: &str) -> bool {
    let bytes = prefix.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_PREFIX_LEN {
        return false;
    }
    let mut i = 0;
    while i < bytes.len() {
        if !(bytes[i].is_ascii_lowercase() || bytes[i].is_ascii_digit()) {
            return false;
        }
        i += 1;
    }
    true
}

const fn digit_table() -> [u8; 256] {
    let mut table = [u8::MAX; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn inverses_are_correct() {
        assert_eq!(M1.wrapping_mul(M1_INV), 1);
        assert_eq!(M2.wrapping_mul(M2_INV), 1);
    }

    #[test]
    fn alphabet_has_no_duplicates() {
        let set: HashSet<u8> = ALPHABET.iter().copied().collect();
        assert_eq!(set.len(), 36);
    }

    #[test]
    fn encode_is_deterministic() {
        assert_eq!(USER.encode(42), USER.encode(42));
        assert_eq!(encode("user", 42).unwrap(), USER.encode(42));
    }

    #[test]
    fn ids_have_prefix_and_fixed_body() {
        let id = POST.encode(1);
        assert!(id.starts_with("post-"));
        assert_eq!(id.len(), "post-".len() + BODY_LEN);
    }

    #[test]
    fn sequential_keys_do_not_look_sequential() {
        let a = USER.encode(1);
        let b = USER.encode(2);
        let shared = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
        // only the prefix and separator line up
        assert!(shared < "user-".len() + 6, "{a} vs {b}");
    }

    #[test]
    fn same_key_differs_across_kinds() {
        let user = USER.encode(7);
        let post = POST.encode(7);
        assert_ne!(user, post);
        assert_ne!(&user["user-".len()..], &post["post-".len()..]);
    }

    #[test]
    fn extremes_round_trip() {
        for seq in [0, 1, u64::MAX, u64::MAX - 1, 1 << 63] {
            assert_eq!(USER.decode(&USER.encode(seq)).unwrap(), seq);
        }
    }

    #[test]
    fn negative_store_keys_are_rejected() {
        assert_eq!(USER.from_key(-1), Err(RidError::OutOfRange(-1)));
        assert_eq!(USER.from_key(5).unwrap(), USER.encode(5));

        let errx: ErrorX = RidError::OutOfRange(-1).into();
        assert_eq!(errx.code, 500);
        assert_eq!(errx.reason, "InternalError.IdOutOfRange");
    }

    #[test]
    fn decode_rejects_foreign_and_malformed_ids() {
        let post = POST.encode(3);
        assert!(matches!(USER.decode(&post), Err(RidError::PrefixMismatch { .. })));
        assert!(matches!(USER.decode("user"), Err(RidError::Malformed(_))));
        assert!(matches!(USER.decode("user-abc"), Err(RidError::Malformed(_))));
        assert!(matches!(USER.decode("user-ABCDEFGHIJKLM"), Err(RidError::Malformed(_))));
        assert!(matches!(decode("User-kkkkkkkkkkkkk"), Err(RidError::Malformed(_))));
        // 13 copies of the highest digit overflows u64
        assert!(matches!(USER.decode("user-ooooooooooooo"), Err(RidError::Malformed(_))));
    }

    #[test]
    fn decode_errors_classify_as_invalid_argument() {
        let errx: ErrorX = USER.decode("nope").unwrap_err().into();
        assert!(errx.is(&ERR_INVALID_ARGUMENT));
    }

    #[test]
    fn runtime_prefixes_are_validated() {
        assert!(matches!(encode("", 1), Err(RidError::InvalidPrefix(_))));
        assert!(matches!(encode("has-dash", 1), Err(RidError::InvalidPrefix(_))));
        assert!(matches!(encode("UPPER", 1), Err(RidError::InvalidPrefix(_))));
        assert!(matches!(encode("waytoolongprefix1", 1), Err(RidError::InvalidPrefix(_))));
        assert!(encode("comment2", 1).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        #[test]
        fn decode_recovers_prefix_and_sequence(prefix in "[a-z0-9]{1,16}", seq in any::<u64>()) {
            let id = encode(&prefix, seq).unwrap();
            let (p, s) = decode(&id).unwrap();
            prop_assert_eq!(p, prefix);
            prop_assert_eq!(s, seq);
        }

        #[test]
        fn distinct_sequences_never_collide(a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            prop_assert_ne!(USER.encode(a), USER.encode(b));
        }

        #[test]
        fn distinct_prefixes_never_collide(
            p1 in "[a-z0-9]{1,16}",
            p2 in "[a-z0-9]{1,16}",
            seq in any::<u64>(),
        ) {
            prop_assume!(p1 != p2);
            prop_assert_ne!(encode(&p1, seq).unwrap(), encode(&p2, seq).unwrap());
        }
    }
}
