use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Optimistic-concurrency stamp recorded with every saved record.
///
/// The store never compares versions itself; callers hold on to the
/// version returned by a save and check it before the next one.
/// The sequence is persisted as uppercase hexadecimal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Name of the user that performed the save.
    pub user: String,
    /// Monotonic sequence number.
    pub sequence: u64,
}

impl Version {
    /// Create a version with explicit values.
    pub fn new(user: impl Into<String>, sequence: u64) -> Self {
        Self {
            user: user.into(),
            sequence,
        }
    }

    /// The first version of a freshly created record.
    pub fn initial(user: impl Into<String>) -> Self {
        Self::new(user, 1)
    }

    /// The version following this one, stamped by `user`.
    ///
    /// Fails once the sequence has reached `u64::MAX`.
    pub fn next(&self, user: impl Into<String>) -> Result<Self, TypeError> {
        let sequence = self.sequence.checked_add(1).ok_or_else(|| {
            TypeError::InvalidSequence(format!("{} has no successor", self.sequence_hex()))
        })?;
        Ok(Self::new(user, sequence))
    }

    /// Same sequence, different acting user.
    pub fn stamped_by(&self, user: impl Into<String>) -> Self {
        Self::new(user, self.sequence)
    }

    /// Uppercase hex rendering of the sequence, without prefix.
    pub fn sequence_hex(&self) -> String {
        format!("{:X}", self.sequence)
    }

    /// Parse a hex sequence (either case).
    pub fn parse_sequence_hex(text: &str) -> Result<u64, TypeError> {
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidSequence(text.to_string()));
        }
        u64::from_str_radix(text, 16).map_err(|_| TypeError::InvalidSequence(text.to_string()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.sequence_hex(), self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_uppercase() {
        let v = Version::new("sven", 0x1a2b);
        assert_eq!(v.sequence_hex(), "1A2B");
    }

    #[test]
    fn parse_accepts_both_cases() {
        assert_eq!(Version::parse_sequence_hex("1A2B").unwrap(), 0x1a2b);
        assert_eq!(Version::parse_sequence_hex("1a2b").unwrap(), 0x1a2b);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Version::parse_sequence_hex("").is_err());
        assert!(Version::parse_sequence_hex("xyz").is_err());
        assert!(Version::parse_sequence_hex("+1").is_err());
        assert!(Version::parse_sequence_hex("1FFFFFFFFFFFFFFFF").is_err());
    }

    #[test]
    fn next_increments_and_restamps() {
        let v = Version::initial("alice");
        let n = v.next("bob").unwrap();
        assert_eq!(n.sequence, 2);
        assert_eq!(n.user, "bob");
    }

    #[test]
    fn next_fails_at_maximum_sequence() {
        let last = Version::new("alice", Version::parse_sequence_hex("FFFFFFFFFFFFFFFF").unwrap());
        assert!(matches!(last.next("bob"), Err(TypeError::InvalidSequence(_))));
    }

    #[test]
    fn display_format() {
        let v = Version::new("alice", 255);
        assert_eq!(v.to_string(), "#FF (alice)");
    }

    #[test]
    fn serde_roundtrip() {
        let v = Version::new("alice", 7);
        let json = serde_json::to_string(&v).unwrap();
        let parsed: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, v);
    }
}
