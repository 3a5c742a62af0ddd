use crate::error::TypesError;
use derive_more::{Display, From, Into};
use std::str::FromStr;

/// Block or step height at which a state transition is committed.
///
/// Snapshot queries are answered "as of the end of" a timepoint.
pub type Timepoint = u64;

/// Opaque identifier of one admitted participant.
///
/// Ids are externally meaningful numbers (e.g. national registry numbers),
/// so they are allocated by the census, never by the registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, From, Into)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct IdentityId(u64);

impl IdentityId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Big-endian encoding used when the id is committed into a hash.
    pub const fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl std::fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityId({})", self.0)
    }
}

impl FromStr for IdentityId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse::<u64>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_id_conversions() {
        let id = IdentityId::from(9_111_111_983u64);
        assert_eq!(id.value(), 9_111_111_983);
        assert_eq!(u64::from(id), 9_111_111_983);
        assert_eq!(id.to_string(), "9111111983");
    }

    #[test]
    fn test_identity_id_parse() {
        let id: IdentityId = "5380007180".parse().unwrap();
        assert_eq!(id, IdentityId::new(5_380_007_180));
        assert!("-1".parse::<IdentityId>().is_err());
    }

    #[test]
    fn test_identity_id_be_bytes() {
        assert_eq!(IdentityId::new(1).to_be_bytes(), [0, 0, 0, 0, 0, 0, 0, 1]);
    }
}
