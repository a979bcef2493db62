//! Strongly typed AniDB identifiers
//!
//! Every remote entity is addressed by a positive integer id. Zero is never
//! a valid id and is what the field parsers produce for missing values.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            /// Returns true for ids the server could have issued
            pub fn is_valid(self) -> bool {
                self.0 > 0
            }

            /// Converts a parsed protocol integer, mapping out-of-range values to zero
            pub fn from_field(value: i64) -> Self {
                Self(u32::try_from(value).unwrap_or(0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Anime ID
    Aid
);
id_type!(
    /// Episode ID
    Eid
);
id_type!(
    /// File ID
    Fid
);
id_type!(
    /// Group ID
    Gid
);
id_type!(
    /// User ID
    Uid
);
id_type!(
    /// MyList entry ID
    Lid
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_zero_is_invalid() {
        assert!(!Aid(0).is_valid());
        assert!(Aid(1).is_valid());
    }

    #[test]
    fn test_from_field_rejects_out_of_range() {
        assert_eq!(Fid::from_field(-5), Fid(0));
        assert_eq!(Fid::from_field(i64::from(u32::MAX) + 1), Fid(0));
        assert_eq!(Fid::from_field(42), Fid(42));
    }

    #[test]
    fn test_ids_as_json_map_keys() {
        let mut lids = BTreeMap::new();
        lids.insert(Uid(7), Lid(1234));

        let json = serde_json::to_string(&lids).unwrap();
        assert_eq!(json, r#"{"7":1234}"#);

        let back: BTreeMap<Uid, Lid> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lids);
    }
}
