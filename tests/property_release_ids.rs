// tests/property_release_ids.rs

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use shipyard::release::ReleaseId;

fn commit() -> impl Strategy<Value = String> {
    "[0-9a-f]{7,40}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// String order of identifiers is creation order.
    #[test]
    fn string_order_matches_creation_order(
        a in 0i64..4_102_444_800,
        b in 0i64..4_102_444_800,
        ca in commit(),
        cb in commit(),
    ) {
        let ta = Utc.timestamp_opt(a, 0).unwrap();
        let tb = Utc.timestamp_opt(b, 0).unwrap();
        let ia = ReleaseId::new("release", ta, &ca).unwrap();
        let ib = ReleaseId::new("release", tb, &cb).unwrap();

        if a < b {
            prop_assert!(ia.to_string() < ib.to_string());
            prop_assert!(ia < ib);
        }
        prop_assert_eq!(ia.created_at(), ta);
    }

    /// The originating commit is recoverable from the identifier alone.
    #[test]
    fn identifier_names_its_commit(secs in 0i64..4_102_444_800, c in commit()) {
        let id = ReleaseId::new("release", Utc.timestamp_opt(secs, 0).unwrap(), &c).unwrap();
        let parsed: ReleaseId = id.to_string().parse().unwrap();

        prop_assert!(parsed.names_commit(&c));
        prop_assert_eq!(parsed.short_commit(), &c[..7]);
        prop_assert_eq!(parsed, id);
    }
}
