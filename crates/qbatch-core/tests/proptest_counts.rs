//! Property-based tests for counts-key normalization.

use std::collections::HashMap;

use proptest::prelude::*;
use qbatch_core::{normalize_counts, normalize_key};

/// Binary strings, optionally split into space-separated registers.
fn arb_bitstring() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), 1..=8), 1..=4).prop_map(
        |registers| {
            registers
                .iter()
                .map(|bits| bits.iter().map(|b| if *b { '1' } else { '0' }).collect::<String>())
                .collect::<Vec<_>>()
                .join(" ")
        },
    )
}

proptest! {
    #[test]
    fn normalized_key_matches_integer_value(key in arb_bitstring()) {
        let bits: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        let value = u64::from_str_radix(&bits, 2).unwrap();
        prop_assert_eq!(normalize_key(&key), Some(format!("{value:#x}")));
    }

    #[test]
    fn totals_survive_normalization(
        counts in prop::collection::hash_map(arb_bitstring(), 1u64..1000, 0..16)
    ) {
        let normalized = normalize_counts(&counts).unwrap();
        prop_assert_eq!(
            normalized.values().sum::<u64>(),
            counts.values().sum::<u64>()
        );
        prop_assert!(normalized.keys().all(|k| k.starts_with("0x")));
    }

    #[test]
    fn non_binary_keys_are_rejected(key in "[0-9a-z]*[2-9a-z][0-9a-z]*") {
        let counts: HashMap<String, u64> = [(key, 1)].into_iter().collect();
        prop_assert!(normalize_counts(&counts).is_none());
    }
}
