use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Keys drawn from a narrow domain so duplicates are common.
fn keys_strategy() -> impl Strategy<Value = Vec<u32>> {
    let key = prop_oneof![
        3 => 0u32..64,
        1 => any::<u32>(),
    ];
    prop::collection::vec(key, 0..=3000)
}

fn build(
    keys: &[u32],
    num_layers: usize,
    block_capacity: u64,
) -> (Arc<TupleTable<u32, u32>>, FastIndex<u32, u32>) {
    let table = Arc::new(TupleTable::with_block_capacity(block_capacity).unwrap());
    for (i, &k) in keys.iter().enumerate() {
        table.insert(k, i as u32);
    }
    let mut index = FastIndex::new(Arc::clone(&table), num_layers).unwrap();
    index.reorganize();
    (table, index)
}

fn values(table: &TupleTable<u32, u32>, addresses: Vec<Address>) -> Vec<u32> {
    let mut out: Vec<u32> = addresses.into_iter().map(|a| table.resolve_value(a)).collect();
    out.sort_unstable();
    out
}

fn model(keys: &[u32]) -> BTreeMap<u32, Vec<u32>> {
    let mut m: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (i, &k) in keys.iter().enumerate() {
        m.entry(k).or_default().push(i as u32);
    }
    m
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_address_round_trip(
        block_id in 0..=Address::MAX_BLOCK_ID,
        rel_offset in 0..=Address::MAX_REL_OFFSET,
    ) {
        let a = Address::new(block_id, rel_offset);
        prop_assert_eq!(a.decode(), (block_id, rel_offset));
        prop_assert_eq!(Address::from_raw(a.raw()), a);
        prop_assert_eq!(a.to_string(), format!("{block_id}.{rel_offset}"));
    }

    #[test]
    fn prop_find_matches_model(
        keys in keys_strategy(),
        layers in prop::sample::select(vec![0usize, 4, 8, 12]),
        block_capacity in 1u64..200,
        probes in prop::collection::vec(0u32..80, 1..50),
    ) {
        let (table, index) = build(&keys, layers, block_capacity);
        let m = model(&keys);

        prop_assert_eq!(index.len(), keys.len());
        for &k in m.keys().chain(probes.iter()) {
            let want = m.get(&k).cloned().unwrap_or_default();
            prop_assert_eq!(values(&table, index.find(k)), want, "key {} layers {}", k, layers);
        }
    }

    #[test]
    fn prop_layer_counts_agree(
        keys in keys_strategy(),
        probes in prop::collection::vec(any::<u32>(), 1..50),
    ) {
        let (table_a, plain) = build(&keys, 0, 1000);
        let (table_b, fast) = build(&keys, 8, 1000);

        for &k in keys.iter().take(50).chain(probes.iter()) {
            prop_assert_eq!(values(&table_a, plain.find(k)), values(&table_b, fast.find(k)));
        }
    }

    #[test]
    fn prop_range_matches_model(
        keys in keys_strategy(),
        layers in prop::sample::select(vec![0usize, 4, 8]),
        bounds in prop::collection::vec((0u32..100, 0u32..100), 1..20),
    ) {
        let (table, index) = build(&keys, layers, 1000);
        let m = model(&keys);

        for (a, b) in bounds {
            let (lo, hi) = (a.min(b), a.max(b));
            let mut want: Vec<u32> =
                m.range(lo..=hi).flat_map(|(_, v)| v.iter().copied()).collect();
            want.sort_unstable();
            let got = values(&table, index.find_range(lo, hi));
            prop_assert_eq!(got, want, "range [{}, {}]", lo, hi);
        }
    }
}
