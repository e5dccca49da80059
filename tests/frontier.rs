use std::collections::HashMap;

use bmssp_frontier::{BlockList, Cost, Error, NodeId, PullResult};
use proptest::prelude::*;

#[test]
fn mixed_workload() {
    let mut frontier = BlockList::new(3, 1e3);

    for key in 0..20 {
        frontier.insert(key, (100 - key) as Cost).unwrap();
    }
    assert_eq!(frontier.len(), 20);

    // Decrease-key: only improvements land.
    frontier.insert(5, 200.0).unwrap();
    frontier.insert(5, 1.0).unwrap();

    frontier.delete(19).unwrap();
    assert!(matches!(frontier.delete(19), Err(Error::InvalidArgument(_))));

    frontier.batch_prepend((30..40).map(|k| (k, k as Cost))).unwrap();
    assert_eq!(frontier.len(), 29);

    // Key 5 now holds 1.0, far below everything else.
    let PullResult(keys, _) = frontier.pull().unwrap();
    assert_eq!(keys.len(), 3);
    assert!(keys.contains(&5));

    let mut seen = keys.len();
    while !frontier.is_empty() {
        let PullResult(keys, _) = frontier.pull().unwrap();
        seen += keys.len();
    }
    assert_eq!(seen, 29);

    let PullResult(keys, watermark) = frontier.pull().unwrap();
    assert!(keys.is_empty());
    assert_eq!(watermark, 1e3);
}

proptest! {
    // Insert-only workloads drain in globally non-decreasing batches, with
    // the watermark tracking the smallest value left after each pull.
    #[test]
    fn pulls_are_ordered_batches(
        subset_size in 1..8usize,
        values in prop::collection::vec(0..1000u16, 1..120),
    ) {
        const CEILING: Cost = 1e6;
        let mut frontier = BlockList::new(subset_size, CEILING);
        let mut model: HashMap<NodeId, Cost> = HashMap::new();
        for (key, value) in values.into_iter().enumerate() {
            let value = Cost::from(value);
            frontier.insert(key, value).unwrap();
            model.insert(key, value);
        }

        let pull_size = subset_size.max(1);
        let mut previous_max = f64::NEG_INFINITY;
        while !frontier.is_empty() {
            let PullResult(keys, watermark) = frontier.pull().unwrap();
            prop_assert_eq!(keys.len(), pull_size.min(model.len()));

            let mut batch_max = f64::NEG_INFINITY;
            for key in keys {
                let value = model.remove(&key);
                prop_assert!(value.is_some(), "pulled an unknown key");
                let value = value.unwrap();
                prop_assert!(value >= previous_max, "batches out of order");
                batch_max = batch_max.max(value);
            }
            previous_max = batch_max;

            let remaining_min = model
                .values()
                .fold(CEILING, |acc, &v| acc.min(v));
            prop_assert_eq!(watermark, remaining_min);
            prop_assert!(batch_max <= watermark);
        }
        prop_assert!(model.is_empty());
    }
}
