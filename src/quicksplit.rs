/*
Deterministic order-statistics selection. quicksplit partitions a sequence
into exactly `lower_count` smallest values and the rest without sorting,
picking pivots via median-of-medians so the whole split is worst-case
linear time rather than expected linear time.

The dict variant runs the same loop over (key, value) pairs and preserves
key identity through partitioning; it is what the frontier uses for D0
bucketing and for trimming pull candidates.
*/

use fnv::FnvHashMap;
use ordered_float::OrderedFloat;

use crate::error::{Error, Result};
use crate::{Cost, NodeId};

pub const DEFAULT_GROUP_SIZE: usize = 5;

/// How an even-length median resolves: the mean of the two middle values,
/// or the lower one when an actual element is required.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TiePolicy {
    Average,
    Lower,
}

/// Median of a non-empty slice. Empty input is a usage error.
pub fn median(values: &[Cost], tie: TiePolicy) -> Result<Cost> {
    if values.is_empty() {
        return Err(Error::invalid_argument("median of an empty slice"));
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by_key(|&v| OrderedFloat(v));
    let idx = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Ok(sorted[idx])
    } else {
        match tie {
            TiePolicy::Average => Ok((sorted[idx - 1] + sorted[idx]) / 2.0),
            TiePolicy::Lower => Ok(sorted[idx - 1]),
        }
    }
}

/// Deterministic pivot selection: groups of `group_size` are reduced to
/// their medians (a short remainder group via a plain median first), and
/// the survivor list is reduced again until one direct median remains.
/// `group_size` must be odd so each full group has an exact middle element.
pub fn median_of_medians(values: &[Cost], group_size: usize, tie: TiePolicy) -> Result<Cost> {
    if group_size % 2 == 0 {
        return Err(Error::invalid_argument("group_size must be an odd number"));
    }
    let group_mid = group_size / 2;

    let mut arr = values.to_vec();
    loop {
        if arr.len() <= group_size {
            return median(&arr, tie);
        }
        let mut extra = None;
        let rem = arr.len() % group_size;
        if rem != 0 {
            let tail = arr.split_off(arr.len() - rem);
            extra = Some(median(&tail, TiePolicy::Average)?);
        }
        let mut medians: Vec<Cost> = arr
            .chunks(group_size)
            .map(|group| {
                let mut group = group.to_vec();
                group.sort_unstable_by_key(|&v| OrderedFloat(v));
                group[group_mid]
            })
            .collect();
        if let Some(extra) = extra {
            medians.push(extra);
        }
        arr = medians;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Split {
    pub lower: Vec<Cost>,
    pub higher: Vec<Cost>,
    /// Tight boundary: every value in `lower` is <= pivot and every value in
    /// `higher` is >= pivot.
    pub pivot: Cost,
}

#[derive(Clone, Debug)]
pub struct DictSplit {
    pub lower: FnvHashMap<NodeId, Cost>,
    pub higher: FnvHashMap<NodeId, Cost>,
    pub pivot: Cost,
}

fn check_lower_count(lower_count: usize, len: usize) -> Result<()> {
    if lower_count == 0 || lower_count > len {
        return Err(Error::invalid_argument(format!(
            "lower_count must be in 1..={len}, got {lower_count}"
        )));
    }
    Ok(())
}

/// Partitions `values` into exactly `lower_count` smallest values and the
/// remainder, together with the boundary value separating the two.
pub fn quicksplit(values: &[Cost], lower_count: usize) -> Result<Split> {
    check_lower_count(lower_count, values.len())?;

    let mut arr = values.to_vec();
    let mut lower: Vec<Cost> = Vec::new();
    let mut higher: Vec<Cost> = Vec::new();

    loop {
        let pivot = median_of_medians(&arr, DEFAULT_GROUP_SIZE, TiePolicy::Lower)?;

        let mut below = Vec::new();
        let mut equal = Vec::new();
        let mut above = Vec::new();
        for &x in &arr {
            if x < pivot {
                below.push(x);
            } else if x > pivot {
                above.push(x);
            } else {
                equal.push(x);
            }
        }

        let committed = lower.len() + below.len();
        if lower_count < committed {
            // Target sits inside the below group.
            higher.extend_from_slice(&equal);
            higher.extend_from_slice(&above);
            arr = below;
        } else if lower_count > committed + equal.len() {
            // Target sits inside the above group.
            lower.append(&mut below);
            lower.append(&mut equal);
            arr = above;
        } else {
            // Target lands inside the equal group: cut it by position.
            let cut = lower_count - committed;
            let pivot = if cut == 0 && !below.is_empty() {
                // The equal group contributed nothing to `lower`; the tight
                // achievable boundary is the top of the below group.
                below
                    .iter()
                    .copied()
                    .max_by_key(|&v| OrderedFloat(v))
                    .expect("non-empty below group")
            } else {
                pivot
            };
            lower.append(&mut below);
            lower.extend_from_slice(&equal[..cut]);
            higher.extend_from_slice(&equal[cut..]);
            higher.append(&mut above);
            return Ok(Split { lower, higher, pivot });
        }
    }
}

/// `quicksplit` over key-value pairs. Partitioning compares values only;
/// keys ride along. The input map is materialized in key order first so
/// equal-value ties cut deterministically.
pub fn quicksplit_dict(pairs: &FnvHashMap<NodeId, Cost>, lower_count: usize) -> Result<DictSplit> {
    check_lower_count(lower_count, pairs.len())?;

    let mut arr: Vec<(NodeId, Cost)> = pairs.iter().map(|(&k, &v)| (k, v)).collect();
    arr.sort_unstable_by_key(|&(k, _)| k);
    let mut lower: Vec<(NodeId, Cost)> = Vec::new();
    let mut higher: Vec<(NodeId, Cost)> = Vec::new();

    loop {
        let values: Vec<Cost> = arr.iter().map(|&(_, v)| v).collect();
        let pivot = median_of_medians(&values, DEFAULT_GROUP_SIZE, TiePolicy::Lower)?;

        let mut below = Vec::new();
        let mut equal = Vec::new();
        let mut above = Vec::new();
        for &(k, v) in &arr {
            if v < pivot {
                below.push((k, v));
            } else if v > pivot {
                above.push((k, v));
            } else {
                equal.push((k, v));
            }
        }

        let committed = lower.len() + below.len();
        if lower_count < committed {
            higher.extend_from_slice(&equal);
            higher.extend_from_slice(&above);
            arr = below;
        } else if lower_count > committed + equal.len() {
            lower.append(&mut below);
            lower.append(&mut equal);
            arr = above;
        } else {
            let cut = lower_count - committed;
            let pivot = if cut == 0 && !below.is_empty() {
                below
                    .iter()
                    .map(|&(_, v)| v)
                    .max_by_key(|&v| OrderedFloat(v))
                    .expect("non-empty below group")
            } else {
                pivot
            };
            lower.append(&mut below);
            lower.extend_from_slice(&equal[..cut]);
            higher.extend_from_slice(&equal[cut..]);
            higher.append(&mut above);
            return Ok(DictSplit {
                lower: lower.into_iter().collect(),
                higher: higher.into_iter().collect(),
                pivot,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0], TiePolicy::Lower).unwrap(), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0], TiePolicy::Average).unwrap(), 2.5);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0], TiePolicy::Lower).unwrap(), 2.0);
    }

    #[test]
    fn median_of_empty_is_rejected() {
        assert!(matches!(
            median(&[], TiePolicy::Lower),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn even_group_size_is_rejected() {
        assert!(matches!(
            median_of_medians(&[1.0, 2.0], 4, TiePolicy::Lower),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn median_of_medians_is_a_reasonable_pivot() {
        let values: Vec<Cost> = (0..100).map(|i| f64::from((i * 37) % 100)).collect();
        let pivot = median_of_medians(&values, 5, TiePolicy::Lower).unwrap();
        let below = values.iter().filter(|&&v| v < pivot).count();
        let above = values.iter().filter(|&&v| v > pivot).count();
        // The 7n/10 + 6 guarantee for groups of five.
        assert!(below <= 76, "pivot too high: {below} below");
        assert!(above <= 76, "pivot too low: {above} above");
    }

    #[test]
    fn quicksplit_worked_example() {
        let split = quicksplit(&[5.0, 3.0, 8.0, 1.0, 9.0, 2.0], 3).unwrap();
        let mut lower = split.lower.clone();
        lower.sort_unstable_by_key(|&v| OrderedFloat(v));
        let mut higher = split.higher.clone();
        higher.sort_unstable_by_key(|&v| OrderedFloat(v));
        assert_eq!(lower, vec![1.0, 2.0, 3.0]);
        assert_eq!(higher, vec![5.0, 8.0, 9.0]);
        assert_eq!(split.pivot, 3.0);
    }

    #[test]
    fn quicksplit_all_ties() {
        let split = quicksplit(&[7.0; 6], 2).unwrap();
        assert_eq!(split.lower.len(), 2);
        assert_eq!(split.higher.len(), 4);
        assert_eq!(split.pivot, 7.0);
    }

    #[test]
    fn quicksplit_bounds_are_rejected() {
        assert!(quicksplit(&[1.0, 2.0], 0).is_err());
        assert!(quicksplit(&[1.0, 2.0], 3).is_err());
        assert!(quicksplit_dict(&FnvHashMap::default(), 1).is_err());
    }

    #[test]
    fn dict_split_preserves_key_identity() {
        let pairs: FnvHashMap<NodeId, Cost> =
            [(10, 5.0), (11, 3.0), (12, 8.0), (13, 1.0)].into_iter().collect();
        let split = quicksplit_dict(&pairs, 2).unwrap();
        let mut lower_keys: Vec<NodeId> = split.lower.keys().copied().collect();
        lower_keys.sort_unstable();
        assert_eq!(lower_keys, vec![11, 13]);
        assert_eq!(split.lower[&11], 3.0);
        assert_eq!(split.lower[&13], 1.0);
        assert_eq!(split.higher.len(), 2);
    }

    #[test]
    fn dict_split_ties_cut_by_key_order() {
        let pairs: FnvHashMap<NodeId, Cost> =
            [(3, 2.0), (1, 2.0), (2, 2.0), (4, 9.0)].into_iter().collect();
        let split = quicksplit_dict(&pairs, 2).unwrap();
        let mut lower_keys: Vec<NodeId> = split.lower.keys().copied().collect();
        lower_keys.sort_unstable();
        // Equal values split by position over the key-sorted input.
        assert_eq!(lower_keys, vec![1, 2]);
        assert_eq!(split.pivot, 2.0);
    }

    proptest! {
        #[test]
        fn split_is_an_exact_partition(
            values in prop::collection::vec(0..1000u32, 1..200),
            seed in any::<usize>(),
        ) {
            let values: Vec<Cost> = values.into_iter().map(f64::from).collect();
            let lower_count = 1 + seed % values.len();
            let split = quicksplit(&values, lower_count).unwrap();

            prop_assert_eq!(split.lower.len(), lower_count);
            prop_assert_eq!(split.lower.len() + split.higher.len(), values.len());

            // lower <= pivot <= higher
            for &v in &split.lower {
                prop_assert!(v <= split.pivot);
            }
            for &v in &split.higher {
                prop_assert!(v >= split.pivot);
            }

            // lower + higher is a permutation of the input
            let mut merged: Vec<OrderedFloat<Cost>> = split
                .lower
                .iter()
                .chain(split.higher.iter())
                .map(|&v| OrderedFloat(v))
                .collect();
            merged.sort_unstable();
            let mut expected: Vec<OrderedFloat<Cost>> =
                values.iter().map(|&v| OrderedFloat(v)).collect();
            expected.sort_unstable();
            prop_assert_eq!(merged, expected);
        }
    }
}
