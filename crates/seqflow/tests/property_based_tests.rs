//! Property-based tests for pipeline laws.
use proptest::prelude::*;
use rustc_hash::FxHashSet;
use seqflow::{Optional, Pipeline};

mod strategies {
    use super::*;

    pub fn elements() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(-50i32..50, 0..200)
    }

    /// A sequence of stages applied in order: (kind, argument).
    pub fn stages() -> impl Strategy<Value = Vec<(u8, i32)>> {
        prop::collection::vec((0u8..4, 0i32..10), 0..6)
    }
}

/// Applies `stages` to a plain `Vec`, mirroring the pipeline semantics.
fn apply_to_vec(mut elements: Vec<i32>, stages: &[(u8, i32)]) -> Vec<i32> {
    for &(kind, arg) in stages {
        elements = match kind {
            0 => elements.into_iter().filter(|n| n % (arg + 2) != 0).collect(),
            1 => {
                let mut seen = FxHashSet::default();
                elements.into_iter().filter(|n| seen.insert(*n)).collect()
            }
            2 => elements.into_iter().take(arg as usize).collect(),
            _ => elements.into_iter().skip(arg as usize).collect(),
        };
    }
    elements
}

fn apply_to_pipeline(elements: Vec<i32>, stages: &[(u8, i32)]) -> Pipeline<'static, i32> {
    stages
        .iter()
        .fold(Pipeline::of(elements), |pipeline, &(kind, arg)| match kind {
            0 => pipeline.filter(move |n| n % (arg + 2) != 0),
            1 => pipeline.distinct(),
            2 => pipeline.limit(arg as usize),
            _ => pipeline.skip(arg as usize),
        })
}

proptest! {
    #[test]
    fn count_matches_surviving_elements(elements in strategies::elements(), stages in strategies::stages()) {
        let expected = apply_to_vec(elements.clone(), &stages);
        let pipeline = apply_to_pipeline(elements, &stages);
        prop_assert_eq!(pipeline.count(), Ok(expected.len()));
    }

    #[test]
    fn stage_chain_preserves_encounter_order(elements in strategies::elements(), stages in strategies::stages()) {
        let expected = apply_to_vec(elements.clone(), &stages);
        prop_assert_eq!(apply_to_pipeline(elements, &stages).to_vec(), Ok(expected));
    }

    #[test]
    fn distinct_keeps_first_occurrences(elements in strategies::elements()) {
        let distinct = Pipeline::of(elements.clone()).distinct().to_vec().unwrap();

        let unique = distinct.iter().collect::<FxHashSet<_>>();
        prop_assert_eq!(unique.len(), distinct.len());
        for (i, element) in distinct.iter().enumerate() {
            let first = elements.iter().position(|e| e == element).unwrap();
            let before = &elements[..first];
            prop_assert!(before.iter().all(|e| distinct[..i].contains(e)));
        }
    }

    #[test]
    fn sorted_is_idempotent(elements in strategies::elements()) {
        let once = Pipeline::of(elements.clone()).sorted().to_vec();
        let twice = Pipeline::of(elements).sorted().sorted().to_vec();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sorted_by_is_stable(elements in prop::collection::vec((0i32..5, any::<u16>()), 0..100)) {
        let sorted = Pipeline::of(elements.clone()).sorted_by(|a, b| a.0.cmp(&b.0)).to_vec();
        let mut expected = elements;
        expected.sort_by_key(|e| e.0);
        prop_assert_eq!(sorted, Ok(expected));
    }

    #[test]
    fn reduce_folds_left(elements in strategies::elements()) {
        let reduced = Pipeline::of(elements.clone()).reduce(|a, b| a.wrapping_mul(3).wrapping_sub(b));
        let expected = elements.into_iter().reduce(|a, b| a.wrapping_mul(3).wrapping_sub(b));
        prop_assert_eq!(reduced, Ok(Optional::from(expected)));
    }

    #[test]
    fn reduce_from_identity(identity in any::<i32>(), element in proptest::option::of(any::<i32>())) {
        let input = element.into_iter().collect::<Vec<_>>();
        let expected = match element {
            Some(x) => identity.wrapping_add(x),
            None => identity,
        };
        prop_assert_eq!(Pipeline::of(input).reduce_from(identity, i32::wrapping_add), Ok(expected));
    }

    #[test]
    fn skip_then_limit_on_iterate(skip in 0usize..100, limit in 0usize..100) {
        let taken = Pipeline::iterate(1u64, |n| n + 1).skip(skip).limit(limit).to_vec();
        let expected = (1u64..).skip(skip).take(limit).collect::<Vec<_>>();
        prop_assert_eq!(taken, Ok(expected));
    }

    #[test]
    fn min_max_agree_with_iterator(elements in strategies::elements()) {
        let min = Pipeline::of(elements.clone()).min();
        let max = Pipeline::of(elements.clone()).max();
        prop_assert_eq!(min, Ok(Optional::from(elements.iter().copied().min())));
        prop_assert_eq!(max, Ok(Optional::from(elements.iter().copied().max())));
    }
}

#[cfg(feature = "parallel")]
proptest! {
    #[test]
    fn parallel_agrees_with_sequential(
        elements in strategies::elements(),
        partitions in 1usize..9,
    ) {
        use seqflow::{Options, ParallelPipeline, collectors};

        let options = Options { partitions, min_partition_len: 1 };

        let sequential = Pipeline::of(elements.clone())
            .filter(|n| n % 3 != 0)
            .map(|n| n * 2)
            .distinct()
            .to_vec();
        let parallel = ParallelPipeline::with_options(elements.clone(), options.clone())
            .filter(|n| n % 3 != 0)
            .map(|n| n * 2)
            .distinct()
            .to_vec();
        prop_assert_eq!(parallel, sequential);

        let sum = ParallelPipeline::with_options(elements.clone(), options.clone())
            .reduce_with(0i64, |acc, n| acc + i64::from(n), |a, b| a + b);
        prop_assert_eq!(sum, Ok(elements.iter().map(|n| i64::from(*n)).sum::<i64>()));

        let sorted = ParallelPipeline::with_options(elements.clone(), options.clone())
            .sorted()
            .collect(&collectors::to_list());
        let mut expected = elements.clone();
        expected.sort();
        prop_assert_eq!(sorted, Ok(expected));

        let min = ParallelPipeline::with_options(elements.clone(), options).min();
        prop_assert_eq!(min, Ok(Optional::from(elements.iter().copied().min())));
    }
}
