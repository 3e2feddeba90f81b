//! Terminal operations.
//!
//! Each terminal drives the stage chain through repeated pulls until the
//! sequence ends, the result is decided (short-circuit), or a stage fails.
//! Exhaustive terminals refuse to start on an unbounded pipeline.
use std::{cmp::Ordering, iter::Sum};

use crate::{
    collector::Collector,
    error::{Error, Result},
    optional::Optional,
    pipeline::{Demand, Driver, Pipeline},
    source::Pull,
    stage,
};

impl<'a, T: 'a> Pipeline<'a, T> {
    /// Counts the elements. Fails with [`Error::InfiniteSource`] on an unbounded pipeline.
    pub fn count(&self) -> Result<usize> {
        let mut driver = self.drive("count", Demand::Exhaustive)?;
        let mut count = 0;
        while driver.pull()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Returns the smallest element per `comparator`; the first encountered wins ties.
    pub fn min_by(&self, mut comparator: impl FnMut(&T, &T) -> Ordering) -> Result<Optional<T>> {
        self.select("min_by", |candidate, best| {
            Ok(best.is_none_or(|best| comparator(candidate, best) == Ordering::Less))
        })
    }

    /// Returns the largest element per `comparator`; the first encountered wins ties.
    pub fn max_by(&self, mut comparator: impl FnMut(&T, &T) -> Ordering) -> Result<Optional<T>> {
        self.select("max_by", |candidate, best| {
            Ok(best.is_none_or(|best| comparator(candidate, best) == Ordering::Greater))
        })
    }

    /// Natural-order minimum. Fails with [`Error::NotComparable`] on an unordered
    /// element or pair, even when the pipeline holds a single element.
    pub fn min(&self) -> Result<Optional<T>>
    where
        T: PartialOrd,
    {
        self.select("min", |candidate, best| {
            stage::natural_replaces(candidate, best, Ordering::Less)
                .ok_or(Error::NotComparable { operation: "min" })
        })
    }

    /// Natural-order maximum. Fails with [`Error::NotComparable`] on an unordered
    /// element or pair, even when the pipeline holds a single element.
    pub fn max(&self) -> Result<Optional<T>>
    where
        T: PartialOrd,
    {
        self.select("max", |candidate, best| {
            stage::natural_replaces(candidate, best, Ordering::Greater)
                .ok_or(Error::NotComparable { operation: "max" })
        })
    }

    /// `replaces` sees every element, with `None` as the best before the first one.
    fn select(
        &self,
        operation: &'static str,
        mut replaces: impl FnMut(&T, Option<&T>) -> Result<bool>,
    ) -> Result<Optional<T>> {
        let mut driver = self.drive(operation, Demand::Exhaustive)?;
        let mut best = None;
        while let Some(element) = driver.pull()? {
            if replaces(&element, best.as_ref())? {
                best = Some(element);
            }
        }
        Ok(best.into())
    }

    /// Returns any element, pulling at most once.
    pub fn find_any(&self) -> Result<Optional<T>> {
        let mut driver = self.drive("find_any", Demand::ShortCircuit)?;
        Ok(driver.pull()?.into())
    }

    /// Returns the first element in encounter order, pulling at most once.
    pub fn find_first(&self) -> Result<Optional<T>> {
        let mut driver = self.drive("find_first", Demand::ShortCircuit)?;
        Ok(driver.pull()?.into())
    }

    /// Returns `true` at the first element satisfying `predicate`; `false` on exhaustion.
    pub fn any_match(&self, mut predicate: impl FnMut(&T) -> bool) -> Result<bool> {
        let mut driver = self.drive("any_match", Demand::ShortCircuit)?;
        while let Some(element) = driver.pull()? {
            if predicate(&element) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns `false` at the first element failing `predicate`; `true` on exhaustion.
    pub fn all_match(&self, mut predicate: impl FnMut(&T) -> bool) -> Result<bool> {
        let mut driver = self.drive("all_match", Demand::ShortCircuit)?;
        while let Some(element) = driver.pull()? {
            if !predicate(&element) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns `false` at the first element satisfying `predicate`; `true` on exhaustion.
    pub fn none_match(&self, mut predicate: impl FnMut(&T) -> bool) -> Result<bool> {
        let mut driver = self.drive("none_match", Demand::ShortCircuit)?;
        while let Some(element) = driver.pull()? {
            if predicate(&element) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Invokes `observer` once per element, in pull order.
    pub fn for_each(&self, mut observer: impl FnMut(T)) -> Result<()> {
        let mut driver = self.drive("for_each", Demand::Exhaustive)?;
        while let Some(element) = driver.pull()? {
            observer(element);
        }
        Ok(())
    }

    /// Left fold starting from `identity`. Returns `identity` for an empty pipeline.
    pub fn reduce_from(&self, identity: T, mut op: impl FnMut(T, T) -> T) -> Result<T> {
        let mut driver = self.drive("reduce_from", Demand::Exhaustive)?;
        fold(&mut driver, identity, |acc, element| op(acc, element))
    }

    /// Left fold seeded with the first element.
    ///
    /// Empty for an empty pipeline, the sole element for a single-element one.
    pub fn reduce(&self, mut op: impl FnMut(T, T) -> T) -> Result<Optional<T>> {
        let mut driver = self.drive("reduce", Demand::Exhaustive)?;
        match driver.pull()? {
            Some(first) => fold(&mut driver, first, |acc, element| op(acc, element)).map(Optional::of),
            None => Ok(Optional::empty()),
        }
    }

    /// Folds into an accumulator of a different type.
    ///
    /// `combiner` merges two partial accumulations. Sequential evaluation has a
    /// single partition, so it is never invoked here; it is accepted so the same
    /// call site works with [`ParallelPipeline::reduce_with`](crate::ParallelPipeline::reduce_with).
    pub fn reduce_with<U>(
        &self,
        identity: U,
        accumulator: impl FnMut(U, T) -> U,
        _combiner: impl Fn(U, U) -> U,
    ) -> Result<U> {
        let mut driver = self.drive("reduce_with", Demand::Exhaustive)?;
        fold(&mut driver, identity, accumulator)
    }

    /// Mutable reduction into a container made by `supplier`.
    ///
    /// As with [`Pipeline::reduce_with`], `combiner` is never invoked sequentially.
    pub fn collect_with<R>(
        &self,
        supplier: impl FnOnce() -> R,
        mut accumulator: impl FnMut(&mut R, T),
        _combiner: impl Fn(&mut R, R),
    ) -> Result<R> {
        let mut driver = self.drive("collect_with", Demand::Exhaustive)?;
        let mut container = supplier();
        while let Some(element) = driver.pull()? {
            accumulator(&mut container, element);
        }
        Ok(container)
    }

    /// Mutable reduction through a reusable [`Collector`].
    pub fn collect<A, R>(&self, collector: &Collector<T, A, R>) -> Result<R> {
        let mut driver = self.drive("collect", Demand::Exhaustive)?;
        let mut container = collector.supply();
        while let Some(element) = driver.pull()? {
            collector.accumulate(&mut container, element);
        }
        Ok(collector.finish(container))
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut driver = self.drive("to_vec", Demand::Exhaustive)?;
        let mut elements = Vec::new();
        while let Some(element) = driver.pull()? {
            elements.push(element);
        }
        Ok(elements)
    }

    pub fn sum(&self) -> Result<T>
    where
        T: Sum<T>,
    {
        let mut driver = self.drive("sum", Demand::Exhaustive)?;
        std::iter::from_fn(|| driver.pull().transpose()).sum()
    }

    /// Arithmetic mean, or empty if there are no elements.
    pub fn average(&self) -> Result<Optional<f64>>
    where
        T: Into<f64>,
    {
        let mut driver = self.drive("average", Demand::Exhaustive)?;
        let (mut sum, mut count) = (0.0, 0usize);
        while let Some(element) = driver.pull()? {
            sum += element.into();
            count += 1;
        }

        Ok(match count {
            0 => Optional::empty(),
            _ => Optional::of(sum / count as f64),
        })
    }

    /// Bridges the pipeline into a standard iterator.
    ///
    /// This is a terminal operation: the pipeline stays in the driving state
    /// until the iterator is dropped. Iteration stops after the first error.
    pub fn iter(&self) -> Result<Iter<'_, 'a, T>> {
        let driver = self.drive("iter", Demand::ShortCircuit)?;
        Ok(Iter {
            driver,
            failed: false,
        })
    }
}

fn fold<T, U>(driver: &mut impl Pull<T>, init: U, mut f: impl FnMut(U, T) -> U) -> Result<U> {
    let mut acc = init;
    while let Some(element) = driver.pull()? {
        acc = f(acc, element);
    }
    Ok(acc)
}

/// Iterator over the elements of a pipeline. See [`Pipeline::iter`].
pub struct Iter<'p, 'a, T> {
    driver: Driver<'p, 'a, T>,
    failed: bool,
}

impl<T> Iterator for Iter<'_, '_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.driver.pull() {
            Ok(element) => element.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, OnceCell, RefCell},
        collections::BTreeSet,
        rc::Rc,
    };

    use super::*;
    use crate::collectors;
    use rstest::rstest;

    #[rstest]
    #[case(Vec::new(), 0)]
    #[case(vec!["monkey"], 1)]
    #[case(vec!["monkey", "ape", "bonobo"], 3)]
    fn test_count(#[case] input: Vec<&str>, #[case] expected: usize) {
        assert_eq!(Pipeline::of(input).count(), Ok(expected));
    }

    #[test]
    fn test_count_unbounded_fails() {
        let pipeline = Pipeline::generate(|| "chimp");
        assert_eq!(
            pipeline.count(),
            Err(Error::InfiniteSource { operation: "count" })
        );
        assert_eq!(pipeline.count(), Err(Error::PipelineAlreadyConsumed));
    }

    #[test]
    fn test_min_by_length() {
        let pipeline = Pipeline::of(vec!["monkey", "ape", "bonobo"]);
        assert_eq!(
            pipeline.min_by(|a, b| a.len().cmp(&b.len())),
            Ok(Optional::of("ape"))
        );
    }

    #[rstest]
    #[case(vec!["bb", "aa", "cc"], Optional::of("bb"))]
    #[case(vec![], Optional::empty())]
    fn test_min_by_ties_keep_first(#[case] input: Vec<&str>, #[case] expected: Optional<&str>) {
        assert_eq!(
            Pipeline::of(input).min_by(|a, b| a.len().cmp(&b.len())),
            Ok(expected)
        );
    }

    #[test]
    fn test_max_by_ties_keep_first() {
        let pipeline = Pipeline::of(vec![(1, 'a'), (3, 'b'), (3, 'c')]);
        assert_eq!(
            pipeline.max_by(|a, b| a.0.cmp(&b.0)),
            Ok(Optional::of((3, 'b')))
        );
    }

    #[rstest]
    #[case(vec![2.0, 1.0, 3.0], Ok(Optional::of(1.0)), Ok(Optional::of(3.0)))]
    #[case(vec![], Ok(Optional::empty()), Ok(Optional::empty()))]
    #[case(
        vec![1.0, f64::NAN],
        Err(Error::NotComparable { operation: "min" }),
        Err(Error::NotComparable { operation: "max" })
    )]
    #[case(
        vec![f64::NAN],
        Err(Error::NotComparable { operation: "min" }),
        Err(Error::NotComparable { operation: "max" })
    )]
    #[case(
        vec![f64::NAN, 1.0],
        Err(Error::NotComparable { operation: "min" }),
        Err(Error::NotComparable { operation: "max" })
    )]
    fn test_natural_min_max(
        #[case] input: Vec<f64>,
        #[case] expected_min: Result<Optional<f64>>,
        #[case] expected_max: Result<Optional<f64>>,
    ) {
        assert_eq!(Pipeline::of(input.clone()).min(), expected_min);
        assert_eq!(Pipeline::of(input).max(), expected_max);
    }

    #[test]
    fn test_find_any_pulls_once() {
        let pulls = Cell::new(0);
        let pipeline = Pipeline::generate(|| {
            pulls.set(pulls.get() + 1);
            "chimp"
        });

        assert_eq!(pipeline.find_any(), Ok(Optional::of("chimp")));
        assert_eq!(pulls.get(), 1);
    }

    #[test]
    fn test_find_first_on_empty() {
        assert_eq!(Pipeline::<i32>::empty().find_first(), Ok(Optional::empty()));
    }

    #[rstest]
    #[case(vec!["monkey", "2", "chimp"], true, false, false)]
    #[case(vec!["1", "2"], false, false, true)]
    #[case(vec![], false, true, true)]
    fn test_matching(
        #[case] input: Vec<&str>,
        #[case] any: bool,
        #[case] all: bool,
        #[case] none: bool,
    ) {
        let pred = |x: &&str| x.chars().next().is_some_and(char::is_alphabetic);
        assert_eq!(Pipeline::of(input.clone()).any_match(pred), Ok(any));
        assert_eq!(Pipeline::of(input.clone()).all_match(pred), Ok(all));
        assert_eq!(Pipeline::of(input).none_match(pred), Ok(none));
    }

    #[test]
    fn test_any_match_short_circuits_unbounded() {
        let pipeline = Pipeline::generate(|| "chimp");
        assert_eq!(pipeline.any_match(|s| s.starts_with('c')), Ok(true));
    }

    #[test]
    fn test_all_match_stops_at_first_failure() {
        let pulls = Cell::new(0);
        let pipeline = Pipeline::iterate(1, |n| n + 1).peek(|_| pulls.set(pulls.get() + 1));
        assert_eq!(pipeline.all_match(|n| *n < 3), Ok(false));
        assert_eq!(pulls.get(), 3);
    }

    #[test]
    fn test_for_each_in_order() {
        let mut out = String::new();
        Pipeline::of(vec!["Monkey", "Gorilla", "Bonobo"])
            .for_each(|s| out.push_str(s))
            .unwrap();
        assert_eq!(out, "MonkeyGorillaBonobo");
    }

    #[rstest]
    #[case(vec![], "")]
    #[case(vec!["w"], "w")]
    #[case(vec!["w", "o", "l", "f"], "wolf")]
    fn test_reduce_from(#[case] input: Vec<&str>, #[case] expected: &str) {
        let word = Pipeline::of(input.into_iter().map(String::from))
            .reduce_from(String::new(), |acc, c| acc + &c);
        assert_eq!(word, Ok(expected.to_string()));
    }

    #[rstest]
    #[case(vec![], Optional::empty())]
    #[case(vec![3], Optional::of(3))]
    #[case(vec![3, 5, 6], Optional::of(90))]
    fn test_reduce(#[case] input: Vec<i32>, #[case] expected: Optional<i32>) {
        assert_eq!(Pipeline::of(input).reduce(|a, b| a * b), Ok(expected));
    }

    #[test]
    fn test_reduce_is_left_fold() {
        let folded = Pipeline::of(vec!["a", "b", "c"].into_iter().map(String::from))
            .reduce(|a, b| format!("({}{})", a, b));
        assert_eq!(folded, Ok(Optional::of("((ab)c)".to_string())));
    }

    #[test]
    fn test_reduce_with_never_calls_combiner() {
        let length = Pipeline::of(vec!["w", "o", "l", "f", "y"]).reduce_with(
            0,
            |i, s| i + s.len(),
            |_, _| unreachable!("sequential evaluation has a single partition"),
        );
        assert_eq!(length, Ok(5));
    }

    #[test]
    fn test_collect_with() {
        let word = Pipeline::of(vec!["w", "o", "l", "f"]).collect_with(
            String::new,
            |acc, s| acc.push_str(s),
            |acc, other| acc.push_str(&other),
        );
        assert_eq!(word, Ok("wolf".to_string()));

        let set = Pipeline::of(vec!["w", "o", "l", "f"]).collect_with(
            BTreeSet::new,
            |set, s| {
                set.insert(s);
            },
            |set, other| set.extend(other),
        );
        assert_eq!(
            set.map(|set| set.into_iter().collect::<Vec<_>>()),
            Ok(vec!["f", "l", "o", "w"])
        );
    }

    #[test]
    fn test_collect_with_collector() {
        let collector = collectors::to_collection(BTreeSet::new);
        let set = Pipeline::of(vec!["w", "o", "l", "f"]).collect(&collector);
        assert_eq!(
            set,
            Ok(BTreeSet::from(["f", "l", "o", "w"]))
        );

        // collectors are reusable
        let again = Pipeline::of(vec!["a"]).collect(&collector);
        assert_eq!(again, Ok(BTreeSet::from(["a"])));
    }

    #[test]
    fn test_sum_and_average() {
        assert_eq!(Pipeline::of(vec![1, 2, 3]).sum(), Ok(6));
        assert_eq!(Pipeline::of(vec![90, 100]).average(), Ok(Optional::of(95.0)));
        assert_eq!(Pipeline::<i32>::empty().average(), Ok(Optional::empty()));
    }

    #[test]
    fn test_sum_folds_while_pulling() {
        let pulled = Cell::new(0);
        let total = Pipeline::iterate_while(1u64, |n| *n <= 1_000, |n| n + 1)
            .peek(|_| pulled.set(pulled.get() + 1))
            .sum();
        assert_eq!(total, Ok(500_500));
        assert_eq!(pulled.get(), 1_000);

        let unordered = Pipeline::of(vec![1.0, f64::NAN]).sorted().sum();
        assert_eq!(unordered, Err(Error::NotComparable { operation: "sorted" }));
    }

    #[test]
    fn test_iter_stops_after_error() {
        let pipeline = Pipeline::of(vec![2.0, f64::NAN]).sorted();
        let items = pipeline.iter().unwrap().collect::<Vec<_>>();
        assert_eq!(items, vec![Err(Error::NotComparable { operation: "sorted" })]);
    }

    #[test]
    fn test_iter_holds_pipeline_until_dropped() {
        let pipeline = Pipeline::of(vec![1, 2, 3]);
        {
            let mut iter = pipeline.iter().unwrap();
            assert_eq!(iter.next(), Some(Ok(1)));
            assert_eq!(pipeline.count(), Err(Error::ConcurrentConsumption));
        }
        assert_eq!(pipeline.count(), Err(Error::PipelineAlreadyConsumed));
    }

    #[rstest]
    #[case::count(|p: &Pipeline<'static, i32>| p.count().map(|_| ()))]
    #[case::find_any(|p: &Pipeline<'static, i32>| p.find_any().map(|_| ()))]
    #[case::any_match(|p: &Pipeline<'static, i32>| p.any_match(|_| true).map(|_| ()))]
    #[case::reduce(|p: &Pipeline<'static, i32>| p.reduce(|a, b| a + b).map(|_| ()))]
    #[case::for_each(|p: &Pipeline<'static, i32>| p.for_each(|_| {}))]
    fn test_second_terminal_fails(#[case] second: fn(&Pipeline<'static, i32>) -> Result<()>) {
        let pipeline = Pipeline::of(vec![1, 2, 3]);
        assert_eq!(pipeline.to_vec(), Ok(vec![1, 2, 3]));
        assert_eq!(second(&pipeline), Err(Error::PipelineAlreadyConsumed));
    }

    #[test]
    fn test_reentrant_drive_is_rejected() {
        let slot: Rc<OnceCell<Pipeline<'static, i32>>> = Rc::new(OnceCell::new());
        let observed = Rc::new(RefCell::new(Vec::new()));

        let inner_slot = Rc::clone(&slot);
        let inner_observed = Rc::clone(&observed);
        let pipeline = Pipeline::of(vec![1]).peek(move |_| {
            if let Some(pipeline) = inner_slot.get() {
                inner_observed.borrow_mut().push(pipeline.count());
            }
        });
        assert!(slot.set(pipeline).is_ok());

        let pipeline = slot.get().unwrap();
        assert_eq!(pipeline.to_vec(), Ok(vec![1]));
        assert_eq!(*observed.borrow(), vec![Err(Error::ConcurrentConsumption)]);
    }
}
