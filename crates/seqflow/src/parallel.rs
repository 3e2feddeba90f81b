//! Parallel evaluation of bounded pipelines.
//!
//! A [`ParallelPipeline`] splits its source into disjoint partitions. Per-element
//! stages (`filter`, `map`, `flat_map`, `peek`) run independently inside each
//! partition, with no shared mutable state. Stages that need the whole sequence
//! (`distinct`, `sorted`, `limit`, `skip`) are barriers: partitions are merged
//! in encounter order, the stage is applied, and the result is re-partitioned.
//! Terminal operations evaluate partitions on the rayon thread pool and merge
//! partial results with the supplied combiner.
//!
//! Differences from sequential evaluation:
//! - `for_each` and `peek` observers run concurrently and in no particular order.
//! - `find_any` returns whichever partition answers first. `any_match`,
//!   `all_match` and `none_match` stop as soon as one partition decides the result.
//! - `reduce_from`, `reduce_with` and `collect` results match sequential
//!   evaluation as long as the combining function is associative.
use std::{
    cmp::Ordering,
    fmt,
    hash::Hash,
    iter::Sum,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{self, AtomicBool, AtomicU8},
    },
};

use itertools::Itertools;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::{
    collector::Collector,
    error::{Error, Result},
    optional::Optional,
    options::Options,
    pipeline::ConsumptionState,
    source::Bound,
    stage::{self, StageKind},
};

type Partition<T> = Box<dyn Iterator<Item = T> + Send>;
type Plan<T> = Box<dyn FnOnce(&Options) -> Result<Vec<Partition<T>>> + Send>;

const FRESH: u8 = 0;
const DRIVING: u8 = 1;
const CONSUMED: u8 = 2;

#[derive(Debug, Default)]
struct Lineage {
    state: AtomicU8,
}

impl Lineage {
    fn state(&self) -> ConsumptionState {
        match self.state.load(atomic::Ordering::SeqCst) {
            FRESH => ConsumptionState::Fresh,
            DRIVING => ConsumptionState::Driving,
            _ => ConsumptionState::Consumed,
        }
    }
}

/// A lazy, single-consumption pipeline over a bounded source, evaluated in parallel.
///
/// ```rust
/// use seqflow::{Options, ParallelPipeline};
///
/// let options = Options { partitions: 4, min_partition_len: 1 };
/// let total = ParallelPipeline::with_options(1..=100, options)
///     .filter(|n| n % 2 == 0)
///     .reduce_with(0, |acc, n| acc + n, |a, b| a + b);
/// assert_eq!(total, Ok(2550));
/// ```
pub struct ParallelPipeline<T> {
    plan: Mutex<Option<Plan<T>>>,
    lineage: Arc<Lineage>,
    options: Options,
    len: usize,
    stages: Vec<StageKind>,
    bound: Bound,
}

impl<T: Send + 'static> ParallelPipeline<T> {
    /// Creates a parallel pipeline with default [`Options`].
    pub fn from_collection(elements: impl IntoIterator<Item = T>) -> Self {
        Self::with_options(elements, Options::default())
    }

    pub fn with_options(elements: impl IntoIterator<Item = T>, options: Options) -> Self {
        let elements = elements.into_iter().collect::<Vec<_>>();
        let len = elements.len();
        let plan: Plan<T> = Box::new(move |options: &Options| Ok(split(elements, options)));

        Self {
            plan: Mutex::new(Some(plan)),
            lineage: Arc::default(),
            options,
            len,
            stages: Vec::new(),
            bound: Bound::Finite(len),
        }
    }

    fn append<U: Send + 'static>(
        self,
        stage: StageKind,
        bound: Bound,
        wrap: impl FnOnce(Plan<T>) -> Plan<U>,
    ) -> ParallelPipeline<U> {
        let ParallelPipeline {
            plan,
            lineage,
            options,
            len,
            mut stages,
            bound: _,
        } = self;

        let plan = plan.into_inner().unwrap_or_else(PoisonError::into_inner);
        let plan = match (lineage.state(), plan) {
            (ConsumptionState::Fresh, Some(plan)) => Some(wrap(plan)),
            (state, _) => {
                tracing::warn!(?state, %stage, "stage appended to a pipeline that can no longer be driven");
                None
            }
        };
        stages.push(stage);

        ParallelPipeline {
            plan: Mutex::new(plan),
            lineage,
            options,
            len,
            stages,
            bound,
        }
    }

    fn per_partition<U: Send + 'static>(
        self,
        stage: StageKind,
        bound: Bound,
        wrap: impl Fn(Partition<T>) -> Partition<U> + Send + 'static,
    ) -> ParallelPipeline<U> {
        self.append(stage, bound, move |plan| {
            Box::new(move |options: &Options| Ok(plan(options)?.into_iter().map(&wrap).collect()))
        })
    }

    fn barrier(
        self,
        stage: StageKind,
        bound: Bound,
        apply: impl FnOnce(Vec<T>) -> Result<Vec<T>> + Send + 'static,
    ) -> Self {
        self.append(stage, bound, move |plan| {
            Box::new(move |options: &Options| {
                let merged = merge(plan(options)?);
                tracing::trace!(%stage, len = merged.len(), "parallel barrier merged partitions");
                Ok(split(apply(merged)?, options))
            })
        })
    }

    pub fn filter(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        let predicate = Arc::new(predicate);
        let bound = self.bound;
        self.per_partition(StageKind::Filter, bound, move |partition| {
            let predicate = Arc::clone(&predicate);
            Box::new(partition.filter(move |element| predicate(element)))
        })
    }

    pub fn map<U: Send + 'static>(
        self,
        transform: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> ParallelPipeline<U> {
        let transform = Arc::new(transform);
        let bound = self.bound;
        self.per_partition(StageKind::Map, bound, move |partition| {
            let transform = Arc::clone(&transform);
            Box::new(partition.map(move |element| transform(element)))
        })
    }

    pub fn flat_map<I>(
        self,
        transform: impl Fn(T) -> I + Send + Sync + 'static,
    ) -> ParallelPipeline<I::Item>
    where
        I: IntoIterator + 'static,
        I::IntoIter: Send + 'static,
        I::Item: Send + 'static,
    {
        let transform = Arc::new(transform);
        let bound = self.bound.flatten();
        self.per_partition(StageKind::FlatMap, bound, move |partition| {
            let transform = Arc::clone(&transform);
            Box::new(partition.flat_map(move |element| transform(element)))
        })
    }

    /// Invokes `observer` on every element. Observers run concurrently across partitions.
    pub fn peek(self, observer: impl Fn(&T) + Send + Sync + 'static) -> Self {
        let observer = Arc::new(observer);
        let bound = self.bound;
        self.per_partition(StageKind::Peek, bound, move |partition| {
            let observer = Arc::clone(&observer);
            Box::new(partition.inspect(move |element| observer(element)))
        })
    }

    pub fn distinct(self) -> Self
    where
        T: Eq + Hash + Clone,
    {
        let bound = self.bound;
        self.barrier(StageKind::Distinct, bound, |elements| {
            let mut seen = FxHashSet::default();
            Ok(elements
                .into_iter()
                .filter(|element| seen.insert(element.clone()))
                .collect())
        })
    }

    /// Natural-order sort. Fails with [`Error::NotComparable`] on unordered elements.
    pub fn sorted(self) -> Self
    where
        T: PartialOrd,
    {
        let bound = self.bound;
        self.barrier(StageKind::Sorted { comparator: false }, bound, |mut elements| {
            stage::ensure_comparable(&elements, "sorted")?;
            let incomparable = AtomicBool::new(false);
            elements.par_sort_by(|a, b| {
                a.partial_cmp(b).unwrap_or_else(|| {
                    incomparable.store(true, atomic::Ordering::Relaxed);
                    Ordering::Equal
                })
            });

            if incomparable.load(atomic::Ordering::Relaxed) {
                Err(Error::NotComparable { operation: "sorted" })
            } else {
                Ok(elements)
            }
        })
    }

    /// Stable sort by `comparator`.
    pub fn sorted_by(self, comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        let bound = self.bound;
        self.barrier(StageKind::Sorted { comparator: true }, bound, move |mut elements| {
            elements.par_sort_by(comparator);
            Ok(elements)
        })
    }

    pub fn limit(self, n: usize) -> Self {
        let bound = self.bound.limit(n);
        self.barrier(StageKind::Limit(n), bound, move |mut elements| {
            elements.truncate(n);
            Ok(elements)
        })
    }

    pub fn skip(self, n: usize) -> Self {
        let bound = self.bound.skip(n);
        self.barrier(StageKind::Skip(n), bound, move |mut elements| {
            elements.drain(..n.min(elements.len()));
            Ok(elements)
        })
    }

    fn drive(&self, operation: &'static str) -> Result<(Driver<'_>, Vec<Partition<T>>)> {
        match self.lineage.state.compare_exchange(
            FRESH,
            DRIVING,
            atomic::Ordering::SeqCst,
            atomic::Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(DRIVING) => {
                tracing::warn!(operation, "parallel pipeline is already being driven");
                return Err(Error::ConcurrentConsumption);
            }
            Err(_) => {
                tracing::warn!(operation, "parallel pipeline has already been consumed");
                return Err(Error::PipelineAlreadyConsumed);
            }
        }

        let driver = Driver {
            lineage: &self.lineage,
        };
        let plan = self
            .plan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::PipelineAlreadyConsumed)?;

        tracing::debug!(
            operation,
            pipeline = %self.describe(),
            partitions = self.options.partition_count(self.len),
            "driving parallel pipeline"
        );
        let partitions = plan(&self.options)?;
        Ok((driver, partitions))
    }

    pub fn count(&self) -> Result<usize> {
        let (_driver, partitions) = self.drive("count")?;
        Ok(partitions.into_par_iter().map(Iterator::count).sum())
    }

    /// Smallest element per `comparator`; the first in encounter order wins ties.
    pub fn min_by(&self, comparator: impl Fn(&T, &T) -> Ordering + Send + Sync) -> Result<Optional<T>> {
        self.select("min_by", |candidate, best| {
            Some(best.is_none_or(|best| comparator(candidate, best) == Ordering::Less))
        })
    }

    /// Largest element per `comparator`; the first in encounter order wins ties.
    pub fn max_by(&self, comparator: impl Fn(&T, &T) -> Ordering + Send + Sync) -> Result<Optional<T>> {
        self.select("max_by", |candidate, best| {
            Some(best.is_none_or(|best| comparator(candidate, best) == Ordering::Greater))
        })
    }

    pub fn min(&self) -> Result<Optional<T>>
    where
        T: PartialOrd,
    {
        self.select("min", |candidate, best| {
            stage::natural_replaces(candidate, best, Ordering::Less)
        })
    }

    pub fn max(&self) -> Result<Optional<T>>
    where
        T: PartialOrd,
    {
        self.select("max", |candidate, best| {
            stage::natural_replaces(candidate, best, Ordering::Greater)
        })
    }

    /// `replaces` sees every element, with `None` as the best before the first
    /// one, and returns `None` when the element is unordered.
    fn select(
        &self,
        operation: &'static str,
        replaces: impl Fn(&T, Option<&T>) -> Option<bool> + Send + Sync,
    ) -> Result<Optional<T>> {
        let (_driver, partitions) = self.drive(operation)?;
        let incomparable = AtomicBool::new(false);
        let pick = |best: Option<T>, candidate: T| match replaces(&candidate, best.as_ref()) {
            Some(true) => Some(candidate),
            Some(false) => best,
            None => {
                incomparable.store(true, atomic::Ordering::Relaxed);
                best
            }
        };

        let partials = partitions
            .into_par_iter()
            .map(|partition| partition.fold(None, pick))
            .collect::<Vec<_>>();
        let best = partials.into_iter().flatten().fold(None, pick);

        if incomparable.load(atomic::Ordering::Relaxed) {
            Err(Error::NotComparable { operation })
        } else {
            Ok(best.into())
        }
    }

    /// Returns an element from whichever partition produces one first.
    pub fn find_any(&self) -> Result<Optional<T>> {
        let (_driver, partitions) = self.drive("find_any")?;
        Ok(partitions
            .into_par_iter()
            .find_map_any(|mut partition| partition.next())
            .into())
    }

    /// Returns the first element in encounter order.
    pub fn find_first(&self) -> Result<Optional<T>> {
        let (_driver, partitions) = self.drive("find_first")?;
        Ok(partitions
            .into_par_iter()
            .find_map_first(|mut partition| partition.next())
            .into())
    }

    pub fn any_match(&self, predicate: impl Fn(&T) -> bool + Send + Sync) -> Result<bool> {
        let (_driver, partitions) = self.drive("any_match")?;
        Ok(partitions
            .into_par_iter()
            .any(|mut partition| partition.any(|element| predicate(&element))))
    }

    pub fn all_match(&self, predicate: impl Fn(&T) -> bool + Send + Sync) -> Result<bool> {
        let (_driver, partitions) = self.drive("all_match")?;
        Ok(partitions
            .into_par_iter()
            .all(|mut partition| partition.all(|element| predicate(&element))))
    }

    pub fn none_match(&self, predicate: impl Fn(&T) -> bool + Send + Sync) -> Result<bool> {
        let (_driver, partitions) = self.drive("none_match")?;
        Ok(!partitions
            .into_par_iter()
            .any(|mut partition| partition.any(|element| predicate(&element))))
    }

    /// Invokes `observer` once per element, concurrently and in no particular order.
    pub fn for_each(&self, observer: impl Fn(T) + Send + Sync) -> Result<()> {
        let (_driver, partitions) = self.drive("for_each")?;
        partitions
            .into_par_iter()
            .for_each(|partition| partition.for_each(&observer));
        Ok(())
    }

    /// Folds each partition from `identity`, then combines the partial results with `op`.
    ///
    /// `identity` must be an identity for `op` and `op` must be associative.
    pub fn reduce_from(&self, identity: T, op: impl Fn(T, T) -> T + Send + Sync) -> Result<T>
    where
        T: Clone + Sync,
    {
        let (_driver, partitions) = self.drive("reduce_from")?;
        let partials = partitions
            .into_par_iter()
            .map(|partition| partition.fold(identity.clone(), &op))
            .collect::<Vec<_>>();
        Ok(partials.into_iter().reduce(&op).unwrap_or(identity))
    }

    pub fn reduce(&self, op: impl Fn(T, T) -> T + Send + Sync) -> Result<Optional<T>> {
        let (_driver, partitions) = self.drive("reduce")?;
        let partials = partitions
            .into_par_iter()
            .map(|partition| partition.reduce(&op))
            .collect::<Vec<_>>();
        Ok(partials.into_iter().flatten().reduce(&op).into())
    }

    /// Folds each partition with `accumulator`, then merges partial results with `combiner`.
    pub fn reduce_with<U>(
        &self,
        identity: U,
        accumulator: impl Fn(U, T) -> U + Send + Sync,
        combiner: impl Fn(U, U) -> U + Send + Sync,
    ) -> Result<U>
    where
        U: Clone + Send + Sync,
    {
        let (_driver, partitions) = self.drive("reduce_with")?;
        let partials = partitions
            .into_par_iter()
            .map(|partition| partition.fold(identity.clone(), &accumulator))
            .collect::<Vec<_>>();
        Ok(partials.into_iter().reduce(combiner).unwrap_or(identity))
    }

    /// Accumulates each partition into its own container, then merges them with `combiner`.
    pub fn collect_with<R: Send>(
        &self,
        supplier: impl Fn() -> R + Send + Sync,
        accumulator: impl Fn(&mut R, T) + Send + Sync,
        combiner: impl Fn(&mut R, R) + Send + Sync,
    ) -> Result<R> {
        let (_driver, partitions) = self.drive("collect_with")?;
        let partials = partitions
            .into_par_iter()
            .map(|partition| {
                let mut container = supplier();
                partition.for_each(|element| accumulator(&mut container, element));
                container
            })
            .collect::<Vec<_>>();
        Ok(combine_in_order(partials, supplier, combiner))
    }

    pub fn collect<A: Send, R>(&self, collector: &Collector<T, A, R>) -> Result<R> {
        let (_driver, partitions) = self.drive("collect")?;
        let partials = partitions
            .into_par_iter()
            .map(|partition| {
                let mut container = collector.supply();
                partition.for_each(|element| collector.accumulate(&mut container, element));
                container
            })
            .collect::<Vec<_>>();
        let container = combine_in_order(
            partials,
            || collector.supply(),
            |container, other| collector.combine(container, other),
        );
        Ok(collector.finish(container))
    }

    /// Collects every element, preserving encounter order.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let (_driver, partitions) = self.drive("to_vec")?;
        Ok(merge(partitions))
    }

    pub fn sum(&self) -> Result<T>
    where
        T: Sum<T>,
    {
        let (_driver, partitions) = self.drive("sum")?;
        let partials = partitions
            .into_par_iter()
            .map(|partition| partition.sum::<T>())
            .collect::<Vec<_>>();
        Ok(partials.into_iter().sum())
    }

    pub fn average(&self) -> Result<Optional<f64>>
    where
        T: Into<f64>,
    {
        let (_driver, partitions) = self.drive("average")?;
        let (sum, count) = partitions
            .into_par_iter()
            .map(|partition| {
                partition.fold((0.0, 0usize), |(sum, count), element| {
                    (sum + element.into(), count + 1)
                })
            })
            .reduce(|| (0.0, 0), |(a, m), (b, n)| (a + b, m + n));

        Ok(match count {
            0 => Optional::empty(),
            _ => Optional::of(sum / count as f64),
        })
    }
}

impl<T> ParallelPipeline<T> {
    /// Renders the source and stage chain, e.g. `parallel collection[8] -> filter -> sorted`.
    pub fn describe(&self) -> String {
        std::iter::once(format!("parallel collection[{}]", self.len))
            .chain(self.stages.iter().map(ToString::to_string))
            .join(" -> ")
    }

    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    pub fn bound(&self) -> Bound {
        self.bound
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn state(&self) -> ConsumptionState {
        self.lineage.state()
    }
}

impl<T> fmt::Debug for ParallelPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelPipeline")
            .field("pipeline", &self.describe())
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

/// Marks the lineage consumed when the terminal operation finishes.
struct Driver<'p> {
    lineage: &'p Lineage,
}

impl Drop for Driver<'_> {
    fn drop(&mut self) {
        self.lineage.state.store(CONSUMED, atomic::Ordering::SeqCst);
    }
}

fn split<T: Send + 'static>(elements: Vec<T>, options: &Options) -> Vec<Partition<T>> {
    let count = options.partition_count(elements.len());
    let chunk = elements.len().div_ceil(count).max(1);
    let mut partitions: Vec<Partition<T>> = Vec::with_capacity(count);

    let mut rest = elements;
    while rest.len() > chunk {
        let tail = rest.split_off(chunk);
        partitions.push(Box::new(rest.into_iter()));
        rest = tail;
    }
    partitions.push(Box::new(rest.into_iter()));

    tracing::trace!(partitions = partitions.len(), chunk, "split source into partitions");
    partitions
}

/// Drains every partition in parallel and concatenates them in partition order.
fn merge<T: Send>(partitions: Vec<Partition<T>>) -> Vec<T> {
    partitions
        .into_par_iter()
        .map(|partition| partition.collect::<Vec<_>>())
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

fn combine_in_order<R>(partials: Vec<R>, supplier: impl FnOnce() -> R, combiner: impl Fn(&mut R, R)) -> R {
    let mut partials = partials.into_iter();
    let mut container = partials.next().unwrap_or_else(supplier);
    for other in partials {
        combiner(&mut container, other);
    }
    container
}
