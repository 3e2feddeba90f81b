use std::{
    cell::{Cell, RefCell},
    cmp::Ordering,
    fmt,
    hash::Hash,
    rc::Rc,
};

use itertools::Itertools;

use crate::{
    error::{Error, Result},
    source::{Bound, BoxPull, Bounded, Concat, Generate, Iterate, Pull, SourceKind},
    stage::{self, Distinct, Filter, FlatMap, Limit, Map, Peek, Skip, Sorted, StageKind},
};

/// Consumption state shared by every view derived from the same source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumptionState {
    #[default]
    Fresh,
    /// A terminal operation is currently pulling.
    Driving,
    Consumed,
}

#[derive(Debug, Default)]
pub(crate) struct Lineage {
    state: Cell<ConsumptionState>,
}

/// Whether a terminal operation needs the whole sequence or may stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Demand {
    Exhaustive,
    ShortCircuit,
}

/// A lazy, single-consumption sequence pipeline.
///
/// A pipeline is a source plus an ordered chain of stages. Nothing is evaluated
/// until a terminal operation starts pulling, and each pull flows through the
/// chain one element at a time. `sorted` and `sorted_by` are the exception:
/// they buffer their entire upstream before yielding the first element.
///
/// Stage combinators take the pipeline by value and return a new view sharing
/// the same lineage. Terminal operations borrow it, and a lineage can be driven
/// exactly once:
///
/// ```rust
/// use seqflow::{Error, Pipeline};
///
/// let odds = Pipeline::iterate_while(1, |n| *n < 100, |n| n + 2);
/// assert_eq!(odds.count(), Ok(50));
/// assert_eq!(odds.count(), Err(Error::PipelineAlreadyConsumed));
/// ```
///
/// Appending a stage to a consumed pipeline does not fail on the spot. The
/// returned view is poisoned, and its terminal operation fails with
/// [`Error::PipelineAlreadyConsumed`]:
///
/// ```rust
/// use seqflow::{Error, Pipeline};
///
/// let numbers = Pipeline::of(vec![1, 2, 3]);
/// assert_eq!(numbers.count(), Ok(3));
/// let doubled = numbers.map(|n| n * 2);
/// assert_eq!(doubled.to_vec(), Err(Error::PipelineAlreadyConsumed));
/// ```
pub struct Pipeline<'a, T> {
    chain: RefCell<Option<BoxPull<'a, T>>>,
    lineage: Rc<Lineage>,
    source: SourceKind,
    stages: Vec<StageKind>,
    bound: Bound,
}

impl<'a, T: 'a> Pipeline<'a, T> {
    fn new(source: SourceKind, bound: Bound, chain: Option<BoxPull<'a, T>>) -> Self {
        Self {
            chain: RefCell::new(chain),
            lineage: Rc::new(Lineage::default()),
            source,
            stages: Vec::new(),
            bound,
        }
    }

    /// Creates a bounded pipeline over the elements of `elements`, in order.
    pub fn from_collection(elements: impl IntoIterator<Item = T>) -> Self {
        let elements = elements.into_iter().collect::<Vec<_>>();
        let len = elements.len();
        Self::new(
            SourceKind::Collection(len),
            Bound::Finite(len),
            Some(Box::new(Bounded::new(elements))),
        )
    }

    /// Shorthand for [`Pipeline::from_collection`].
    pub fn of(elements: impl IntoIterator<Item = T>) -> Self {
        Self::from_collection(elements)
    }

    pub fn empty() -> Self {
        Self::from_collection(Vec::new())
    }

    /// Creates an unbounded pipeline that calls `producer` once per pull.
    pub fn generate(producer: impl FnMut() -> T + 'a) -> Self {
        Self::new(
            SourceKind::Generate,
            Bound::Unbounded,
            Some(Box::new(Generate::new(producer))),
        )
    }

    /// Creates an unbounded pipeline yielding `seed`, `successor(seed)`, ...
    pub fn iterate(seed: T, successor: impl FnMut(&T) -> T + 'a) -> Self
    where
        T: Clone,
    {
        Self::new(
            SourceKind::Iterate,
            Bound::Unbounded,
            Some(Box::new(Iterate::new(seed, |_: &T| true, successor))),
        )
    }

    /// Like [`Pipeline::iterate`], but ends at the first element for which `has_next` is false.
    pub fn iterate_while(
        seed: T,
        has_next: impl FnMut(&T) -> bool + 'a,
        successor: impl FnMut(&T) -> T + 'a,
    ) -> Self
    where
        T: Clone,
    {
        Self::new(
            SourceKind::IterateWhile,
            Bound::Unknown,
            Some(Box::new(Iterate::new(seed, has_next, successor))),
        )
    }

    /// Creates a pipeline that fully exhausts `first`, then `second`.
    pub fn concat(first: Pipeline<'a, T>, second: Pipeline<'a, T>) -> Self {
        let source = SourceKind::Concat(first.describe(), second.describe());
        let bound = first.bound.concat(second.bound);
        let chain = match (first.into_upstream(), second.into_upstream()) {
            (Some(first), Some(second)) => {
                Some(Box::new(Concat::new(first, second)) as BoxPull<'a, T>)
            }
            _ => None,
        };

        Self::new(source, bound, chain)
    }

    /// Takes the stage chain out of a pipeline that can still be driven.
    fn into_upstream(self) -> Option<BoxPull<'a, T>> {
        match self.lineage.state.get() {
            ConsumptionState::Fresh => self.chain.into_inner(),
            state => {
                tracing::warn!(?state, "concat received a pipeline that can no longer be driven");
                None
            }
        }
    }

    fn append<U: 'a>(
        self,
        stage: StageKind,
        bound: Bound,
        wrap: impl FnOnce(BoxPull<'a, T>) -> BoxPull<'a, U>,
    ) -> Pipeline<'a, U> {
        let Pipeline {
            chain,
            lineage,
            source,
            mut stages,
            bound: _,
        } = self;

        let chain = match (lineage.state.get(), chain.into_inner()) {
            (ConsumptionState::Fresh, Some(upstream)) => Some(wrap(upstream)),
            (state, _) => {
                tracing::warn!(?state, %stage, "stage appended to a pipeline that can no longer be driven");
                None
            }
        };
        stages.push(stage);

        Pipeline {
            chain: RefCell::new(chain),
            lineage,
            source,
            stages,
            bound,
        }
    }

    /// Keeps the elements for which `predicate` holds.
    ///
    /// On a consumed pipeline this returns a poisoned view whose terminal
    /// operation fails with [`Error::PipelineAlreadyConsumed`]. The same holds
    /// for every other stage combinator.
    pub fn filter(self, predicate: impl FnMut(&T) -> bool + 'a) -> Self {
        let bound = self.bound;
        self.append(StageKind::Filter, bound, |upstream| {
            Box::new(Filter::new(upstream, predicate))
        })
    }

    pub fn map<U: 'a>(self, transform: impl FnMut(T) -> U + 'a) -> Pipeline<'a, U> {
        let bound = self.bound;
        self.append(StageKind::Map, bound, |upstream| {
            Box::new(Map::new(upstream, transform))
        })
    }

    /// Replaces each element by the sequence `transform` returns, flattening in upstream order.
    /// Returns a poisoned view if the pipeline was already consumed.
    pub fn flat_map<I>(self, transform: impl FnMut(T) -> I + 'a) -> Pipeline<'a, I::Item>
    where
        I: IntoIterator + 'a,
        I::IntoIter: 'a,
        I::Item: 'a,
    {
        let bound = self.bound.flatten();
        self.append(StageKind::FlatMap, bound, |upstream| {
            Box::new(FlatMap::new(upstream, transform))
        })
    }

    /// Drops elements equal to one seen earlier, preserving first-occurrence order.
    pub fn distinct(self) -> Self
    where
        T: Eq + Hash + Clone,
    {
        let bound = self.bound;
        self.append(StageKind::Distinct, bound, |upstream| {
            Box::new(Distinct::new(upstream))
        })
    }

    /// Sorts by natural order.
    ///
    /// This is a barrier stage: the first pull drains the whole upstream.
    /// Pulling fails with [`Error::NotComparable`] if two elements are unordered
    /// (e.g. `NaN`), and with [`Error::InfiniteSource`] if the upstream is unbounded.
    pub fn sorted(self) -> Self
    where
        T: PartialOrd,
    {
        let bound = self.bound;
        self.append(StageKind::Sorted { comparator: false }, bound, |upstream| {
            Box::new(Sorted::new(
                upstream,
                bound.is_unbounded(),
                |buffer: &mut Vec<T>| stage::sort_natural(buffer, "sorted"),
            ))
        })
    }

    /// Stable sort by `comparator`. Like [`Pipeline::sorted`], this is a barrier stage.
    pub fn sorted_by(self, mut comparator: impl FnMut(&T, &T) -> Ordering + 'a) -> Self {
        let bound = self.bound;
        self.append(StageKind::Sorted { comparator: true }, bound, |upstream| {
            Box::new(Sorted::new(
                upstream,
                bound.is_unbounded(),
                move |buffer: &mut Vec<T>| {
                    buffer.sort_by(&mut comparator);
                    Ok(())
                },
            ))
        })
    }

    /// Yields at most `n` elements. Makes unbounded pipelines finite.
    ///
    /// Like every stage combinator, this cannot revive a consumed pipeline:
    /// the result is a poisoned view that fails with [`Error::PipelineAlreadyConsumed`].
    pub fn limit(self, n: usize) -> Self {
        let bound = self.bound.limit(n);
        self.append(StageKind::Limit(n), bound, |upstream| {
            Box::new(Limit::new(upstream, n))
        })
    }

    pub fn skip(self, n: usize) -> Self {
        let bound = self.bound.skip(n);
        self.append(StageKind::Skip(n), bound, |upstream| {
            Box::new(Skip::new(upstream, n))
        })
    }

    /// Invokes `observer` on every element as it passes, without changing it.
    pub fn peek(self, observer: impl FnMut(&T) + 'a) -> Self {
        let bound = self.bound;
        self.append(StageKind::Peek, bound, |upstream| {
            Box::new(Peek::new(upstream, observer))
        })
    }
}

impl<'a, T> Pipeline<'a, T> {
    /// Renders the source and stage chain, e.g. `iterate -> skip(5) -> limit(2)`.
    pub fn describe(&self) -> String {
        std::iter::once(self.source.to_string())
            .chain(self.stages.iter().map(ToString::to_string))
            .join(" -> ")
    }

    pub fn source(&self) -> &SourceKind {
        &self.source
    }

    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    /// Statically known upper bound on the number of elements this pipeline yields.
    pub fn bound(&self) -> Bound {
        self.bound
    }

    pub fn state(&self) -> ConsumptionState {
        self.lineage.state.get()
    }

    /// Returns `true` if a terminal operation can still be run on this view.
    pub fn is_drivable(&self) -> bool {
        self.state() == ConsumptionState::Fresh && self.chain.borrow().is_some()
    }

    /// Moves the pipeline from `Fresh` to `Driving` and hands out its chain.
    ///
    /// The returned driver marks the lineage `Consumed` when dropped. Exhaustive
    /// operations on an unbounded pipeline consume it and fail immediately.
    pub(crate) fn drive(&self, operation: &'static str, demand: Demand) -> Result<Driver<'_, 'a, T>> {
        match self.lineage.state.get() {
            ConsumptionState::Driving => {
                tracing::warn!(operation, "pipeline is already being driven");
                return Err(Error::ConcurrentConsumption);
            }
            ConsumptionState::Consumed => {
                tracing::warn!(operation, "pipeline has already been consumed");
                return Err(Error::PipelineAlreadyConsumed);
            }
            ConsumptionState::Fresh => {}
        }

        let chain = self.chain.borrow_mut().take();
        let driver = Driver {
            chain,
            lineage: &self.lineage,
        };
        self.lineage.state.set(ConsumptionState::Driving);

        if driver.chain.is_none() {
            return Err(Error::PipelineAlreadyConsumed);
        }

        if demand == Demand::Exhaustive && self.bound.is_unbounded() {
            return Err(Error::InfiniteSource { operation });
        }

        tracing::debug!(operation, pipeline = %self.describe(), "driving pipeline");
        Ok(driver)
    }
}

impl<T> fmt::Debug for Pipeline<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("pipeline", &self.describe())
            .field("bound", &self.bound)
            .field("state", &self.state())
            .finish()
    }
}

/// Exclusive access to a pipeline's chain for the duration of one terminal operation.
pub(crate) struct Driver<'p, 'a, T> {
    chain: Option<BoxPull<'a, T>>,
    lineage: &'p Lineage,
}

impl<T> Pull<T> for Driver<'_, '_, T> {
    fn pull(&mut self) -> Result<Option<T>> {
        match self.chain.as_mut() {
            Some(chain) => chain.pull(),
            None => Ok(None),
        }
    }
}

impl<T> Drop for Driver<'_, '_, T> {
    fn drop(&mut self) {
        self.lineage.state.set(ConsumptionState::Consumed);
    }
}
