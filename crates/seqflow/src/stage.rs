//! Lazy transformation stages.
//!
//! Every stage wraps an upstream producer and exposes the same [`Pull`] contract,
//! so stages compose into chains of any depth without intermediate storage.
//! [`Sorted`] is the one barrier: it drains its upstream before yielding anything.
use std::{cmp::Ordering, fmt, hash::Hash};

use rustc_hash::FxHashSet;

use crate::{
    error::{Error, Result},
    source::{BoxPull, Pull},
};

/// Descriptor of a stage appended to a pipeline, used for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Filter,
    Map,
    FlatMap,
    Distinct,
    Sorted { comparator: bool },
    Limit(usize),
    Skip(usize),
    Peek,
}

impl StageKind {
    /// Returns `true` for stages that must buffer their whole upstream before producing output.
    pub const fn is_barrier(&self) -> bool {
        matches!(self, StageKind::Sorted { .. })
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Filter => f.write_str("filter"),
            StageKind::Map => f.write_str("map"),
            StageKind::FlatMap => f.write_str("flat_map"),
            StageKind::Distinct => f.write_str("distinct"),
            StageKind::Sorted { comparator: false } => f.write_str("sorted"),
            StageKind::Sorted { comparator: true } => f.write_str("sorted_by"),
            StageKind::Limit(n) => write!(f, "limit({})", n),
            StageKind::Skip(n) => write!(f, "skip({})", n),
            StageKind::Peek => f.write_str("peek"),
        }
    }
}

pub(crate) struct Filter<'a, T, F> {
    upstream: BoxPull<'a, T>,
    predicate: F,
}

impl<'a, T, F> Filter<'a, T, F> {
    pub(crate) fn new(upstream: BoxPull<'a, T>, predicate: F) -> Self {
        Self {
            upstream,
            predicate,
        }
    }
}

impl<T, F> Pull<T> for Filter<'_, T, F>
where
    F: FnMut(&T) -> bool,
{
    fn pull(&mut self) -> Result<Option<T>> {
        while let Some(element) = self.upstream.pull()? {
            if (self.predicate)(&element) {
                return Ok(Some(element));
            }
        }

        Ok(None)
    }
}

pub(crate) struct Map<'a, T, F> {
    upstream: BoxPull<'a, T>,
    transform: F,
}

impl<'a, T, F> Map<'a, T, F> {
    pub(crate) fn new(upstream: BoxPull<'a, T>, transform: F) -> Self {
        Self {
            upstream,
            transform,
        }
    }
}

impl<T, U, F> Pull<U> for Map<'_, T, F>
where
    F: FnMut(T) -> U,
{
    fn pull(&mut self) -> Result<Option<U>> {
        Ok(self.upstream.pull()?.map(&mut self.transform))
    }
}

/// Replaces each upstream element by a nested sequence and exhausts that
/// sequence before pulling the next upstream element.
pub(crate) struct FlatMap<'a, T, F, I>
where
    I: IntoIterator,
{
    upstream: BoxPull<'a, T>,
    transform: F,
    current: Option<I::IntoIter>,
}

impl<'a, T, F, I> FlatMap<'a, T, F, I>
where
    I: IntoIterator,
{
    pub(crate) fn new(upstream: BoxPull<'a, T>, transform: F) -> Self {
        Self {
            upstream,
            transform,
            current: None,
        }
    }
}

impl<T, F, I> Pull<I::Item> for FlatMap<'_, T, F, I>
where
    F: FnMut(T) -> I,
    I: IntoIterator,
{
    fn pull(&mut self) -> Result<Option<I::Item>> {
        loop {
            if let Some(inner) = self.current.as_mut() {
                if let Some(element) = inner.next() {
                    return Ok(Some(element));
                }
                self.current = None;
            }

            match self.upstream.pull()? {
                Some(element) => self.current = Some((self.transform)(element).into_iter()),
                None => return Ok(None),
            }
        }
    }
}

/// Skips elements equal to one already yielded, keeping first-occurrence order.
pub(crate) struct Distinct<'a, T> {
    upstream: BoxPull<'a, T>,
    seen: FxHashSet<T>,
}

impl<'a, T> Distinct<'a, T> {
    pub(crate) fn new(upstream: BoxPull<'a, T>) -> Self {
        Self {
            upstream,
            seen: FxHashSet::default(),
        }
    }
}

impl<T> Pull<T> for Distinct<'_, T>
where
    T: Eq + Hash + Clone,
{
    fn pull(&mut self) -> Result<Option<T>> {
        while let Some(element) = self.upstream.pull()? {
            if !self.seen.contains(&element) {
                self.seen.insert(element.clone());
                return Ok(Some(element));
            }
        }

        Ok(None)
    }
}

/// Barrier stage: drains the upstream on the first pull, sorts the buffer
/// with `sorter`, then yields from the buffer.
pub(crate) struct Sorted<'a, T, S> {
    upstream: BoxPull<'a, T>,
    upstream_unbounded: bool,
    sorter: S,
    buffered: Option<std::vec::IntoIter<T>>,
}

impl<'a, T, S> Sorted<'a, T, S> {
    pub(crate) fn new(upstream: BoxPull<'a, T>, upstream_unbounded: bool, sorter: S) -> Self {
        Self {
            upstream,
            upstream_unbounded,
            sorter,
            buffered: None,
        }
    }
}

impl<T, S> Pull<T> for Sorted<'_, T, S>
where
    S: FnMut(&mut Vec<T>) -> Result<()>,
{
    fn pull(&mut self) -> Result<Option<T>> {
        if self.buffered.is_none() {
            if self.upstream_unbounded {
                return Err(Error::InfiniteSource {
                    operation: "sorted",
                });
            }

            let mut buffer = Vec::new();
            while let Some(element) = self.upstream.pull()? {
                buffer.push(element);
            }
            tracing::trace!(len = buffer.len(), "sorted barrier materialized upstream");

            (self.sorter)(&mut buffer)?;
            self.buffered = Some(buffer.into_iter());
        }

        Ok(self.buffered.as_mut().and_then(Iterator::next))
    }
}

/// Rejects buffers holding an element that is unordered with itself or with the
/// first element (e.g. NaN), before any sort sees an inconsistent comparator.
pub(crate) fn ensure_comparable<T: PartialOrd>(buffer: &[T], operation: &'static str) -> Result<()> {
    let comparable = buffer.first().is_none_or(|first| {
        buffer
            .iter()
            .all(|element| element.partial_cmp(element).is_some() && element.partial_cmp(first).is_some())
    });

    if comparable {
        Ok(())
    } else {
        Err(Error::NotComparable { operation })
    }
}

/// Whether `candidate` should replace `best` when selecting by natural order
/// towards `wanted`. `None` when `candidate` is unordered with itself or with `best`.
pub(crate) fn natural_replaces<T: PartialOrd>(
    candidate: &T,
    best: Option<&T>,
    wanted: Ordering,
) -> Option<bool> {
    candidate.partial_cmp(candidate)?;
    match best {
        Some(best) => candidate.partial_cmp(best).map(|ordering| ordering == wanted),
        None => Some(true),
    }
}

/// Stable sort by natural order, failing if any compared pair is unordered (e.g. NaN).
pub(crate) fn sort_natural<T: PartialOrd>(buffer: &mut [T], operation: &'static str) -> Result<()> {
    ensure_comparable(buffer, operation)?;

    let mut incomparable = false;
    buffer.sort_by(|a, b| {
        a.partial_cmp(b).unwrap_or_else(|| {
            incomparable = true;
            Ordering::Equal
        })
    });

    if incomparable {
        Err(Error::NotComparable { operation })
    } else {
        Ok(())
    }
}

/// Stops after `remaining` elements without pulling upstream again.
pub(crate) struct Limit<'a, T> {
    upstream: BoxPull<'a, T>,
    remaining: usize,
}

impl<'a, T> Limit<'a, T> {
    pub(crate) fn new(upstream: BoxPull<'a, T>, n: usize) -> Self {
        Self {
            upstream,
            remaining: n,
        }
    }
}

impl<T> Pull<T> for Limit<'_, T> {
    fn pull(&mut self) -> Result<Option<T>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        match self.upstream.pull()? {
            Some(element) => {
                self.remaining -= 1;
                Ok(Some(element))
            }
            None => {
                self.remaining = 0;
                Ok(None)
            }
        }
    }
}

pub(crate) struct Skip<'a, T> {
    upstream: BoxPull<'a, T>,
    pending: usize,
}

impl<'a, T> Skip<'a, T> {
    pub(crate) fn new(upstream: BoxPull<'a, T>, n: usize) -> Self {
        Self {
            upstream,
            pending: n,
        }
    }
}

impl<T> Pull<T> for Skip<'_, T> {
    fn pull(&mut self) -> Result<Option<T>> {
        while self.pending > 0 {
            if self.upstream.pull()?.is_none() {
                self.pending = 0;
                return Ok(None);
            }
            self.pending -= 1;
        }

        self.upstream.pull()
    }
}

pub(crate) struct Peek<'a, T, F> {
    upstream: BoxPull<'a, T>,
    observer: F,
}

impl<'a, T, F> Peek<'a, T, F> {
    pub(crate) fn new(upstream: BoxPull<'a, T>, observer: F) -> Self {
        Self { upstream, observer }
    }
}

impl<T, F> Pull<T> for Peek<'_, T, F>
where
    F: FnMut(&T),
{
    fn pull(&mut self) -> Result<Option<T>> {
        let element = self.upstream.pull()?;
        if let Some(element) = &element {
            (self.observer)(element);
        }
        Ok(element)
    }
}
