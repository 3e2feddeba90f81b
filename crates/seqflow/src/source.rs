use std::fmt;

use crate::error::Result;

/// Pull-based production contract shared by sources and stages.
///
/// `Ok(None)` signals end-of-sequence. Once a producer has signalled the end
/// it keeps doing so on every later pull.
pub(crate) trait Pull<T> {
    fn pull(&mut self) -> Result<Option<T>>;
}

impl<T, P> Pull<T> for Box<P>
where
    P: Pull<T> + ?Sized,
{
    fn pull(&mut self) -> Result<Option<T>> {
        self.as_mut().pull()
    }
}

pub(crate) type BoxPull<'a, T> = Box<dyn Pull<T> + 'a>;

/// Statically known upper bound on the number of elements a pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// At most this many elements.
    Finite(usize),
    /// The pipeline may or may not terminate, e.g. a predicate-bounded `iterate`.
    Unknown,
    /// The pipeline never signals end-of-sequence on its own.
    Unbounded,
}

impl Bound {
    pub const fn is_unbounded(self) -> bool {
        matches!(self, Bound::Unbounded)
    }

    pub(crate) fn limit(self, n: usize) -> Self {
        match self {
            Bound::Finite(len) => Bound::Finite(len.min(n)),
            _ => Bound::Finite(n),
        }
    }

    pub(crate) fn skip(self, n: usize) -> Self {
        match self {
            Bound::Finite(len) => Bound::Finite(len.saturating_sub(n)),
            other => other,
        }
    }

    pub(crate) fn concat(self, other: Bound) -> Self {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.saturating_add(b)),
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => Bound::Unbounded,
            _ => Bound::Unknown,
        }
    }

    /// Bound after every element is replaced by a nested sequence of unknown length.
    pub(crate) fn flatten(self) -> Self {
        match self {
            Bound::Finite(0) => Bound::Finite(0),
            Bound::Unbounded => Bound::Unbounded,
            _ => Bound::Unknown,
        }
    }
}

/// Describes where a pipeline's elements come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Collection(usize),
    Generate,
    Iterate,
    IterateWhile,
    Concat(String, String),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Collection(len) => write!(f, "collection[{}]", len),
            SourceKind::Generate => f.write_str("generate"),
            SourceKind::Iterate => f.write_str("iterate"),
            SourceKind::IterateWhile => f.write_str("iterate_while"),
            SourceKind::Concat(first, second) => write!(f, "concat({}, {})", first, second),
        }
    }
}

/// A finite source backed by an owned collection.
pub(crate) struct Bounded<T> {
    elements: std::vec::IntoIter<T>,
}

impl<T> Bounded<T> {
    pub(crate) fn new(elements: Vec<T>) -> Self {
        Self {
            elements: elements.into_iter(),
        }
    }
}

impl<T> Pull<T> for Bounded<T> {
    fn pull(&mut self) -> Result<Option<T>> {
        Ok(self.elements.next())
    }
}

/// An unbounded source producing one element per pull from a zero-argument rule.
pub(crate) struct Generate<F> {
    producer: F,
}

impl<F> Generate<F> {
    pub(crate) fn new(producer: F) -> Self {
        Self { producer }
    }
}

impl<T, F> Pull<T> for Generate<F>
where
    F: FnMut() -> T,
{
    fn pull(&mut self) -> Result<Option<T>> {
        Ok(Some((self.producer)()))
    }
}

/// A source that yields `seed`, `f(seed)`, `f(f(seed))`, ...
///
/// `has_next` is evaluated on each candidate before it is yielded. The first
/// candidate that fails it ends the sequence and is never emitted. The successor
/// is applied lazily, only when the next element is pulled.
pub(crate) struct Iterate<T, F, P> {
    seed: Option<T>,
    previous: Option<T>,
    successor: F,
    has_next: P,
    finished: bool,
}

impl<T, F, P> Iterate<T, F, P> {
    pub(crate) fn new(seed: T, has_next: P, successor: F) -> Self {
        Self {
            seed: Some(seed),
            previous: None,
            successor,
            has_next,
            finished: false,
        }
    }
}

impl<T, F, P> Pull<T> for Iterate<T, F, P>
where
    T: Clone,
    F: FnMut(&T) -> T,
    P: FnMut(&T) -> bool,
{
    fn pull(&mut self) -> Result<Option<T>> {
        if self.finished {
            return Ok(None);
        }

        let candidate = match (self.seed.take(), self.previous.take()) {
            (Some(seed), _) => seed,
            (None, Some(previous)) => (self.successor)(&previous),
            (None, None) => return Ok(None),
        };

        if !(self.has_next)(&candidate) {
            self.finished = true;
            return Ok(None);
        }

        self.previous = Some(candidate.clone());
        Ok(Some(candidate))
    }
}

/// Fully exhausts `first`, then `second`.
pub(crate) struct Concat<'a, T> {
    first: Option<BoxPull<'a, T>>,
    second: BoxPull<'a, T>,
}

impl<'a, T> Concat<'a, T> {
    pub(crate) fn new(first: BoxPull<'a, T>, second: BoxPull<'a, T>) -> Self {
        Self {
            first: Some(first),
            second,
        }
    }
}

impl<T> Pull<T> for Concat<'_, T> {
    fn pull(&mut self) -> Result<Option<T>> {
        if let Some(first) = self.first.as_mut() {
            match first.pull()? {
                Some(element) => return Ok(Some(element)),
                None => self.first = None,
            }
        }

        self.second.pull()
    }
}
