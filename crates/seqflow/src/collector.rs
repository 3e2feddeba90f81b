use std::fmt;

type Supplier<A> = Box<dyn Fn() -> A + Send + Sync>;
type Accumulator<A, T> = Box<dyn Fn(&mut A, T) + Send + Sync>;
type Combiner<A> = Box<dyn Fn(&mut A, A) + Send + Sync>;
type Finisher<A, R> = Box<dyn Fn(A) -> R + Send + Sync>;

/// A reusable mutable-reduction recipe.
///
/// Bundles a `supplier` creating a fresh container, an `accumulator` inserting
/// one element, a `combiner` merging two partial containers (used by parallel
/// evaluation), and a `finisher` applied to the container before it is returned.
/// See [`collectors`](crate::collectors) for ready-made collectors.
pub struct Collector<T, A, R> {
    supplier: Supplier<A>,
    accumulator: Accumulator<A, T>,
    combiner: Combiner<A>,
    finisher: Finisher<A, R>,
}

impl<T, A: 'static> Collector<T, A, A> {
    /// Creates a collector whose result is the container itself.
    pub fn of(
        supplier: impl Fn() -> A + Send + Sync + 'static,
        accumulator: impl Fn(&mut A, T) + Send + Sync + 'static,
        combiner: impl Fn(&mut A, A) + Send + Sync + 'static,
    ) -> Self {
        Self::with_finisher(supplier, accumulator, combiner, |container| container)
    }
}

impl<T, A, R> Collector<T, A, R> {
    pub fn with_finisher(
        supplier: impl Fn() -> A + Send + Sync + 'static,
        accumulator: impl Fn(&mut A, T) + Send + Sync + 'static,
        combiner: impl Fn(&mut A, A) + Send + Sync + 'static,
        finisher: impl Fn(A) -> R + Send + Sync + 'static,
    ) -> Self {
        Self {
            supplier: Box::new(supplier),
            accumulator: Box::new(accumulator),
            combiner: Box::new(combiner),
            finisher: Box::new(finisher),
        }
    }

    /// Appends `transform` to the finisher.
    pub fn and_then<S>(self, transform: impl Fn(R) -> S + Send + Sync + 'static) -> Collector<T, A, S>
    where
        A: 'static,
        R: 'static,
    {
        let finisher = self.finisher;
        Collector {
            supplier: self.supplier,
            accumulator: self.accumulator,
            combiner: self.combiner,
            finisher: Box::new(move |container| transform(finisher(container))),
        }
    }

    pub(crate) fn supply(&self) -> A {
        (self.supplier)()
    }

    pub(crate) fn accumulate(&self, container: &mut A, element: T) {
        (self.accumulator)(container, element)
    }

    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    pub(crate) fn combine(&self, container: &mut A, other: A) {
        (self.combiner)(container, other)
    }

    pub(crate) fn finish(&self, container: A) -> R {
        (self.finisher)(container)
    }
}

impl<T, A, R> fmt::Debug for Collector<T, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("container", &std::any::type_name::<A>())
            .field("result", &std::any::type_name::<R>())
            .finish()
    }
}
