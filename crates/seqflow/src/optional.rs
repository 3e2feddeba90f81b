use std::fmt;

use crate::error::{Error, Result};

/// A presence/absence container returned by queries that may have no answer.
///
/// Absence is structural: an `Optional` is either present with a value or empty,
/// there is no sentinel value standing in for "nothing".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Optional<T>(Option<T>);

impl<T> Optional<T> {
    /// Creates a present `Optional` holding `value`.
    pub const fn of(value: T) -> Self {
        Self(Some(value))
    }

    /// Creates an empty `Optional`.
    pub const fn empty() -> Self {
        Self(None)
    }

    /// Creates an `Optional` from a value that may be absent.
    pub fn of_nullable(value: Option<T>) -> Self {
        Self(value)
    }

    pub const fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Returns a reference to the contained value, failing with [`Error::ValueAbsent`] if empty.
    pub fn get(&self) -> Result<&T> {
        self.0.as_ref().ok_or(Error::ValueAbsent)
    }

    /// Returns the contained value or `default`.
    pub fn or_else(self, default: T) -> T {
        self.0.unwrap_or(default)
    }

    /// Returns the contained value or the result of `supplier`.
    ///
    /// `supplier` is never invoked when a value is present.
    pub fn or_else_get(self, supplier: impl FnOnce() -> T) -> T {
        self.0.unwrap_or_else(supplier)
    }

    /// Returns the contained value, failing with [`Error::ValueAbsent`] if empty.
    pub fn or_else_throw(self) -> Result<T> {
        self.0.ok_or(Error::ValueAbsent)
    }

    /// Invokes `observer` with the contained value if present.
    pub fn if_present(&self, observer: impl FnOnce(&T)) {
        if let Some(value) = &self.0 {
            observer(value);
        }
    }

    pub fn if_present_or_else(&self, observer: impl FnOnce(&T), otherwise: impl FnOnce()) {
        match &self.0 {
            Some(value) => observer(value),
            None => otherwise(),
        }
    }

    pub fn map<U>(self, transform: impl FnOnce(T) -> U) -> Optional<U> {
        Optional(self.0.map(transform))
    }

    pub fn flat_map<U>(self, transform: impl FnOnce(T) -> Optional<U>) -> Optional<U> {
        Optional(self.0.and_then(|value| transform(value).0))
    }

    pub fn filter(self, predicate: impl FnOnce(&T) -> bool) -> Self {
        Self(self.0.filter(predicate))
    }

    /// Returns `self` if present, otherwise the `Optional` produced by `supplier`.
    pub fn or(self, supplier: impl FnOnce() -> Optional<T>) -> Self {
        match self.0 {
            Some(_) => self,
            None => supplier(),
        }
    }

    pub fn as_ref(&self) -> Optional<&T> {
        Optional(self.0.as_ref())
    }

    pub fn into_option(self) -> Option<T> {
        self.0
    }
}

impl<T> Default for Optional<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Option<T>> for Optional<T> {
    fn from(value: Option<T>) -> Self {
        Self(value)
    }
}

impl<T> From<Optional<T>> for Option<T> {
    fn from(value: Optional<T>) -> Self {
        value.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Optional<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => f.debug_tuple("Optional").field(value).finish(),
            None => f.write_str("Optional.empty"),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Optional<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => write!(f, "Optional[{}]", value),
            None => f.write_str("Optional.empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Optional::of(95.0), "Optional[95]")]
    #[case(Optional::empty(), "Optional.empty")]
    fn test_display(#[case] optional: Optional<f64>, #[case] expected: &str) {
        assert_eq!(optional.to_string(), expected);
    }

    #[test]
    fn test_get() {
        assert_eq!(Optional::of(1).get(), Ok(&1));
        assert_eq!(Optional::<i32>::empty().get(), Err(Error::ValueAbsent));
    }

    #[rstest]
    #[case(Optional::of(3), 3)]
    #[case(Optional::empty(), -1)]
    fn test_or_else(#[case] optional: Optional<i32>, #[case] expected: i32) {
        assert_eq!(optional.or_else(-1), expected);
    }

    #[test]
    fn test_or_else_get_is_lazy() {
        let calls = Cell::new(0);
        let supplier = || {
            calls.set(calls.get() + 1);
            7
        };

        assert_eq!(Optional::of(1).or_else_get(supplier), 1);
        assert_eq!(calls.get(), 0);
        assert_eq!(Optional::empty().or_else_get(supplier), 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_or_else_throw() {
        assert_eq!(Optional::of("a").or_else_throw(), Ok("a"));
        assert_eq!(Optional::<&str>::empty().or_else_throw(), Err(Error::ValueAbsent));
    }

    #[test]
    fn test_if_present() {
        let seen = Cell::new(None);
        Optional::of(5).if_present(|v| seen.set(Some(*v)));
        assert_eq!(seen.get(), Some(5));

        seen.set(None);
        Optional::<i32>::empty().if_present(|v| seen.set(Some(*v)));
        assert_eq!(seen.get(), None);
    }

    #[test]
    fn test_if_present_or_else() {
        let branch = Cell::new("");
        Optional::<i32>::empty().if_present_or_else(|_| branch.set("present"), || branch.set("empty"));
        assert_eq!(branch.get(), "empty");
    }

    #[rstest]
    #[case(Some(4), Optional::of(8))]
    #[case(Some(3), Optional::empty())]
    #[case(None, Optional::empty())]
    fn test_filter_map(#[case] value: Option<i32>, #[case] expected: Optional<i32>) {
        let actual = Optional::of_nullable(value)
            .filter(|v| v % 2 == 0)
            .map(|v| v * 2);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_flat_map_and_or() {
        let half = |v: i32| if v % 2 == 0 { Optional::of(v / 2) } else { Optional::empty() };

        assert_eq!(Optional::of(10).flat_map(half), Optional::of(5));
        assert_eq!(Optional::of(3).flat_map(half), Optional::empty());
        assert_eq!(Optional::empty().or(|| Optional::of(1)), Optional::of(1));
        assert_eq!(Optional::of(2).or(|| Optional::of(1)), Optional::of(2));
    }

    #[test]
    fn test_option_conversions() {
        let optional: Optional<i32> = Some(1).into();
        assert!(optional.is_present());
        assert_eq!(Option::from(optional), Some(1));
        assert!(Optional::<i32>::default().is_empty());
    }
}
