//! Ready-made [`Collector`]s.
//!
//! ```rust
//! use seqflow::{Pipeline, collectors};
//!
//! let animals = Pipeline::of(vec!["lion", "tiger", "bear"]);
//! let joined = animals.collect(&collectors::joining(", ")).unwrap();
//! assert_eq!(joined, "lion, tiger, bear");
//! ```
use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    hash::Hash,
};

use crate::collector::Collector;

pub fn to_list<T: 'static>() -> Collector<T, Vec<T>, Vec<T>> {
    Collector::of(
        Vec::new,
        |list: &mut Vec<T>, element| list.push(element),
        |list: &mut Vec<T>, mut other| list.append(&mut other),
    )
}

/// Collects into a `HashSet`; iteration order of the result is unspecified.
pub fn to_set<T>() -> Collector<T, HashSet<T>, HashSet<T>>
where
    T: Eq + Hash + 'static,
{
    Collector::of(
        HashSet::new,
        |set: &mut HashSet<T>, element| {
            set.insert(element);
        },
        |set: &mut HashSet<T>, other| set.extend(other),
    )
}

/// Collects into any extendable collection created by `factory`.
pub fn to_collection<T, C>(factory: impl Fn() -> C + Send + Sync + 'static) -> Collector<T, C, C>
where
    T: 'static,
    C: Extend<T> + IntoIterator<Item = T> + 'static,
{
    Collector::of(
        factory,
        |collection: &mut C, element| collection.extend(std::iter::once(element)),
        |collection: &mut C, other| collection.extend(other),
    )
}

/// Concatenates the `Display` form of each element, separated by `separator`.
pub fn joining<T>(separator: impl Into<String>) -> Collector<T, Vec<String>, String>
where
    T: Display + 'static,
{
    let separator = separator.into();
    Collector::with_finisher(
        Vec::new,
        |parts: &mut Vec<String>, element: T| parts.push(element.to_string()),
        |parts: &mut Vec<String>, mut other| parts.append(&mut other),
        move |parts| parts.join(&separator),
    )
}

pub fn counting<T: 'static>() -> Collector<T, usize, usize> {
    Collector::of(
        || 0,
        |count: &mut usize, _element: T| *count += 1,
        |count: &mut usize, other| *count += other,
    )
}

/// Groups elements by `key`, keeping encounter order within each group.
pub fn grouping_by<T, K>(
    key: impl Fn(&T) -> K + Send + Sync + 'static,
) -> Collector<T, HashMap<K, Vec<T>>, HashMap<K, Vec<T>>>
where
    T: 'static,
    K: Eq + Hash + 'static,
{
    Collector::of(
        HashMap::new,
        move |groups: &mut HashMap<K, Vec<T>>, element| {
            groups.entry(key(&element)).or_default().push(element);
        },
        merge_groups,
    )
}

/// Splits elements into the `true` and `false` groups of `predicate`.
///
/// Both keys are always present in the result, possibly with empty groups.
pub fn partitioning_by<T>(
    predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
) -> Collector<T, HashMap<bool, Vec<T>>, HashMap<bool, Vec<T>>>
where
    T: 'static,
{
    Collector::of(
        || HashMap::from([(false, Vec::new()), (true, Vec::new())]),
        move |groups: &mut HashMap<bool, Vec<T>>, element| {
            groups.entry(predicate(&element)).or_default().push(element);
        },
        merge_groups,
    )
}

fn merge_groups<K: Eq + Hash, T>(groups: &mut HashMap<K, Vec<T>>, other: HashMap<K, Vec<T>>) {
    for (key, mut elements) in other {
        groups.entry(key).or_default().append(&mut elements);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::Pipeline;
    use rstest::rstest;

    #[test]
    fn test_to_list() {
        let list = Pipeline::of(vec![3, 1, 2]).collect(&to_list());
        assert_eq!(list, Ok(vec![3, 1, 2]));
    }

    #[test]
    fn test_to_set() {
        let set = Pipeline::of(vec!["w", "o", "l", "f", "w"]).collect(&to_set());
        assert_eq!(set, Ok(HashSet::from(["f", "l", "o", "w"])));
    }

    #[test]
    fn test_to_collection() {
        let set = Pipeline::of(vec!["w", "o", "l", "f"]).collect(&to_collection(BTreeSet::new));
        assert_eq!(
            set.map(|set| set.into_iter().collect::<Vec<_>>()),
            Ok(vec!["f", "l", "o", "w"])
        );
    }

    #[rstest]
    #[case(vec![], "")]
    #[case(vec![1], "1")]
    #[case(vec![1, 2, 3], "1-2-3")]
    fn test_joining(#[case] input: Vec<i32>, #[case] expected: &str) {
        assert_eq!(Pipeline::of(input).collect(&joining("-")), Ok(expected.to_string()));
    }

    #[test]
    fn test_counting() {
        let count = Pipeline::iterate(1, |n| n + 1).limit(7).collect(&counting());
        assert_eq!(count, Ok(7));
    }

    #[test]
    fn test_grouping_by() {
        let groups = Pipeline::of(vec!["ape", "bear", "cat", "bonobo"]).collect(&grouping_by(|s: &&str| s.len()));
        assert_eq!(
            groups,
            Ok(HashMap::from([(3, vec!["ape", "cat"]), (4, vec!["bear"]), (6, vec!["bonobo"])]))
        );
    }

    #[test]
    fn test_partitioning_by_keeps_both_keys() {
        let groups = Pipeline::of(vec![2, 4]).collect(&partitioning_by(|n: &i32| n % 2 == 0));
        assert_eq!(
            groups,
            Ok(HashMap::from([(true, vec![2, 4]), (false, vec![])]))
        );
    }

    #[test]
    fn test_merge_groups() {
        let mut left = HashMap::from([("a", vec![1]), ("b", vec![2])]);
        merge_groups(&mut left, HashMap::from([("a", vec![3]), ("c", vec![4])]));
        assert_eq!(
            left,
            HashMap::from([("a", vec![1, 3]), ("b", vec![2]), ("c", vec![4])])
        );
    }
}
