use std::{cell::RefCell, cmp::Ordering, collections::BTreeSet, fmt::Display, io::Write};

use colored::Colorize;
use itertools::Itertools;
use miette::IntoDiagnostic;
use seqflow::{Optional, Pipeline, collectors};

#[cfg(feature = "parallel")]
use seqflow::{Options, ParallelPipeline};

/// Prints each demonstration as `expression => result` lines to `W`.
pub struct Demo<W: Write> {
    out: W,
    #[cfg(feature = "parallel")]
    parallel: Option<Options>,
}

impl<W: Write> Demo<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            #[cfg(feature = "parallel")]
            parallel: None,
        }
    }

    /// Runs the reduction and collection demos on parallel pipelines configured by `options`.
    #[cfg(feature = "parallel")]
    pub fn set_parallel(&mut self, options: Options) {
        self.parallel = Some(options);
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn all(&mut self) -> miette::Result<()> {
        self.create()?;
        self.terminal()?;
        self.intermediate()?;
        self.optional()
    }

    pub fn create(&mut self) -> miette::Result<()> {
        self.section("Finite sources")?;
        self.show("Pipeline::<&str>::empty().count()", Pipeline::<&str>::empty().count()?)?;
        self.show("Pipeline::of([1]).count()", Pipeline::of([1]).count()?)?;
        self.show("Pipeline::of([1, 2, 3]).count()", Pipeline::of([1, 2, 3]).count()?)?;

        let letters = vec!["a", "b", "c"];
        self.show(
            "Pipeline::from_collection(&letters).count()",
            Pipeline::from_collection(&letters).count()?,
        )?;
        #[cfg(feature = "parallel")]
        self.show(
            "ParallelPipeline::from_collection(letters).count()",
            ParallelPipeline::from_collection(letters).count()?,
        )?;

        self.section("Infinite sources")?;
        let mut ticks = 0;
        let generated = Pipeline::generate(move || {
            ticks += 1;
            ticks
        });
        self.show("Pipeline::generate(tick).count()", outcome(generated.count()))?;

        let odd_numbers = Pipeline::iterate(1, |n| n + 2).limit(5);
        let description = odd_numbers.describe();
        self.show(&description, list(odd_numbers.to_vec()?))?;

        let under_100 = Pipeline::iterate_while(1, |n| *n < 100, |n| n + 2);
        self.show(
            "Pipeline::iterate_while(1, n < 100, n + 2).count()",
            under_100.count()?,
        )?;
        self.show(
            "Pipeline::iterate_while(1, n < 100, n + 2).max()",
            Pipeline::iterate_while(1, |n| *n < 100, |n| n + 2).max()?,
        )
    }

    pub fn terminal(&mut self) -> miette::Result<()> {
        self.section("Terminal operations")?;
        let animals = || Pipeline::of(["monkey", "ape", "bonobo"]);

        self.show("count()", animals().count()?)?;
        self.show("min_by(length)", animals().min_by(|a, b| a.len().cmp(&b.len()))?)?;
        self.show(
            "empty().min_by(..).is_present()",
            Pipeline::<&str>::empty()
                .min_by(|_, _| Ordering::Equal)?
                .is_present(),
        )?;
        self.show("find_any()", animals().find_any()?)?;
        self.show("generate(chimp).find_any()", Pipeline::generate(|| "chimp").find_any()?)?;

        let words = || Pipeline::of(["monkey", "2", "chimp"]);
        let starts_with_letter = |x: &&str| x.starts_with(char::is_alphabetic);
        self.show("any_match(starts with letter)", words().any_match(starts_with_letter)?)?;
        self.show("all_match(starts with letter)", words().all_match(starts_with_letter)?)?;
        self.show("none_match(starts with letter)", words().none_match(starts_with_letter)?)?;
        self.show(
            "generate(chimp).any_match(starts with letter)",
            Pipeline::generate(|| "chimp").any_match(starts_with_letter)?,
        )?;

        let mut printed = String::new();
        Pipeline::of(["Monkey", "Gorilla", "Bonobo"]).for_each(|s| printed.push_str(s))?;
        self.show("for_each(print)", printed)?;

        #[cfg(feature = "parallel")]
        if let Some(options) = self.parallel.clone() {
            return self.parallel_reductions(options);
        }
        self.reductions()
    }

    fn reductions(&mut self) -> miette::Result<()> {
        self.section("Reducing and collecting")?;
        let letters = || Pipeline::of(["w", "o", "l", "f"]);

        self.show(
            "reduce_from(\"\", concat)",
            letters()
                .map(String::from)
                .reduce_from(String::new(), |z, c| z + &c)?,
        )?;

        let product = |a: i32, b: i32| a * b;
        self.show("empty().reduce(a * b)", Pipeline::<i32>::empty().reduce(product)?)?;
        self.show("of([3]).reduce(a * b)", Pipeline::of([3]).reduce(product)?)?;
        self.show("of([3, 5, 6]).reduce(a * b)", Pipeline::of([3, 5, 6]).reduce(product)?)?;
        self.show(
            "reduce_with(0, i + len, a + b)",
            letters().reduce_with(0, |i, z| i + z.len(), |a, b| a + b)?,
        )?;

        self.show(
            "collect_with(String::new, push_str, push_str)",
            letters().collect_with(String::new, |acc, s| acc.push_str(s), |acc, other| acc.push_str(&other))?,
        )?;
        self.show(
            "collect_with(BTreeSet::new, insert, extend)",
            list(letters().collect_with(
                BTreeSet::new,
                |set, s| {
                    set.insert(s);
                },
                |set, other| set.extend(other),
            )?),
        )?;
        self.show(
            "collect(to_collection(BTreeSet::new))",
            list(letters().collect(&collectors::to_collection(BTreeSet::new))?),
        )?;
        self.show("collect(to_set()).len()", letters().collect(&collectors::to_set())?.len())?;
        self.show("collect(joining(\", \"))", letters().collect(&collectors::joining(", "))?)?;

        let halves = Pipeline::of(1..=6).collect(&collectors::partitioning_by(|n: &i32| n % 2 == 0))?;
        self.show("collect(partitioning_by(even))[true]", list(&halves[&true]))?;
        self.show("collect(partitioning_by(even))[false]", list(&halves[&false]))?;

        self.show("of(1..=10).sum()", Pipeline::of(1..=10).sum()?)?;
        self.show("of([90, 100]).average()", Pipeline::of([90, 100]).average()?)
    }

    #[cfg(feature = "parallel")]
    fn parallel_reductions(&mut self, options: Options) -> miette::Result<()> {
        self.section(&format!(
            "Reducing and collecting in parallel ({} partitions)",
            options.partitions
        ))?;
        let letters = || ParallelPipeline::with_options(["w", "o", "l", "f"], options.clone());

        self.show(
            "reduce_from(\"\", concat)",
            letters()
                .map(String::from)
                .reduce_from(String::new(), |z, c| z + &c)?,
        )?;

        let product = |a: i32, b: i32| a * b;
        self.show(
            "empty().reduce(a * b)",
            ParallelPipeline::<i32>::with_options([], options.clone()).reduce(product)?,
        )?;
        self.show(
            "of([3]).reduce(a * b)",
            ParallelPipeline::with_options([3], options.clone()).reduce(product)?,
        )?;
        self.show(
            "of([3, 5, 6]).reduce(a * b)",
            ParallelPipeline::with_options([3, 5, 6], options.clone()).reduce(product)?,
        )?;
        self.show(
            "reduce_with(0, i + len, a + b)",
            letters().reduce_with(0, |i, z| i + z.len(), |a, b| a + b)?,
        )?;

        self.show(
            "collect_with(String::new, push_str, push_str)",
            letters().collect_with(String::new, |acc, s| acc.push_str(s), |acc, other| acc.push_str(&other))?,
        )?;
        self.show(
            "collect_with(BTreeSet::new, insert, extend)",
            list(letters().collect_with(
                BTreeSet::new,
                |set, s| {
                    set.insert(s);
                },
                |set, other| set.extend(other),
            )?),
        )?;
        self.show(
            "collect(to_collection(BTreeSet::new))",
            list(letters().collect(&collectors::to_collection(BTreeSet::new))?),
        )?;
        self.show("collect(to_set()).len()", letters().collect(&collectors::to_set())?.len())?;
        self.show("collect(joining(\", \"))", letters().collect(&collectors::joining(", "))?)?;

        let halves = ParallelPipeline::with_options(1..=6, options.clone())
            .collect(&collectors::partitioning_by(|n: &i32| n % 2 == 0))?;
        self.show("collect(partitioning_by(even))[true]", list(&halves[&true]))?;
        self.show("collect(partitioning_by(even))[false]", list(&halves[&false]))?;

        self.show(
            "of(1..=10).sum()",
            ParallelPipeline::with_options(1..=10, options.clone()).sum()?,
        )?;
        self.show(
            "of([90, 100]).average()",
            ParallelPipeline::with_options([90, 100], options).average()?,
        )
    }

    pub fn intermediate(&mut self) -> miette::Result<()> {
        self.section("Intermediate operations")?;
        let primates = || Pipeline::of(["monkey", "gorilla", "bonobo"]);

        self.show(
            "filter(starts with m)",
            primates()
                .filter(|x| x.starts_with('m'))
                .collect(&collectors::joining(""))?,
        )?;
        self.show(
            "distinct()",
            Pipeline::of(["duck", "duck", "duck", "goose"])
                .distinct()
                .collect(&collectors::joining(""))?,
        )?;

        let positions = Pipeline::iterate(1, |n| n + 1).skip(5).limit(2);
        let description = positions.describe();
        self.show(&description, positions.collect(&collectors::joining(""))?)?;

        self.show("map(len)", primates().map(str::len).collect(&collectors::joining(""))?)?;

        let zero: Vec<&str> = Vec::new();
        let one = vec!["Bonobo"];
        let two = vec!["Mama Gorilla", "Baby Gorilla"];
        self.show(
            "flat_map(identity)",
            list(Pipeline::of([zero, one, two]).flat_map(|animals| animals).to_vec()?),
        )?;
        self.show(
            "concat(of([Bonobo]), of([Mama Gorilla, Baby Gorilla]))",
            list(
                Pipeline::concat(
                    Pipeline::of(["Bonobo"]),
                    Pipeline::of(["Mama Gorilla", "Baby Gorilla"]),
                )
                .to_vec()?,
            ),
        )?;

        self.show(
            "sorted()",
            Pipeline::of(["brown-", "bear-"])
                .sorted()
                .collect(&collectors::joining(""))?,
        )?;
        self.show(
            "sorted_by(reverse)",
            Pipeline::of(["brown bear-", "grizzly-"])
                .sorted_by(|a, b| b.cmp(a))
                .collect(&collectors::joining(""))?,
        )?;
        self.show(
            "of([2.0, NaN]).sorted().count()",
            outcome(Pipeline::of([2.0, f64::NAN]).sorted().count()),
        )?;

        let peeked = RefCell::new(Vec::new());
        let count = Pipeline::of(["black bear", "brown bear", "grizzly"])
            .filter(|u| u.starts_with('g'))
            .peek(|u| peeked.borrow_mut().push(*u))
            .count()?;
        self.show("filter(starts with g).peek(print)", list(peeked.into_inner()))?;
        self.show("filter(starts with g).peek(print).count()", count)
    }

    pub fn optional(&mut self) -> miette::Result<()> {
        self.section("Optional")?;

        self.show("average(90, 100)", average(&[90, 100])?)?;
        self.show("average()", average(&[])?)?;

        let present = average(&[90, 100])?;
        if present.is_present() {
            self.show("average(90, 100).get()", present.get()?)?;
        }
        self.show("average().get()", outcome(average(&[])?.get().copied()))?;
        self.show("Optional::of_nullable(None)", Optional::<f64>::of_nullable(None))?;

        let mut observed = None;
        present.if_present(|value| observed = Some(*value));
        self.show("average(90, 100).if_present(print)", Optional::from(observed))?;

        self.show("average(90, 100).or_else(NaN)", present.or_else(f64::NAN))?;
        self.show("average(90, 100).or_else_get(random)", present.or_else_get(|| 0.5))?;
        self.show("average(90, 100).or_else_throw()", present.or_else_throw()?)?;
        self.show("average().or_else(NaN)", average(&[])?.or_else(f64::NAN))
    }

    fn section(&mut self, title: &str) -> miette::Result<()> {
        writeln!(self.out, "{}", title.bold().cyan()).into_diagnostic()
    }

    fn show(&mut self, expression: &str, value: impl Display) -> miette::Result<()> {
        writeln!(self.out, "  {} {} {}", expression.green(), "=>".dimmed(), value).into_diagnostic()
    }
}

fn average(scores: &[i32]) -> seqflow::Result<Optional<f64>> {
    Pipeline::of(scores.iter().copied()).average()
}

fn list<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    format!("[{}]", items.into_iter().join(", "))
}

/// Renders an operation that is expected to fail without aborting the walkthrough.
fn outcome<T: Display>(result: seqflow::Result<T>) -> String {
    match result {
        Ok(value) => value.to_string(),
        Err(err) => format!("{} {}", "error:".red(), err),
    }
}
