use crate::bgp::{plan_bgp, Bgp, BgpPlan, PlanOutcome, PlanStep};
use crate::bindings::{
    BoxedBindingsIterator, Columns, CrossJoinIterator, MaterializedIterator, MergeJoinIterator,
    PatternIterator,
};
use crate::QueryError;
use hexastore_storage::Hexastore;

/// Options for evaluating a [Bgp].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BgpOptions {
    /// Evaluate patterns that share no variables as a cartesian product instead of failing with
    /// [QueryError::CartesianProduct].
    pub allow_cartesian_product: bool,
}

/// Plans and evaluates `bgp` (see [plan_bgp] and [execute_plan]).
pub fn execute_bgp<'a>(
    hexastore: &'a Hexastore,
    bgp: &Bgp,
    options: BgpOptions,
) -> Result<BoxedBindingsIterator<'a>, QueryError> {
    let outcome = plan_bgp(hexastore, bgp);
    execute_plan(hexastore, bgp, &outcome, options)
}

/// Evaluates a planned `bgp`.
///
/// Every step of a plan is joined with the steps before it using a [MergeJoinIterator]. The
/// components of a disconnected plan are evaluated separately and combined with a
/// [CrossJoinIterator], if `options` allow it.
pub fn execute_plan<'a>(
    hexastore: &'a Hexastore,
    bgp: &Bgp,
    outcome: &PlanOutcome,
    options: BgpOptions,
) -> Result<BoxedBindingsIterator<'a>, QueryError> {
    match outcome {
        PlanOutcome::Empty => {
            let columns: Columns = bgp.variables().into();
            Ok(Box::new(MaterializedIterator::empty(columns)))
        }
        PlanOutcome::Connected(plan) => execute_component(hexastore, plan),
        PlanOutcome::Disconnected { plan, components } => {
            if !options.allow_cartesian_product {
                tracing::warn!(
                    components = components.len() + 1,
                    "Refusing to evaluate a disconnected basic graph pattern"
                );
                return Err(QueryError::CartesianProduct {
                    components: components.len() + 1,
                });
            }

            let mut result = execute_component(hexastore, plan)?;
            for component in components {
                let right = execute_component(hexastore, component)?;
                result = Box::new(CrossJoinIterator::new(result, right));
            }
            Ok(result)
        }
    }
}

fn execute_component<'a>(
    hexastore: &'a Hexastore,
    plan: &BgpPlan,
) -> Result<BoxedBindingsIterator<'a>, QueryError> {
    let mut steps = plan.steps().iter();
    let Some(first) = steps.next() else {
        // Without patterns, there is a single solution that binds nothing.
        let columns: Columns = Vec::new().into();
        return Ok(Box::new(MaterializedIterator::new(columns, vec![Vec::new()])));
    };

    let mut result: BoxedBindingsIterator<'a> = Box::new(pattern_iterator(hexastore, first));
    for step in steps {
        let right = Box::new(pattern_iterator(hexastore, step));
        result = match &step.join_variable {
            Some(variable) => Box::new(MergeJoinIterator::new(result, right, variable.as_str())?),
            None => Box::new(CrossJoinIterator::new(result, right)),
        };
    }
    Ok(result)
}

fn pattern_iterator<'a>(hexastore: &'a Hexastore, step: &PlanStep) -> PatternIterator<'a> {
    let pattern = step.pattern;
    let triples = hexastore.get_statements(
        pattern.subject,
        pattern.predicate,
        pattern.object,
        step.sort_position,
    );
    PatternIterator::new(triples, step.names.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::BindingsIterator;
    use hexastore_model::{NodeId, Triple};
    use hexastore_storage::{IndexConfiguration, StorageManager};
    use itertools::Itertools;

    #[test]
    fn two_hop_join() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        let y = bgp.variable("y");
        let z = bgp.variable("z");
        bgp.add_pattern(Triple::new(x, n(KNOWS), y)).unwrap();
        bgp.add_pattern(Triple::new(y, n(KNOWS), z)).unwrap();

        let result = execute_bgp(&hexastore, &bgp, BgpOptions::default()).unwrap();
        insta::assert_snapshot!(sorted_rows(result), @r"
        { x=1, y=2, z=3 }
        { x=1, y=3, z=4 }
        { x=2, y=3, z=4 }
        { x=3, y=4, z=5 }
        { x=4, y=5, z=4 }
        { x=5, y=4, z=5 }
        ");
    }

    #[test]
    fn star_join_with_check() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        let name = bgp.variable("name");
        let age = bgp.variable("age");
        bgp.add_pattern(Triple::new(x, n(NAME), name)).unwrap();
        bgp.add_pattern(Triple::new(x, n(AGE), age)).unwrap();
        bgp.add_pattern(Triple::new(x, n(TYPE), n(PERSON))).unwrap();
        bgp.add_pattern(Triple::new(n(1), n(KNOWS), n(2))).unwrap();

        let result = execute_bgp(&hexastore, &bgp, BgpOptions::default()).unwrap();
        insta::assert_snapshot!(sorted_rows(result), @r"
        { x=1, name=101, age=201 }
        { x=2, name=102, age=202 }
        ");
    }

    #[test]
    fn cycle_with_repeated_variable() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        let y = bgp.variable("y");
        bgp.add_pattern(Triple::new(x, n(KNOWS), y)).unwrap();
        bgp.add_pattern(Triple::new(y, n(KNOWS), x)).unwrap();
        bgp.add_pattern(Triple::new(x, n(LIKES), x)).unwrap();

        let result = execute_bgp(&hexastore, &bgp, BgpOptions::default()).unwrap();
        insta::assert_snapshot!(sorted_rows(result), @"{ x=4, y=5 }");
    }

    #[test]
    fn no_match_gives_empty_result_with_columns() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        bgp.add_pattern(Triple::new(x, n(KNOWS), n(99))).unwrap();

        let result = execute_bgp(&hexastore, &bgp, BgpOptions::default()).unwrap();
        assert_eq!(&**result.columns(), ["x"]);
        assert!(result.finished());
    }

    #[test]
    fn empty_bgp_has_one_solution() {
        let hexastore = create_hexastore();
        let result = execute_bgp(&hexastore, &Bgp::new(), BgpOptions::default()).unwrap();
        assert_eq!(result.into_rows().count(), 1);
    }

    #[test]
    fn cartesian_product_requires_opt_in() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        let a = bgp.variable("a");
        bgp.add_pattern(Triple::new(x, n(TYPE), n(PERSON))).unwrap();
        bgp.add_pattern(Triple::new(a, n(LIKES), a)).unwrap();

        let error = execute_bgp(&hexastore, &bgp, BgpOptions::default())
            .err()
            .unwrap();
        assert!(matches!(error, QueryError::CartesianProduct { components: 2 }));

        let options = BgpOptions {
            allow_cartesian_product: true,
        };
        let result = execute_bgp(&hexastore, &bgp, options).unwrap();
        insta::assert_snapshot!(sorted_rows(result), @r"
        { a=4, x=1 }
        { a=4, x=2 }
        ");
    }

    const KNOWS: i64 = 10;
    const NAME: i64 = 11;
    const TYPE: i64 = 12;
    const AGE: i64 = 13;
    const LIKES: i64 = 14;
    const PERSON: i64 = 20;

    /// A knows-chain 1 → 2 → 3 → 4 with a shortcut 1 → 3 and a mutual pair 4 ↔ 5. 4 likes
    /// itself. 1 and 2 are persons with a name and an age.
    fn create_hexastore() -> Hexastore {
        let mut hexastore =
            Hexastore::new(StorageManager::memory(), IndexConfiguration::default()).unwrap();
        let mut triples = vec![
            Triple::from_raw(1, KNOWS, 2),
            Triple::from_raw(1, KNOWS, 3),
            Triple::from_raw(2, KNOWS, 3),
            Triple::from_raw(3, KNOWS, 4),
            Triple::from_raw(4, KNOWS, 5),
            Triple::from_raw(5, KNOWS, 4),
            Triple::from_raw(4, LIKES, 4),
            Triple::from_raw(5, LIKES, 4),
        ];
        for person in 1..=2 {
            triples.push(Triple::from_raw(person, TYPE, PERSON));
            triples.push(Triple::from_raw(person, NAME, 100 + person));
            triples.push(Triple::from_raw(person, AGE, 200 + person));
        }
        hexastore.add_triple_batch(triples).unwrap();
        hexastore
    }

    fn sorted_rows(iterator: BoxedBindingsIterator<'_>) -> String {
        iterator
            .into_rows()
            .map(|row| row.to_string())
            .sorted()
            .join("\n")
    }

    fn n(value: i64) -> NodeId {
        NodeId::new(value)
    }
}
