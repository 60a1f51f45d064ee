use crate::bgp::Bgp;
use hexastore_model::{Triple, TriplePosition};
use hexastore_storage::Hexastore;
use std::fmt::{Display, Formatter};

/// One pattern of a [BgpPlan].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// The triple pattern.
    pub pattern: Triple,
    /// The column name of the subject, predicate, and object.
    pub names: [Option<String>; 3],
    /// The number of triples matching the pattern.
    pub cost: u64,
    /// The variable that joins this step with the steps before it. [None] for the first step.
    pub join_variable: Option<String>,
    /// The position the matches of the pattern should be sorted by.
    pub sort_position: TriplePosition,
}

impl PlanStep {
    fn variables(&self) -> impl Iterator<Item = &str> {
        self.names.iter().flatten().map(String::as_str)
    }

    fn position_of(&self, variable: &str) -> Option<TriplePosition> {
        TriplePosition::ALL
            .into_iter()
            .find(|position| self.names[position.spo_index()].as_deref() == Some(variable))
    }
}

impl Display for PlanStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for position in TriplePosition::ALL {
            if position != TriplePosition::Subject {
                write!(f, ", ")?;
            }
            let node = self.pattern.get(position);
            match &self.names[position.spo_index()] {
                Some(name) => write!(f, "?{name}")?,
                None if node.is_wildcard() => write!(f, "*")?,
                None => write!(f, "{node}")?,
            }
        }
        write!(f, ") cost={}", self.cost)?;
        match &self.join_variable {
            Some(variable) => write!(f, " join ?{variable}"),
            None => write!(f, " sorted by {}", self.sort_position),
        }
    }
}

/// An ordered list of patterns where every pattern shares a variable with a pattern before it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BgpPlan {
    steps: Vec<PlanStep>,
}

impl BgpPlan {
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Orders the steps (given in ascending cost) so that each one is connected to the ones
    /// before it, starting with the cheapest. Steps that cannot be connected are returned.
    fn connect(mut candidates: Vec<PlanStep>) -> (Self, Vec<PlanStep>) {
        let mut steps: Vec<PlanStep> = Vec::new();
        if !candidates.is_empty() {
            steps.push(candidates.remove(0));
        }

        while let Some(next) = candidates.iter().position(|candidate| {
            candidate
                .variables()
                .any(|variable| steps.iter().any(|step| step.position_of(variable).is_some()))
        }) {
            let mut step = candidates.remove(next);
            let join_variable = choose_join_variable(&steps, &step);
            if let Some(variable) = join_variable.as_deref() {
                if let Some(position) = step.position_of(variable) {
                    step.sort_position = position;
                }
                // The first pattern is sorted by the variable it is joined on.
                if steps.len() == 1 {
                    if let Some(position) = steps[0].position_of(variable) {
                        steps[0].sort_position = position;
                    }
                }
            }
            step.join_variable = join_variable;
            steps.push(step);
        }

        (Self { steps }, candidates)
    }
}

/// Prefers the join variable of the previous step, as the intermediate result is sorted by it.
fn choose_join_variable(steps: &[PlanStep], step: &PlanStep) -> Option<String> {
    let previous = steps.last().and_then(|last| last.join_variable.as_deref());
    if let Some(previous) = previous.filter(|variable| step.position_of(variable).is_some()) {
        return Some(previous.to_owned());
    }
    step.variables()
        .find(|variable| steps.iter().any(|s| s.position_of(variable).is_some()))
        .map(str::to_owned)
}

impl Display for BgpPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{i}: {step}")?;
        }
        Ok(())
    }
}

/// The result of planning a [Bgp].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// A pattern has no matches, so neither has the whole [Bgp].
    Empty,
    /// All patterns are connected.
    Connected(BgpPlan),
    /// The patterns form several groups that share no variables. `plan` starts with the cheapest
    /// pattern and `components` holds the other groups.
    Disconnected {
        plan: BgpPlan,
        components: Vec<BgpPlan>,
    },
}

impl Display for PlanOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanOutcome::Empty => write!(f, "empty"),
            PlanOutcome::Connected(plan) => write!(f, "{plan}"),
            PlanOutcome::Disconnected { plan, components } => {
                write!(f, "component 0:\n{plan}")?;
                for (i, component) in components.iter().enumerate() {
                    write!(f, "\ncomponent {}:\n{component}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Plans the evaluation of `bgp`.
///
/// Each pattern is weighted by [Hexastore::count_statements]. The patterns are sorted by weight
/// (equal weights keep their order), and every pattern after the first is the cheapest remaining
/// one that shares a variable with the patterns before it. Patterns without variables only check
/// that a triple exists and are not part of the plan.
pub fn plan_bgp(hexastore: &Hexastore, bgp: &Bgp) -> PlanOutcome {
    let mut steps = Vec::with_capacity(bgp.len());
    for pattern in bgp.patterns() {
        let cost = hexastore.count_statements(pattern.subject, pattern.predicate, pattern.object);
        if cost == 0 {
            tracing::debug!(%pattern, "Pattern has no matches");
            return PlanOutcome::Empty;
        }

        let names = bgp.column_names(pattern);
        let sort_position = first_variable_position(&names).unwrap_or(TriplePosition::Subject);
        let step = PlanStep {
            pattern: *pattern,
            names,
            cost,
            join_variable: None,
            sort_position,
        };
        if step.variables().next().is_some() {
            steps.push(step);
        }
    }
    steps.sort_by_key(|step| step.cost);

    let (plan, mut remaining) = BgpPlan::connect(steps);
    let mut components = Vec::new();
    while !remaining.is_empty() {
        let (component, rest) = BgpPlan::connect(remaining);
        components.push(component);
        remaining = rest;
    }

    let outcome = if components.is_empty() {
        PlanOutcome::Connected(plan)
    } else {
        PlanOutcome::Disconnected { plan, components }
    };
    tracing::debug!(plan = %outcome, "Planned basic graph pattern");
    outcome
}

fn first_variable_position(names: &[Option<String>; 3]) -> Option<TriplePosition> {
    names
        .iter()
        .position(Option::is_some)
        .and_then(TriplePosition::from_spo_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexastore_model::NodeId;
    use hexastore_storage::{IndexConfiguration, StorageManager};

    #[test]
    fn orders_by_cost() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        let y = bgp.variable("y");
        let z = bgp.variable("z");
        bgp.add_pattern(Triple::new(x, n(KNOWS), y)).unwrap();
        bgp.add_pattern(Triple::new(y, n(NAME), z)).unwrap();
        bgp.add_pattern(Triple::new(x, n(TYPE), n(PERSON))).unwrap();

        insta::assert_snapshot!(plan_bgp(&hexastore, &bgp), @r"
        0: (?x, 12, 20) cost=2 sorted by S
        1: (?x, 10, ?y) cost=3 join ?x
        2: (?y, 11, ?z) cost=4 join ?y
        ");
    }

    #[test]
    fn keeps_order_of_equal_costs() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        let a = bgp.variable("a");
        let b = bgp.variable("b");
        bgp.add_pattern(Triple::new(x, n(NAME), a)).unwrap();
        bgp.add_pattern(Triple::new(x, n(AGE), b)).unwrap();

        insta::assert_snapshot!(plan_bgp(&hexastore, &bgp), @r"
        0: (?x, 11, ?a) cost=4 sorted by S
        1: (?x, 13, ?b) cost=4 join ?x
        ");
    }

    #[test]
    fn connected_pattern_is_moved_forward() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        let y = bgp.variable("y");
        let z = bgp.variable("z");
        // (?y, knows, ?z) is cheaper than (?x, name, ?y) but shares no variable with the first
        // pattern.
        bgp.add_pattern(Triple::new(x, n(TYPE), n(PERSON))).unwrap();
        bgp.add_pattern(Triple::new(y, n(KNOWS), z)).unwrap();
        bgp.add_pattern(Triple::new(x, n(NAME), y)).unwrap();

        insta::assert_snapshot!(plan_bgp(&hexastore, &bgp), @r"
        0: (?x, 12, 20) cost=2 sorted by S
        1: (?x, 11, ?y) cost=4 join ?x
        2: (?y, 10, ?z) cost=3 join ?y
        ");
    }

    #[test]
    fn disconnected_patterns_are_flagged() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        let y = bgp.variable("y");
        let z = bgp.variable("z");
        let a = bgp.variable("a");
        let b = bgp.variable("b");
        bgp.add_pattern(Triple::new(x, n(KNOWS), y)).unwrap();
        bgp.add_pattern(Triple::new(y, n(NAME), z)).unwrap();
        bgp.add_pattern(Triple::new(a, n(AGE), b)).unwrap();

        let outcome = plan_bgp(&hexastore, &bgp);
        insta::assert_snapshot!(outcome, @r"
        component 0:
        0: (?x, 10, ?y) cost=3 sorted by O
        1: (?y, 11, ?z) cost=4 join ?y
        component 1:
        0: (?a, 13, ?b) cost=4 sorted by S
        ");

        let PlanOutcome::Disconnected { plan, components } = outcome else {
            panic!("Expected a disconnected plan");
        };
        assert_eq!(plan.steps().len(), 2);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].steps()[0].pattern, Triple::new(a, n(AGE), b));
    }

    #[test]
    fn pattern_without_matches_empties_the_plan() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        bgp.add_pattern(Triple::new(x, n(KNOWS), n(99))).unwrap();
        bgp.add_pattern(Triple::new(x, n(NAME), NodeId::WILDCARD)).unwrap();

        assert_eq!(plan_bgp(&hexastore, &bgp), PlanOutcome::Empty);
    }

    #[test]
    fn ground_patterns_are_checks() {
        let hexastore = create_hexastore();
        let mut bgp = Bgp::new();
        let x = bgp.variable("x");
        bgp.add_pattern(Triple::new(n(1), n(TYPE), n(PERSON))).unwrap();
        bgp.add_pattern(Triple::new(x, n(AGE), NodeId::WILDCARD)).unwrap();

        insta::assert_snapshot!(
            plan_bgp(&hexastore, &bgp),
            @"0: (?x, 13, *) cost=4 sorted by S"
        );
    }

    const KNOWS: i64 = 10;
    const NAME: i64 = 11;
    const TYPE: i64 = 12;
    const AGE: i64 = 13;
    const PERSON: i64 = 20;

    /// People 1 to 4. 1 knows 2 and 3, 2 knows 3. 1 and 2 are persons. Everyone has a name and
    /// an age.
    fn create_hexastore() -> Hexastore {
        let mut hexastore =
            Hexastore::new(StorageManager::memory(), IndexConfiguration::default()).unwrap();
        let mut triples = vec![
            Triple::from_raw(1, KNOWS, 2),
            Triple::from_raw(1, KNOWS, 3),
            Triple::from_raw(2, KNOWS, 3),
            Triple::from_raw(1, TYPE, PERSON),
            Triple::from_raw(2, TYPE, PERSON),
        ];
        for person in 1..=4 {
            triples.push(Triple::from_raw(person, NAME, 100 + person));
            triples.push(Triple::from_raw(person, AGE, 200 + person));
        }
        hexastore.add_triple_batch(triples).unwrap();
        hexastore
    }

    fn n(value: i64) -> NodeId {
        NodeId::new(value)
    }
}
