use std::fmt::Debug;
use std::hash::Hash;

use smallvec::SmallVec;
use thiserror::Error;

pub use crate::cost::Cost;

pub trait Action: Copy + Clone + Debug + PartialEq + Eq {}
pub trait State: Copy + Clone + Debug + PartialEq + Eq + Hash {}

/// Actions applicable on a State.
///
/// Most of our spaces have a small branching factor, so these rarely spill.
pub type Actions<A> = SmallVec<[A; 4]>;

/// A problem-definition failure found while searching.
///
/// States and actions are kept in their `Debug` form so this error does not
/// need to be generic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProblemError {
    #[error("No heuristic value for state {state}")]
    MissingHeuristic { state: String },
    #[error("No step cost for {from} -> {to}")]
    MissingStepCost { from: String, to: String },
    #[error("Action {action} can't be applied on {state}")]
    InapplicableAction { state: String, action: String },
}

impl ProblemError {
    pub fn missing_heuristic<St: State>(s: &St) -> Self {
        Self::MissingHeuristic {
            state: format!("{s:?}"),
        }
    }
    pub fn missing_step_cost<St: State>(from: &St, to: &St) -> Self {
        Self::MissingStepCost {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }
    pub fn inapplicable_action<St: State, A: Action>(s: &St, a: &A) -> Self {
        Self::InapplicableAction {
            state: format!("{s:?}"),
            action: format!("{a:?}"),
        }
    }
}

/// A sequence of actions from a start State, along with every State it goes
/// through.
///
/// `states` always holds one more element than `actions`, so a Path is never
/// empty of States, and `evaluations[i]` is the evaluation the search
/// assigned to `states[i]`. Paths are only built from a start State, which
/// keeps this true.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct Path<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    pub(crate) states: Vec<St>,
    pub(crate) actions: Vec<A>,
    pub(crate) evaluations: Vec<C>,
    pub(crate) cost: C,
}

impl<St, A, C> Path<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    #[inline(always)]
    pub fn new_from_start(start: St, evaluation: C) -> Self {
        Self {
            states: vec![start],
            actions: vec![],
            evaluations: vec![evaluation],
            cost: C::zero(),
        }
    }

    /// Every State, start and end included.
    #[inline(always)]
    pub fn states(&self) -> &[St] {
        &self.states
    }
    #[inline(always)]
    pub fn actions(&self) -> &[A] {
        &self.actions
    }
    /// Evaluation of every State, as ranked by the search.
    #[inline(always)]
    pub fn evaluations(&self) -> &[C] {
        &self.evaluations
    }
    #[inline(always)]
    pub fn cost(&self) -> C {
        self.cost
    }

    #[inline(always)]
    pub fn start(&self) -> &St {
        &self.states[0]
    }
    #[inline(always)]
    pub fn end(&self) -> &St {
        &self.states[self.states.len() - 1]
    }

    /// Number of actions.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.actions.len()
    }
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sum of the evaluations of every State in the path, start included.
    pub fn evaluation_total(&self) -> C {
        self.evaluations
            .iter()
            .fold(C::zero(), |total, f| total.saturating_add(f))
    }

    /// Runs sanity checks
    #[inline(always)]
    pub fn seems_valid(&self) -> bool {
        self.states.len() == self.actions.len() + 1
            && self.evaluations.len() == self.states.len()
            && self.cost.valid()
    }

    /// Appends a step while walking backwards from the end.
    ///
    /// Call [`Path::reverse`] once the start is reached.
    #[inline(always)]
    pub(crate) fn append(&mut self, previous: (St, A), evaluation: C) {
        let (s, a) = previous;
        self.actions.push(a);
        self.states.push(s);
        self.evaluations.push(evaluation);
    }

    /// Reverses the Path.
    ///
    /// Useful when naturally reconstructing paths in reverse.
    pub(crate) fn reverse(&mut self) {
        self.states.reverse();
        self.actions.reverse();
        self.evaluations.reverse();
    }

    /// Writes the path one step at a time.
    ///
    /// Every step shows the action taken, the State as rendered by
    /// `describe`, the path cost so far and the running evaluation total.
    pub fn write_steps<W, F, D>(&self, mut out: W, describe: F) -> std::io::Result<()>
    where
        W: std::io::Write,
        F: Fn(&St) -> D,
        D: std::fmt::Display,
    {
        let mut total = C::zero();
        for (i, (s, f)) in self.states.iter().zip(&self.evaluations).enumerate() {
            total = total.saturating_add(f);
            match i.checked_sub(1).map(|a| &self.actions[a]) {
                Some(a) => writeln!(out, "Step {i}: {a:?}")?,
                None => writeln!(out, "Step {i}: start")?,
            }
            writeln!(out, "{}", describe(s))?;
            writeln!(out, "  f={f} total={total}")?;
        }
        writeln!(out, "Cost: {}", self.cost)?;
        writeln!(out, "Evaluation total: {total}")?;
        Ok(())
    }
}

impl<St, A, C> std::fmt::Display for Path<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Path({}, {:?}:{:?}:{:?})",
            self.cost,
            self.start(),
            self.actions.iter().take(20).collect::<Vec<_>>(),
            self.end()
        )
    }
}

/// A state space.
///
/// Every method must be a pure function of its arguments, as the search
/// relies on equal states expanding identically.
pub trait Space<St, A, C>: Clone + std::fmt::Debug
where
    St: State,
    A: Action,
    C: Cost,
{
    /// Actions applicable on `s`, in expansion order.
    fn actions(&self, s: &St) -> Actions<A>;

    /// The State reached by applying `a` on `s`.
    ///
    /// Returns `None` if `a` is not applicable.
    fn apply(&self, s: &St, a: &A) -> Option<St>;

    /// Cost of going from `s` to `next` through `a`.
    fn cost(&self, _s: &St, _a: &A, _next: &St) -> Result<C, ProblemError> {
        Ok(C::one())
    }

    /// Accumulates the cost of a step on top of the cost `g` of reaching `s`.
    fn path_cost(&self, g: C, s: &St, a: &A, next: &St) -> Result<C, ProblemError> {
        Ok(g.saturating_add(&self.cost(s, a, next)?))
    }

    /// Expands a State
    fn neighbours(&self, s: &St) -> Result<Vec<(St, A)>, ProblemError> {
        self.actions(s)
            .into_iter()
            .map(|a| match self.apply(s, &a) {
                Some(next) => Ok((next, a)),
                None => Err(ProblemError::inapplicable_action(s, &a)),
            })
            .collect()
    }

    /// Checks that `p` is a sequence of applicable actions through its states
    /// with a matching cost.
    fn valid_path(&self, p: &Path<St, A, C>) -> bool {
        if !p.seems_valid() {
            return false;
        }
        let mut g = C::zero();
        for (i, a) in p.actions.iter().enumerate() {
            let s = &p.states[i];
            match self.apply(s, a) {
                Some(next) if next == p.states[i + 1] => match self.path_cost(g, s, a, &next) {
                    Ok(new_g) => g = new_g,
                    Err(_) => return false,
                },
                _ => return false,
            }
        }
        g == p.cost
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Spot(u32);
    impl State for Spot {}

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Right;
    impl Action for Right {}

    #[test]
    fn start_only_path() {
        let p = Path::<Spot, Right, u32>::new_from_start(Spot(4), 7);
        assert!(p.is_empty());
        assert!(p.seems_valid());
        assert_eq!(p.start(), p.end());
        assert_eq!(p.states(), &[Spot(4)]);
        assert_eq!(p.evaluation_total(), 7);
        assert_eq!(p.to_string(), "Path(0, Spot(4):[]:Spot(4))");
    }

    #[test]
    fn paths_are_built_backwards() {
        let mut p = Path::<Spot, Right, u32>::new_from_start(Spot(2), 5);
        p.append((Spot(1), Right), 4);
        p.append((Spot(0), Right), 3);
        p.reverse();
        p.cost = 2;

        assert!(p.seems_valid());
        assert_eq!(p.len(), 2);
        assert_eq!(p.states(), &[Spot(0), Spot(1), Spot(2)]);
        assert_eq!(p.actions(), &[Right, Right]);
        assert_eq!(p.evaluations(), &[3, 4, 5]);
        assert_eq!(p.cost(), 2);
        assert_eq!((p.start(), p.end()), (&Spot(0), &Spot(2)));

        let mut out = Vec::new();
        p.write_steps(&mut out, |s| s.0).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            indoc! {"
                Step 0: start
                0
                  f=3 total=3
                Step 1: Right
                1
                  f=4 total=7
                Step 2: Right
                2
                  f=5 total=12
                Cost: 2
                Evaluation total: 12
            "}
        );
    }
}
