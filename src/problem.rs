use std::marker::PhantomData;

use crate::space::Action;
use crate::space::Cost;
use crate::space::ProblemError;
use crate::space::Space;
use crate::space::State;

/// A search problem: a Space, where to start, and what to look for.
pub trait Problem<Sp, St, A, C>: std::fmt::Debug
where
    Sp: Space<St, A, C>,
    St: State,
    A: Action,
    C: Cost,
{
    fn space(&self) -> &Sp;
    fn start(&self) -> &St;

    fn is_goal(&self, s: &St) -> bool;
}

/// An instance-specific heuristic.
///
/// Estimates the remaining cost from a State to the goal of a Problem.
/// Admissibility is recommended but not checked.
pub trait Heuristic<P, Sp, St, A, C>: std::fmt::Debug
where
    P: Problem<Sp, St, A, C>,
    Sp: Space<St, A, C>,
    St: State,
    A: Action,
    C: Cost,
{
    fn h(p: &P, s: &St) -> Result<C, ProblemError>;
}

/// The blind heuristic.
///
/// Turns A* into uniform-cost search.
#[derive(Debug)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct ZeroHeuristic<P> {
    _phantom_problem: PhantomData<P>,
}

impl<P, Sp, St, A, C> Heuristic<P, Sp, St, A, C> for ZeroHeuristic<P>
where
    P: Problem<Sp, St, A, C>,
    Sp: Space<St, A, C>,
    St: State,
    A: Action,
    C: Cost,
{
    #[inline(always)]
    fn h(_p: &P, _s: &St) -> Result<C, ProblemError> {
        Ok(C::zero())
    }
}
