use std::marker::PhantomData;
use std::time::Duration;
use std::time::Instant;

use human_duration::human_duration;
use thiserror::Error;

use crate::config::Admission;
use crate::config::SearchConfig;
use crate::frontier::Frontier;
use crate::frontier::FrontierEntry;
use crate::problem::Heuristic;
use crate::problem::Problem;
use crate::search::SearchTree;
use crate::search::SearchTreeIndex;
use crate::search::SearchTreeNode;
use crate::space::Action;
use crate::space::Cost;
use crate::space::Path;
use crate::space::ProblemError;
use crate::space::Space;
use crate::space::State;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("No path to a goal, the frontier ran out after {expanded} expansions")]
    Unreachable { expanded: usize },
    #[error("Invalid problem: {0}")]
    InvalidProblem(#[from] ProblemError),
    #[error("Search budget exhausted after {expanded} expansions ({})", human_duration(.elapsed))]
    BudgetExhausted { expanded: usize, elapsed: Duration },
}

/// Counters for a single search run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes taken out of the frontier and expanded.
    pub expanded: usize,
    /// Children produced by expansions, including duplicates.
    pub generated: usize,
    /// Expanded States that went back to the frontier through a cheaper path.
    pub reopened: usize,
    /// Frontier entries re-ranked through a cheaper path.
    pub improved: usize,
}

/// A best-first graph search over a single Problem.
///
/// The frontier ranks nodes by the `Evaluation` in the `SearchConfig`, and
/// the `Admission` policy decides what happens when a State shows up again.
pub struct BestFirstSearch<'p, H, P, Sp, St, A, C>
where
    H: Heuristic<P, Sp, St, A, C>,
    P: Problem<Sp, St, A, C>,
    Sp: Space<St, A, C>,
    St: State,
    A: Action,
    C: Cost,
{
    /// All the Search Nodes. Naturally forms a Search Tree as each node may
    /// have a parent Node.
    ///
    /// Also amalgamates the frontier membership test and the explored set
    /// through its `State` index.
    search_tree: SearchTree<St, A, C>,

    /// An intrusive heap of `(FrontierRank, SearchTreeIndex)` that keeps the
    /// referenced node updated (`SearchTreeNode::heap_index`).
    frontier: Frontier<C>,

    problem: &'p P,
    config: SearchConfig,
    stats: SearchStats,
    /// Time spent in finished `find_goal` calls.
    elapsed: Duration,
    /// When the running `find_goal` call started.
    ///
    /// `Instant` is monotonic, so wall-clock adjustments can't break deadlines.
    started: Option<Instant>,

    _phantom_heuristic: PhantomData<H>,
    _phantom_space: PhantomData<Sp>,
}

impl<'p, H, P, Sp, St, A, C> BestFirstSearch<'p, H, P, Sp, St, A, C>
where
    H: Heuristic<P, Sp, St, A, C>,
    P: Problem<Sp, St, A, C>,
    Sp: Space<St, A, C>,
    St: State,
    A: Action,
    C: Cost,
{
    /// Starts a search with the root node in the frontier.
    pub fn new(problem: &'p P, config: SearchConfig) -> Result<Self, SearchError> {
        let mut search = Self {
            search_tree: SearchTree::<St, A, C>::new(),
            frontier: Frontier::<C>::new(),

            problem,
            config,
            stats: SearchStats::default(),
            elapsed: Duration::ZERO,
            started: None,

            _phantom_heuristic: PhantomData,
            _phantom_space: PhantomData,
        };

        let s = *problem.start();
        let h: C = H::h(problem, &s)?;
        let f: C = config.evaluation.evaluate(C::zero(), h);
        let root = search
            .search_tree
            .push(SearchTreeNode::<St, A, C>::new_root(s, h, f));
        search.frontier.push(&mut search.search_tree, root);

        Ok(search)
    }

    /// Runs the search until a goal is taken out of the frontier.
    ///
    /// A start State that's already a goal is returned as an empty path
    /// without expanding anything.
    pub fn find_goal(&mut self) -> Result<Path<St, A, C>, SearchError> {
        #[cfg(feature = "coz_profile")]
        coz::scope!("FindGoal");

        log::debug!(
            "{} search from {:?} ({} admission)",
            self.config.evaluation,
            self.problem.start(),
            self.config.admission
        );
        let started = Instant::now();
        self.started = Some(started);
        let result = self.search();
        self.started = None;
        self.elapsed += started.elapsed();

        match &result {
            Ok(path) => log::debug!(
                "Found {path} after {} expansions in {}",
                self.stats.expanded,
                human_duration(&self.elapsed())
            ),
            Err(SearchError::BudgetExhausted { .. }) => log::warn!(
                "Gave up after {} expansions in {}",
                self.stats.expanded,
                human_duration(&self.elapsed())
            ),
            Err(e) => log::debug!("Search failed: {e}"),
        }
        result
    }

    fn search(&mut self) -> Result<Path<St, A, C>, SearchError> {
        while let Some(node_index) = self.frontier.pop(&mut self.search_tree) {
            #[cfg(feature = "coz_profile")]
            coz::scope!("NodeExpansion");

            let node = &self.search_tree[node_index];
            let state = *node.state();
            debug_assert!(!node.is_closed());

            if self.problem.is_goal(&state) {
                #[cfg(feature = "coz_profile")]
                coz::progress!("GoalFound");
                return Ok(self.search_tree.path(node_index));
            }

            self.check_limits()?;

            // Mark as closed
            self.search_tree[node_index].closed = true;
            self.stats.expanded += 1;
            log::trace!(
                "Expanding {state:?} (g={}, f={})",
                self.search_tree[node_index].g,
                self.search_tree[node_index].f
            );

            self.expand(node_index, &state)?;
        }

        Err(SearchError::Unreachable {
            expanded: self.stats.expanded,
        })
    }

    fn check_limits(&self) -> Result<(), SearchError> {
        let limits = &self.config.limits;
        let out_of_expansions = limits
            .max_expansions
            .is_some_and(|max| self.stats.expanded >= max);
        let out_of_time = limits
            .deadline
            .is_some_and(|deadline| self.elapsed() >= deadline);

        if out_of_expansions || out_of_time {
            return Err(SearchError::BudgetExhausted {
                expanded: self.stats.expanded,
                elapsed: self.elapsed(),
            });
        }
        Ok(())
    }

    fn expand(&mut self, node_index: SearchTreeIndex, state: &St) -> Result<(), SearchError> {
        let problem: &'p P = self.problem;
        let space = problem.space();
        let g = self.search_tree[node_index].g;
        let depth = self.search_tree[node_index].depth + 1;

        for (s, a) in space.neighbours(state)? {
            #[cfg(feature = "coz_profile")]
            coz::scope!("ReachNode");

            self.stats.generated += 1;
            let new_g = space.path_cost(g, state, &a, &s)?;

            // Have we seen this State?
            match self.search_tree.find(&s) {
                None => {
                    // No, let's create a new Node for it.
                    let h = H::h(problem, &s)?;
                    let f = self.config.evaluation.evaluate(new_g, h);
                    let child = self.search_tree.push(SearchTreeNode::new_child(
                        s,
                        (node_index, a),
                        depth,
                        new_g,
                        h,
                        f,
                    ));
                    self.frontier.push(&mut self.search_tree, child);
                }
                Some(neigh_index) => {
                    if self.config.admission == Admission::FirstArrival {
                        continue;
                    }
                    let neigh = &mut self.search_tree[neigh_index];
                    if new_g >= neigh.g {
                        continue;
                    }

                    // Found better path to existing node
                    let f = self.config.evaluation.evaluate(new_g, neigh.h);
                    neigh.reach((node_index, a), depth, new_g, f);
                    if neigh.is_closed() {
                        neigh.closed = false;
                        self.stats.reopened += 1;
                        self.frontier.push(&mut self.search_tree, neigh_index);
                    } else {
                        self.stats.improved += 1;
                        self.frontier.improve(&mut self.search_tree, neigh_index);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }
    /// Time spent searching, including a run in progress.
    pub fn elapsed(&self) -> Duration {
        self.elapsed + self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Whether `s` was already expanded.
    pub fn is_explored(&self, s: &St) -> bool {
        self.search_tree.is_explored(s)
    }
    /// Whether `s` is waiting in the frontier.
    pub fn is_in_frontier(&self, s: &St) -> bool {
        self.search_tree.is_in_frontier(s)
    }
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn write_memory_stats<W: std::io::Write>(&self, mut out: W) -> std::io::Result<()> {
        use size::Size;
        use std::mem::size_of;
        use thousands::Separable;

        writeln!(out, "{} Search Stats:", self.config.evaluation)?;
        let s = size_of::<SearchTreeNode<St, A, C>>();
        let l = self.search_tree.len();
        writeln!(
            out,
            "  - |Nodes|:   {} ({})",
            l.separate_with_commas(),
            Size::from_bytes(l * s)
        )?;

        let s = size_of::<FrontierEntry<C>>();
        let l = self.frontier.len();
        let c = self.frontier.capacity();
        writeln!(
            out,
            "  - |Open|:   {} ({})",
            l.separate_with_commas(),
            Size::from_bytes(l * s)
        )?;
        writeln!(
            out,
            "  - |Open|*:  {} ({})",
            c.separate_with_commas(),
            Size::from_bytes(c * s)
        )?;
        writeln!(
            out,
            "  - |Open|^:  {}",
            self.frontier.high_water().separate_with_commas()
        )?;

        let s = size_of::<(St, SearchTreeIndex)>();
        let l = self.search_tree.len();
        let c = self.search_tree.index_capacity();
        writeln!(
            out,
            "  - |Index|:  {} ({})",
            l.separate_with_commas(),
            Size::from_bytes(l * s)
        )?;
        writeln!(
            out,
            "  - |Index|*: {} ({})",
            c.separate_with_commas(),
            Size::from_bytes(c * s)
        )?;

        writeln!(
            out,
            "  - Expanded nodes: {}",
            self.stats.expanded.separate_with_commas()
        )?;
        writeln!(
            out,
            "  - Generated nodes: {}",
            self.stats.generated.separate_with_commas()
        )?;
        writeln!(out, "  - Elapsed: {}", human_duration(&self.elapsed()))?;

        Ok(())
    }
}

impl<H, P, Sp, St, A, C> std::fmt::Debug for BestFirstSearch<'_, H, P, Sp, St, A, C>
where
    H: Heuristic<P, Sp, St, A, C>,
    P: Problem<Sp, St, A, C>,
    Sp: Space<St, A, C>,
    St: State,
    A: Action,
    C: Cost,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BestFirstSearch")
            .field("search_tree", &self.search_tree)
            .field("frontier", &self.frontier.len())
            .field("problem", &self.problem)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Searches `problem` from its start to a goal.
///
/// Every call runs on its own frontier and search tree, so repeated calls
/// return the same result.
pub fn search<H, P, Sp, St, A, C>(
    problem: &P,
    config: &SearchConfig,
) -> Result<Path<St, A, C>, SearchError>
where
    H: Heuristic<P, Sp, St, A, C>,
    P: Problem<Sp, St, A, C>,
    Sp: Space<St, A, C>,
    St: State,
    A: Action,
    C: Cost,
{
    BestFirstSearch::<H, P, Sp, St, A, C>::new(problem, *config)?.find_goal()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::problem::ZeroHeuristic;
    use crate::space::Actions;

    type Steps = u32;

    /// Integers on a line, walking right by 1 or 2.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    struct Spot(u32);
    impl State for Spot {}

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Step {
        One,
        Two,
    }
    impl Action for Step {}

    #[derive(Clone, Debug)]
    struct Line {
        end: u32,
        /// Cost of a `Step::Two`.
        two: Steps,
    }

    impl Space<Spot, Step, Steps> for Line {
        fn actions(&self, s: &Spot) -> Actions<Step> {
            let mut actions = Actions::new();
            if s.0 < self.end {
                actions.push(Step::One);
            }
            if s.0 + 1 < self.end {
                actions.push(Step::Two);
            }
            actions
        }
        fn apply(&self, s: &Spot, a: &Step) -> Option<Spot> {
            match a {
                Step::One if s.0 < self.end => Some(Spot(s.0 + 1)),
                Step::Two if s.0 + 1 < self.end => Some(Spot(s.0 + 2)),
                _ => None,
            }
        }
        fn cost(&self, _s: &Spot, a: &Step, _next: &Spot) -> Result<Steps, ProblemError> {
            Ok(match a {
                Step::One => 1,
                Step::Two => self.two,
            })
        }
    }

    #[derive(Debug)]
    struct Walk {
        line: Line,
        start: Spot,
        goal: Spot,
    }

    impl Problem<Line, Spot, Step, Steps> for Walk {
        fn space(&self) -> &Line {
            &self.line
        }
        fn start(&self) -> &Spot {
            &self.start
        }
        fn is_goal(&self, s: &Spot) -> bool {
            *s == self.goal
        }
    }

    /// Distance to the goal, in `Step::One`s.
    #[derive(Debug)]
    struct Remaining;
    impl Heuristic<Walk, Line, Spot, Step, Steps> for Remaining {
        fn h(p: &Walk, s: &Spot) -> Result<Steps, ProblemError> {
            Ok(p.goal.0.saturating_sub(s.0))
        }
    }

    /// Only knows about the start.
    #[derive(Debug)]
    struct Forgetful;
    impl Heuristic<Walk, Line, Spot, Step, Steps> for Forgetful {
        fn h(p: &Walk, s: &Spot) -> Result<Steps, ProblemError> {
            if *s != p.start {
                return Err(ProblemError::missing_heuristic(s));
            }
            Ok(0)
        }
    }

    /// Overestimates `Spot(1)`, so it's admissible but inconsistent.
    #[derive(Debug)]
    struct Detour;
    impl Heuristic<Walk, Line, Spot, Step, Steps> for Detour {
        fn h(_p: &Walk, s: &Spot) -> Result<Steps, ProblemError> {
            Ok(if *s == Spot(1) { 3 } else { 0 })
        }
    }

    fn walk(end: u32, two: Steps, start: u32, goal: u32) -> Walk {
        Walk {
            line: Line { end, two },
            start: Spot(start),
            goal: Spot(goal),
        }
    }

    #[test]
    fn finds_cheap_paths() {
        // Two `One`s cost less than a `Two`.
        let p = walk(10, 3, 0, 4);
        let path = search::<Remaining, Walk, Line, Spot, Step, Steps>(
            &p,
            &SearchConfig::astar().with_admission(Admission::ReplaceIfCheaper),
        )
        .unwrap();
        assert_eq!(path.actions, vec![Step::One; 4]);
        assert_eq!(path.cost, 4);
        assert!(p.line.valid_path(&path));

        // A `Two` is cheaper than two `One`s.
        let p = walk(10, 1, 0, 4);
        let path = search::<Remaining, Walk, Line, Spot, Step, Steps>(
            &p,
            &SearchConfig::astar().with_admission(Admission::ReplaceIfCheaper),
        )
        .unwrap();
        assert_eq!(path.actions, vec![Step::Two; 2]);
        assert_eq!(path.cost, 2);
    }

    #[test]
    fn start_is_goal() {
        let p = walk(10, 2, 3, 3);
        let mut search =
            BestFirstSearch::<Remaining, Walk, Line, Spot, Step, Steps>::new(&p, SearchConfig::greedy())
                .unwrap();
        let path = search.find_goal().unwrap();
        assert!(path.is_empty());
        assert_eq!(path.states, vec![Spot(3)]);
        assert_eq!(path.cost, 0);
        assert_eq!(search.stats(), SearchStats::default());
    }

    #[test]
    fn unreachable_goals() {
        // Walking right never reaches the left.
        let p = walk(10, 2, 5, 1);
        assert!(matches!(
            search::<ZeroHeuristic<Walk>, Walk, Line, Spot, Step, Steps>(
                &p,
                &SearchConfig::astar()
            ),
            Err(SearchError::Unreachable { expanded: 6 })
        ));

        // No actions at all.
        let p = walk(0, 2, 0, 1);
        assert!(matches!(
            search::<ZeroHeuristic<Walk>, Walk, Line, Spot, Step, Steps>(
                &p,
                &SearchConfig::astar()
            ),
            Err(SearchError::Unreachable { expanded: 1 })
        ));
    }

    #[test]
    fn heuristic_errors_stop_the_search() {
        let p = walk(10, 2, 0, 4);
        assert!(matches!(
            search::<Forgetful, Walk, Line, Spot, Step, Steps>(&p, &SearchConfig::astar()),
            Err(SearchError::InvalidProblem(
                ProblemError::MissingHeuristic { .. }
            ))
        ));
    }

    #[test]
    fn expansion_budget() {
        let p = walk(1000, 2, 0, 1000);
        let config = SearchConfig::astar().with_max_expansions(10);
        let mut search =
            BestFirstSearch::<ZeroHeuristic<Walk>, Walk, Line, Spot, Step, Steps>::new(&p, config)
                .unwrap();
        assert!(matches!(
            search.find_goal(),
            Err(SearchError::BudgetExhausted { expanded: 10, .. })
        ));
        assert_eq!(search.stats().expanded, 10);
        assert!(search.is_explored(&Spot(0)));
        assert!(search.frontier_len() > 0);
    }

    #[test]
    fn deadline() {
        let p = walk(1000, 2, 0, 1000);
        let config = SearchConfig::astar().with_deadline(Duration::ZERO);
        assert!(matches!(
            search::<ZeroHeuristic<Walk>, Walk, Line, Spot, Step, Steps>(&p, &config),
            Err(SearchError::BudgetExhausted { expanded: 0, .. })
        ));
    }

    #[test]
    fn first_arrival_keeps_the_first_path() {
        // Spot(2) is first reached through a `Two`, which costs more than two
        // `One`s.
        let p = walk(10, 5, 0, 2);
        let path = search::<ZeroHeuristic<Walk>, Walk, Line, Spot, Step, Steps>(
            &p,
            &SearchConfig::astar(),
        )
        .unwrap();
        assert_eq!(path.actions, vec![Step::Two]);
        assert_eq!(path.cost, 5);

        let mut search = BestFirstSearch::<ZeroHeuristic<Walk>, Walk, Line, Spot, Step, Steps>::new(
            &p,
            SearchConfig::astar().with_admission(Admission::ReplaceIfCheaper),
        )
        .unwrap();
        let path = search.find_goal().unwrap();
        assert_eq!(path.actions, vec![Step::One, Step::One]);
        assert_eq!(path.cost, 2);
        assert_eq!(search.stats().improved, 1);
    }

    #[test]
    fn cheaper_paths_reopen_explored_states() {
        // `Spot(1)` looks expensive, so `Spot(2)` is first explored through a
        // `Two`.
        let p = walk(10, 3, 0, 6);

        let mut search = BestFirstSearch::<Detour, Walk, Line, Spot, Step, Steps>::new(
            &p,
            SearchConfig::astar().with_admission(Admission::ReplaceIfCheaper),
        )
        .unwrap();
        let path = search.find_goal().unwrap();
        assert_eq!(path.actions, vec![Step::One; 6]);
        assert_eq!(path.cost, 6);
        assert!(p.line.valid_path(&path));
        assert_eq!(
            search.stats(),
            SearchStats {
                expanded: 7,
                generated: 14,
                reopened: 1,
                improved: 5,
            }
        );

        // Without reopening, the first paths stick.
        let mut search =
            BestFirstSearch::<Detour, Walk, Line, Spot, Step, Steps>::new(&p, SearchConfig::astar())
                .unwrap();
        let path = search.find_goal().unwrap();
        assert_eq!(path.actions, vec![Step::Two; 3]);
        assert_eq!(path.cost, 9);
        assert_eq!(search.stats().reopened, 0);
        assert_eq!(search.stats().improved, 0);
    }

    #[test]
    fn elapsed_adds_up_runs() {
        let p = walk(1000, 2, 0, 1000);
        let mut search = BestFirstSearch::<ZeroHeuristic<Walk>, Walk, Line, Spot, Step, Steps>::new(
            &p,
            SearchConfig::astar().with_max_expansions(10),
        )
        .unwrap();
        assert_eq!(search.elapsed(), Duration::ZERO);

        assert!(search.find_goal().is_err());
        let first = search.elapsed();
        assert!(search.find_goal().is_err());
        assert!(search.elapsed() >= first);
    }

    #[test]
    fn inapplicable_actions_are_reported() {
        #[derive(Clone, Debug)]
        struct Broken;
        impl Space<Spot, Step, u32> for Broken {
            fn actions(&self, _s: &Spot) -> Actions<Step> {
                Actions::from_slice(&[Step::One, Step::Two])
            }
            fn apply(&self, s: &Spot, a: &Step) -> Option<Spot> {
                (*a == Step::One).then_some(Spot(s.0 + 1))
            }
        }
        #[derive(Debug)]
        struct Nowhere(Broken, Spot);
        impl Problem<Broken, Spot, Step, u32> for Nowhere {
            fn space(&self) -> &Broken {
                &self.0
            }
            fn start(&self) -> &Spot {
                &self.1
            }
            fn is_goal(&self, _s: &Spot) -> bool {
                false
            }
        }

        let p = Nowhere(Broken, Spot(0));
        assert!(matches!(
            search::<ZeroHeuristic<Nowhere>, Nowhere, Broken, Spot, Step, u32>(
                &p,
                &SearchConfig::astar()
            ),
            Err(SearchError::InvalidProblem(
                ProblemError::InapplicableAction { .. }
            ))
        ));
    }

    #[test]
    fn writes_memory_stats() {
        let p = walk(10, 2, 0, 6);
        let mut search =
            BestFirstSearch::<Remaining, Walk, Line, Spot, Step, Steps>::new(&p, SearchConfig::astar())
                .unwrap();
        search.find_goal().unwrap();

        let mut out = Vec::<u8>::new();
        search.write_memory_stats(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("A* Search Stats:\n"));
        assert!(out.contains("  - Expanded nodes: "));
    }
}
