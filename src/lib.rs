//! Best-first graph search.
//!
//! A generic greedy/A* engine over user-defined problems
//! ([`problem::Problem`], [`space::Space`], [`problem::Heuristic`]), with a
//! sliding-tile puzzle and a weighted route map as instances.

// Costs
// -----
pub mod cost;

// Search space and problems
// -------------------------
pub mod problem;
pub mod space;

// Search internals
// ----------------
pub mod frontier;
pub mod search;

// Algorithms
// ----------
pub mod best_first;
pub mod config;

// Problems
// --------
pub mod problems;

pub use best_first::BestFirstSearch;
pub use best_first::SearchError;
pub use best_first::search;
pub use config::Admission;
pub use config::Evaluation;
pub use config::SearchConfig;
pub use config::SearchLimits;
