use std::time::Duration;

use derive_more::Display;
use serde::Deserialize;
use serde::Serialize;

use crate::space::Cost;

/// How the frontier ranks nodes.
#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// `f = h`. Fast, ignores the cost paid so far.
    #[display("Greedy")]
    Greedy,
    /// `f = g + h`.
    #[default]
    #[display("A*")]
    AStar,
}

impl Evaluation {
    #[inline(always)]
    pub fn evaluate<C: Cost>(&self, g: C, h: C) -> C {
        match self {
            Evaluation::Greedy => h,
            Evaluation::AStar => g.saturating_add(&h),
        }
    }
}

/// What to do when a State is reached again.
#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// Only the first path reaching a State is kept, even if a later one is
    /// cheaper.
    ///
    /// A* may return sub-optimal paths with this policy.
    #[default]
    #[display("first-arrival")]
    FirstArrival,
    /// A cheaper path replaces the known one, re-opening the State if it was
    /// already expanded.
    #[display("replace-if-cheaper")]
    ReplaceIfCheaper,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Maximum number of node expansions.
    pub max_expansions: Option<usize>,
    /// Time budget, measured on a monotonic clock.
    #[serde(rename = "deadline_ms", with = "duration_ms")]
    pub deadline: Option<Duration>,
}

impl SearchLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }
    pub fn is_unlimited(&self) -> bool {
        self.max_expansions.is_none() && self.deadline.is_none()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub evaluation: Evaluation,
    pub admission: Admission,
    pub limits: SearchLimits,
}

impl SearchConfig {
    pub fn astar() -> Self {
        Self {
            evaluation: Evaluation::AStar,
            ..Default::default()
        }
    }
    pub fn greedy() -> Self {
        Self {
            evaluation: Evaluation::Greedy,
            ..Default::default()
        }
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }
    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.limits.max_expansions = Some(max_expansions);
        self
    }
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.limits.deadline = Some(deadline);
        self
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// `Option<Duration>` as optional milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
