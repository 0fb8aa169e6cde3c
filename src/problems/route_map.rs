use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;
use thiserror::Error;

use crate::best_first::SearchError;
use crate::best_first::search;
use crate::config::SearchConfig;
use crate::problem::Heuristic;
use crate::problem::Problem;
use crate::space::Action;
use crate::space::Actions;
use crate::space::Path;
use crate::space::ProblemError;
use crate::space::Space;
use crate::space::State;

pub type RouteCost = u32;
pub type RoutePath = Path<City, RouteAction, RouteCost>;

#[derive(Debug, Error)]
pub enum RouteMapError {
    #[error("Invalid route map: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown city '{0}'")]
    UnknownCity(String),
    #[error("Road {from} -> {to} is listed more than once")]
    DuplicateRoad { from: String, to: String },
    #[error("Too many cities ({0})")]
    TooManyCities(usize),
}

/// A directed road as found in a dataset.
///
/// A missing `distance` is kept as a road without a known length, and
/// surfaces as a search error if the road is ever taken.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadConfig {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub distance: Option<RouteCost>,
}

/// A route map dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteMapConfig {
    /// Roads in expansion order.
    pub roads: Vec<RoadConfig>,
    /// Straight-line distance from every city, per goal city.
    pub straight_line_distance: BTreeMap<String, BTreeMap<String, RouteCost>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct City(u16);
impl State for City {}

impl City {
    #[inline(always)]
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Drive to a neighbouring city.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RouteAction {
    pub to: City,
}
impl Action for RouteAction {}

/// Roads leaving a City, with their length if known.
type Roads = SmallVec<[(City, Option<RouteCost>); 4]>;

/// A weighted directed graph of named cities.
#[derive(Clone, Debug)]
pub struct RouteMap {
    names: Vec<String>,
    cities: FxHashMap<String, City>,
    roads: Vec<Roads>,
    /// `straight_line_distance[goal][city]`
    straight_line_distance: FxHashMap<City, Vec<Option<RouteCost>>>,
}

impl RouteMap {
    pub fn from_json(s: &str) -> Result<Self, RouteMapError> {
        let config: RouteMapConfig = serde_json::from_str(s)?;
        Self::from_config(&config)
    }

    /// Builds the map, numbering cities by first appearance.
    ///
    /// Cities only named in a distance table are kept as cities without
    /// roads.
    pub fn from_config(config: &RouteMapConfig) -> Result<Self, RouteMapError> {
        let mut map = Self {
            names: vec![],
            cities: FxHashMap::default(),
            roads: vec![],
            straight_line_distance: FxHashMap::default(),
        };

        for road in &config.roads {
            let from = map.intern(&road.from)?;
            let to = map.intern(&road.to)?;
            let roads = &mut map.roads[from.as_usize()];
            if roads.iter().any(|(c, _)| *c == to) {
                return Err(RouteMapError::DuplicateRoad {
                    from: road.from.clone(),
                    to: road.to.clone(),
                });
            }
            roads.push((to, road.distance));
        }
        for (goal, table) in &config.straight_line_distance {
            map.intern(goal)?;
            for city in table.keys() {
                map.intern(city)?;
            }
        }

        for (goal, table) in &config.straight_line_distance {
            let goal = map.city(goal)?;
            let mut distances = vec![None; map.len()];
            for (city, d) in table {
                distances[map.city(city)?.as_usize()] = Some(*d);
            }
            map.straight_line_distance.insert(goal, distances);
        }

        log::debug!(
            "Loaded a route map with {} cities and {} roads",
            map.len(),
            config.roads.len()
        );
        Ok(map)
    }

    fn intern(&mut self, name: &str) -> Result<City, RouteMapError> {
        if let Some(c) = self.cities.get(name) {
            return Ok(*c);
        }
        let index = self.names.len();
        let city = City(
            u16::try_from(index).map_err(|_| RouteMapError::TooManyCities(index + 1))?,
        );
        self.names.push(name.to_string());
        self.cities.insert(name.to_string(), city);
        self.roads.push(Roads::new());
        Ok(city)
    }

    pub fn city(&self, name: &str) -> Result<City, RouteMapError> {
        self.cities
            .get(name)
            .copied()
            .ok_or_else(|| RouteMapError::UnknownCity(name.to_string()))
    }

    #[inline(always)]
    pub fn name(&self, c: City) -> &str {
        &self.names[c.as_usize()]
    }

    /// Names of `cities`, in order.
    pub fn names<'a>(&'a self, cities: &[City]) -> Vec<&'a str> {
        cities.iter().map(|c| self.name(*c)).collect()
    }

    /// Number of cities.
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Length of the road from `from` to `to`.
    ///
    /// `None` if there's no such road or its length is unknown.
    pub fn distance(&self, from: City, to: City) -> Option<RouteCost> {
        self.roads[from.as_usize()]
            .iter()
            .find(|(c, _)| *c == to)
            .and_then(|(_, d)| *d)
    }

    /// Straight-line distances towards `goal`, indexed by City.
    ///
    /// Every City is `None` when the dataset has no table for `goal`.
    pub fn straight_line_distances(&self, goal: City) -> Vec<Option<RouteCost>> {
        self.straight_line_distance
            .get(&goal)
            .cloned()
            .unwrap_or_else(|| vec![None; self.len()])
    }
}

impl Space<City, RouteAction, RouteCost> for RouteMap {
    fn actions(&self, s: &City) -> Actions<RouteAction> {
        self.roads[s.as_usize()]
            .iter()
            .map(|(to, _)| RouteAction { to: *to })
            .collect()
    }

    fn apply(&self, s: &City, a: &RouteAction) -> Option<City> {
        self.roads[s.as_usize()]
            .iter()
            .any(|(to, _)| *to == a.to)
            .then_some(a.to)
    }

    fn cost(&self, s: &City, _a: &RouteAction, next: &City) -> Result<RouteCost, ProblemError> {
        self.distance(*s, *next)
            .ok_or_else(|| ProblemError::missing_step_cost(s, next))
    }
}

/// Travelling from a start City to a goal City.
///
/// Carries the straight-line distance table towards its goal.
#[derive(Clone, Debug)]
pub struct RouteMapProblem<'m> {
    map: &'m RouteMap,
    start: City,
    goal: City,
    straight_line_distance: Vec<Option<RouteCost>>,
}

impl<'m> RouteMapProblem<'m> {
    /// Looks up `start` and `goal` by name and takes the distance table
    /// towards `goal` from the map. The goal is always 0 away from itself.
    pub fn new(map: &'m RouteMap, start: &str, goal: &str) -> Result<Self, RouteMapError> {
        let start = map.city(start)?;
        let goal = map.city(goal)?;
        let mut straight_line_distance = map.straight_line_distances(goal);
        straight_line_distance[goal.as_usize()].get_or_insert(0);

        Ok(Self {
            map,
            start,
            goal,
            straight_line_distance,
        })
    }

    pub fn goal(&self) -> City {
        self.goal
    }
    pub fn map(&self) -> &'m RouteMap {
        self.map
    }

    #[inline(always)]
    pub fn straight_line_distance(&self, c: City) -> Option<RouteCost> {
        self.straight_line_distance[c.as_usize()]
    }

    pub fn solve(&self, config: &SearchConfig) -> Result<RoutePath, SearchError> {
        search::<RouteMapStraightLineDistance, Self, RouteMap, City, RouteAction, RouteCost>(
            self, config,
        )
    }
}

impl Problem<RouteMap, City, RouteAction, RouteCost> for RouteMapProblem<'_> {
    fn space(&self) -> &RouteMap {
        self.map
    }
    fn start(&self) -> &City {
        &self.start
    }
    fn is_goal(&self, s: &City) -> bool {
        *s == self.goal
    }
}

/// The distance table of the problem. Cities missing from it are an error.
#[derive(Debug)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct RouteMapStraightLineDistance;

impl<'m> Heuristic<RouteMapProblem<'m>, RouteMap, City, RouteAction, RouteCost>
    for RouteMapStraightLineDistance
{
    #[inline(always)]
    fn h(p: &RouteMapProblem<'m>, s: &City) -> Result<RouteCost, ProblemError> {
        p.straight_line_distance(*s)
            .ok_or_else(|| ProblemError::missing_heuristic(s))
    }
}
