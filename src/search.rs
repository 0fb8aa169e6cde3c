use std::fmt::Debug;

use nonmax::NonMaxUsize;
use rustc_hash::FxHashMap;

use crate::space::Action;
use crate::space::Cost;
use crate::space::Path;
use crate::space::State;

/// A reference to a `SearchTreeNode<St, A, C>` within its `SearchTree`.
///
/// Parent links use these, so they never own the parent.
/// `NonMaxUsize` keeps `Option<(SearchTreeIndex, A)>` as small as the pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SearchTreeIndex {
    index: NonMaxUsize,
}

impl SearchTreeIndex {
    #[inline(always)]
    fn new(index: usize) -> Self {
        Self {
            index: NonMaxUsize::new(index).expect("search tree outgrew usize::MAX - 1 nodes"),
        }
    }
    #[inline(always)]
    pub fn as_usize(&self) -> usize {
        self.index.get()
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct SearchTreeNode<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    pub(crate) parent: Option<(SearchTreeIndex, A)>,
    pub(crate) state: St,
    /// Path cost
    pub(crate) g: C,
    /// Heuristic value, kept to re-rank without recomputing it.
    pub(crate) h: C,
    /// Evaluation used to rank this node in the frontier.
    pub(crate) f: C,
    pub(crate) depth: u32,
    /// Position in the frontier while the node is open.
    pub(crate) heap_index: Option<usize>,
    pub(crate) closed: bool,
}

impl<St, A, C> SearchTreeNode<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    pub fn new_root(s: St, h: C, f: C) -> Self {
        Self {
            parent: None,
            state: s,
            g: C::zero(),
            h,
            f,
            depth: 0,
            heap_index: None,
            closed: false,
        }
    }

    pub fn new_child(s: St, parent: (SearchTreeIndex, A), depth: u32, g: C, h: C, f: C) -> Self {
        Self {
            parent: Some(parent),
            state: s,
            g,
            h,
            f,
            depth,
            heap_index: None,
            closed: false,
        }
    }

    /// Gives this Node a better path through a new parent.
    pub fn reach(&mut self, new_parent: (SearchTreeIndex, A), depth: u32, g: C, f: C) {
        debug_assert!(g < self.g);
        self.parent = Some(new_parent);
        self.depth = depth;
        self.g = g;
        self.f = f;
    }

    #[inline(always)]
    pub fn state(&self) -> &St {
        &self.state
    }
    #[inline(always)]
    pub fn action(&self) -> Option<&A> {
        self.parent.as_ref().map(|(_, a)| a)
    }
    #[inline(always)]
    pub fn path_cost(&self) -> C {
        self.g
    }
    #[inline(always)]
    pub fn evaluation(&self) -> C {
        self.f
    }
    #[inline(always)]
    pub fn depth(&self) -> u32 {
        self.depth
    }
    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.heap_index.is_some()
    }
    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// All the Search Nodes of a single search run.
///
/// Also indexes them by State. There's at most one node per State, which
/// makes the index both the frontier membership test and the explored set.
pub(crate) struct SearchTree<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    nodes: Vec<SearchTreeNode<St, A, C>>,
    node_map: FxHashMap<St, SearchTreeIndex>,
}

impl<St, A, C> SearchTree<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    #[inline(always)]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(1024),
            node_map: FxHashMap::default(),
        }
    }

    #[inline(always)]
    pub(crate) fn push(&mut self, node: SearchTreeNode<St, A, C>) -> SearchTreeIndex {
        debug_assert!(!self.node_map.contains_key(node.state()));
        let node_index = SearchTreeIndex::new(self.nodes.len());
        self.node_map.insert(*node.state(), node_index);
        self.nodes.push(node);
        node_index
    }

    #[inline(always)]
    #[must_use]
    pub(crate) fn find(&self, s: &St) -> Option<SearchTreeIndex> {
        self.node_map.get(s).copied()
    }

    /// Whether `s` was already expanded.
    #[inline(always)]
    #[must_use]
    pub(crate) fn is_explored(&self, s: &St) -> bool {
        self.find(s).is_some_and(|i| self[i].is_closed())
    }

    /// Whether `s` is waiting in the frontier.
    #[inline(always)]
    #[must_use]
    pub(crate) fn is_in_frontier(&self, s: &St) -> bool {
        self.find(s).is_some_and(|i| self[i].is_open())
    }

    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline(always)]
    #[must_use]
    pub fn index_capacity(&self) -> usize {
        self.node_map.capacity()
    }

    /// Nodes from the root to `node_index`.
    pub fn nodes_to(&self, mut node_index: SearchTreeIndex) -> Vec<&SearchTreeNode<St, A, C>> {
        let mut nodes = vec![&self[node_index]];
        while let Some((parent_index, _)) = self[node_index].parent {
            debug_assert!(node_index != parent_index);
            nodes.push(&self[parent_index]);
            node_index = parent_index;
        }
        nodes.reverse();
        nodes
    }

    #[must_use]
    pub fn path(&self, mut node_index: SearchTreeIndex) -> Path<St, A, C> {
        #[cfg(feature = "coz_profile")]
        coz::scope!("PathReconstruction");

        let e = &self[node_index];
        let mut path = Path::<St, A, C>::new_from_start(*e.state(), e.f);
        path.cost = e.g;

        while let Some((parent_index, a)) = self[node_index].parent {
            let p = &self[parent_index];
            debug_assert!(p.g <= self[node_index].g);
            debug_assert_eq!(p.depth + 1, self[node_index].depth);

            path.append((*p.state(), a), p.f);
            debug_assert!(node_index != parent_index);
            node_index = parent_index;
        }

        path.reverse();
        debug_assert!(path.seems_valid());
        path
    }
}

impl<St, A, C> Default for SearchTree<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl<St, A, C> std::ops::Index<SearchTreeIndex> for SearchTree<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    type Output = SearchTreeNode<St, A, C>;

    #[inline(always)]
    fn index(&self, index: SearchTreeIndex) -> &Self::Output {
        &self.nodes[index.as_usize()]
    }
}

impl<St, A, C> std::ops::IndexMut<SearchTreeIndex> for SearchTree<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    #[inline(always)]
    fn index_mut(&mut self, index: SearchTreeIndex) -> &mut SearchTreeNode<St, A, C> {
        &mut self.nodes[index.as_usize()]
    }
}

impl<St, A, C> std::fmt::Debug for SearchTree<St, A, C>
where
    St: State,
    A: Action,
    C: Cost,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "SearchTree{{({} nodes)}}", self.len())
    }
}
