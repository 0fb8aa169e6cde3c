//! The open list of a best-first search.
//!
//! An 8-ary min-heap of `(FrontierRank, SearchTreeIndex)`. It's intrusive:
//! every open `SearchTreeNode` keeps its own position in the heap
//! (`SearchTreeNode::heap_index`), so a node reached through a cheaper path
//! can be re-ranked without a linear search for its entry.
//!
//! Heap layout for an arity of `A`:
//!   - Up:          `(i-1) / A`
//!   - First child: `(A*i) + 1`
//!   - Last child:  `A*(i+1)`

use std::cmp::min;
use std::fmt::Debug;

use crate::search::SearchTree;
use crate::search::SearchTreeIndex;
use crate::space::Action;
use crate::space::Cost;
use crate::space::State;

const HEAP_ARITY: usize = 8usize;

/// The parent position
///
/// ```
/// use informed_search::frontier::up;
/// assert_eq!(up(1), 0);
/// assert_eq!(up(8), 0);
/// assert_eq!(up(9), 1);
/// assert_eq!(up(16), 1);
/// assert_eq!(up(17), 2);
/// ```
#[inline(always)]
#[must_use]
pub fn up(i: usize) -> usize {
    debug_assert!(i != 0);
    (i - 1) / HEAP_ARITY
}

/// The first children position
///
/// ```
/// use informed_search::frontier::down_left;
/// assert_eq!(down_left(0), 1);
/// assert_eq!(down_left(1), 9);
/// assert_eq!(down_left(2), 17);
/// ```
#[inline(always)]
#[must_use]
pub fn down_left(i: usize) -> usize {
    (HEAP_ARITY * i) + 1
}

/// The last children position
///
/// ```
/// use informed_search::frontier::down_right;
/// assert_eq!(down_right(0), 8);
/// assert_eq!(down_right(1), 16);
/// assert_eq!(down_right(2), 24);
/// ```
#[inline(always)]
#[must_use]
pub fn down_right(i: usize) -> usize {
    HEAP_ARITY * (i + 1)
}

/// The ranking tuple for best-first search
///
/// We prefer better evaluations, and tie break on insertion order so the
/// first node reaching the frontier with the best evaluation wins.
///
/// ```
/// use informed_search::frontier::FrontierRank;
///
/// assert!(FrontierRank::new(1u32, 9) < FrontierRank::new(2u32, 0));
/// assert!(FrontierRank::new(2u32, 0) < FrontierRank::new(2u32, 1));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrontierRank<C: Cost> {
    f: C,
    sequence: u64,
}

impl<C> FrontierRank<C>
where
    C: Cost,
{
    pub fn new(f: C, sequence: u64) -> Self {
        Self { f, sequence }
    }
    pub fn f(&self) -> C {
        self.f
    }
    /// Improves `f` keeping the original insertion order.
    pub fn improve_f(&mut self, new_f: C) {
        debug_assert!(new_f <= self.f);
        self.f = new_f;
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct FrontierEntry<C>
where
    C: Cost,
{
    /// The rank of this node that defines how good it is.
    pub rank: FrontierRank<C>,
    /// The index of this node in the Search Tree
    pub node_index: SearchTreeIndex,
}

#[derive(Debug)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct Frontier<C>
where
    C: Cost,
{
    open: Vec<FrontierEntry<C>>,
    /// Next insertion sequence number.
    sequence: u64,
    high_water: usize,
}

impl<C> Frontier<C>
where
    C: Cost,
{
    pub fn new() -> Self {
        Self {
            open: Vec::with_capacity(2048),
            sequence: 0u64,
            high_water: 0usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
    pub fn len(&self) -> usize {
        self.open.len()
    }
    pub fn capacity(&self) -> usize {
        self.open.capacity()
    }
    /// Largest size the frontier ever had.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// The best rank, if any.
    pub fn peek(&self) -> Option<&FrontierRank<C>> {
        self.open.first().map(|e| &e.rank)
    }

    /// Adds a node that's not yet in the frontier, ranked by its evaluation.
    pub(crate) fn push<St: State, A: Action>(
        &mut self,
        tree: &mut SearchTree<St, A, C>,
        node_index: SearchTreeIndex,
    ) {
        self.verify_heap(tree);
        debug_assert!(!tree[node_index].is_open());

        let heap_index = self.open.len(); // Future heap_index
        tree[node_index].heap_index = Some(heap_index);
        self.open.push(FrontierEntry {
            rank: FrontierRank::new(tree[node_index].f, self.sequence),
            node_index,
        });
        self.sequence += 1;
        self.high_water = std::cmp::max(self.high_water, self.open.len());
        self.sift_up(tree, heap_index);

        self.verify_heap(tree);
    }

    /// Removes the best node.
    pub(crate) fn pop<St: State, A: Action>(
        &mut self,
        tree: &mut SearchTree<St, A, C>,
    ) -> Option<SearchTreeIndex> {
        #[cfg(feature = "coz_profile")]
        coz::scope!("Pop");

        self.verify_heap(tree);
        if self.open.is_empty() {
            return None;
        }

        let last = self.open.len() - 1;
        if last != 0 {
            self.swap(tree, 0, last);
        }
        let entry = self.open.pop()?;
        tree[entry.node_index].heap_index = None;
        if !self.open.is_empty() {
            self.sift_down(tree, 0);
        }

        self.verify_heap(tree);
        Some(entry.node_index)
    }

    /// Re-ranks an open node after its evaluation improved.
    pub(crate) fn improve<St: State, A: Action>(
        &mut self,
        tree: &mut SearchTree<St, A, C>,
        node_index: SearchTreeIndex,
    ) {
        let Some(heap_index) = tree[node_index].heap_index else {
            debug_assert!(false, "Tried to improve a node outside the frontier");
            return;
        };
        debug_assert_eq!(self.open[heap_index].node_index, node_index);

        self.open[heap_index].rank.improve_f(tree[node_index].f);
        self.sift_up(tree, heap_index);

        self.verify_heap(tree);
    }

    #[inline(always)]
    #[cfg(not(feature = "verify"))]
    fn verify_heap<St: State, A: Action>(&self, _tree: &SearchTree<St, A, C>) {
        // All good... (hopefully)
    }
    #[inline(always)]
    #[cfg(feature = "verify")]
    fn verify_heap<St: State, A: Action>(&self, tree: &SearchTree<St, A, C>) {
        // Every node,
        for (i, e) in self.open.iter().enumerate() {
            // - Has the right intrusive index set.
            assert_eq!(tree[e.node_index].heap_index, Some(i));
            // - Is ranked by its evaluation.
            assert!(tree[e.node_index].f == e.rank.f);

            // - Goes after its parent node, if any.
            if i == 0 {
                continue;
            }
            let p = up(i);
            assert!(
                self.open[p].rank <= self.open[i].rank,
                "Node[{p}]={:?} !<= child [{i}]={:?}. Out of heap of len={}",
                self.open[p],
                self.open[i],
                self.open.len(),
            );
        }
    }

    /// Raises a node
    /// Returns it's new index
    #[inline(always)]
    fn sift_up<St: State, A: Action>(
        &mut self,
        tree: &mut SearchTree<St, A, C>,
        mut pos: usize,
    ) -> usize {
        debug_assert!(pos < self.open.len(), "Index out of bounds");

        while pos != 0 {
            let parent = up(pos);
            if self.open[parent].rank <= self.open[pos].rank {
                break;
            }
            self.swap(tree, parent, pos);
            pos = parent;
        }
        pos
    }

    /// Lowers a node
    /// Returns it's new index
    #[inline(always)]
    fn sift_down<St: State, A: Action>(
        &mut self,
        tree: &mut SearchTree<St, A, C>,
        mut pos: usize,
    ) -> usize {
        let len = self.open.len();
        debug_assert!(pos < len, "Index out of bounds");

        loop {
            let first = down_left(pos);
            if first >= len {
                break;
            }
            debug_assert_eq!(first + HEAP_ARITY, down_right(pos) + 1);

            // Find the best child
            let mut child = first;
            for c in (first + 1)..min(first + HEAP_ARITY, len) {
                if self.open[c].rank < self.open[child].rank {
                    child = c;
                }
            }

            if self.open[pos].rank <= self.open[child].rank {
                break;
            }
            self.swap(tree, pos, child);
            pos = child;
        }
        pos
    }

    /// Swaps two entries keeping the intrusive indices in sync.
    #[inline(always)]
    fn swap<St: State, A: Action>(&mut self, tree: &mut SearchTree<St, A, C>, l: usize, r: usize) {
        debug_assert!(l < r, "Swap({l}, {r}) uses wrong argument order");
        self.open.swap(l, r);
        tree[self.open[l].node_index].heap_index = Some(l);
        tree[self.open[r].node_index].heap_index = Some(r);
    }
}

impl<C> Default for Frontier<C>
where
    C: Cost,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand_chacha::ChaCha8Rng;
    use rand_chacha::rand_core::SeedableRng;

    use super::*;
    use crate::search::SearchTreeNode;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    struct Id(u32);
    impl State for Id {}

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct Step;
    impl Action for Step {}

    fn push(tree: &mut SearchTree<Id, Step, u32>, frontier: &mut Frontier<u32>, id: u32, f: u32) {
        let i = tree.push(SearchTreeNode::new_root(Id(id), f, f));
        frontier.push(tree, i);
    }

    fn drain(tree: &mut SearchTree<Id, Step, u32>, frontier: &mut Frontier<u32>) -> Vec<u32> {
        let mut ids = vec![];
        while let Some(i) = frontier.pop(tree) {
            assert!(!tree[i].is_open());
            ids.push(tree[i].state().0);
        }
        ids
    }

    #[test]
    fn pops_by_evaluation() {
        let mut tree = SearchTree::new();
        let mut frontier = Frontier::new();
        for (id, f) in [(0, 5), (1, 3), (2, 9), (3, 1), (4, 4)] {
            push(&mut tree, &mut frontier, id, f);
        }
        assert_eq!(frontier.len(), 5);
        assert_eq!(frontier.peek().map(|r| r.f()), Some(1));
        assert_eq!(drain(&mut tree, &mut frontier), vec![3, 1, 4, 0, 2]);
        assert!(frontier.is_empty());
        assert_eq!(frontier.high_water(), 5);
    }

    #[test]
    fn ties_go_to_the_first_arrival() {
        let mut tree = SearchTree::new();
        let mut frontier = Frontier::new();
        for id in 0..40 {
            push(&mut tree, &mut frontier, id, 7);
        }
        push(&mut tree, &mut frontier, 40, 6);
        let mut expected = vec![40];
        expected.extend(0..40);
        assert_eq!(drain(&mut tree, &mut frontier), expected);
    }

    #[test]
    fn improve_raises_a_node() {
        let mut tree = SearchTree::new();
        let mut frontier = Frontier::new();
        for id in 0..20 {
            push(&mut tree, &mut frontier, id, 10 + id);
        }
        let i = tree.find(&Id(15)).unwrap();
        tree[i].f = 1;
        frontier.improve(&mut tree, i);

        let order = drain(&mut tree, &mut frontier);
        assert_eq!(order[0], 15);
        assert_eq!(order.len(), 20);
    }

    #[test]
    fn matches_a_sorted_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut tree = SearchTree::new();
        let mut frontier = Frontier::new();
        let mut expected = vec![];
        for id in 0..500u32 {
            let f = rng.random_range(0..50u32);
            push(&mut tree, &mut frontier, id, f);
            expected.push((f, id));
        }
        expected.sort();
        let expected: Vec<u32> = expected.into_iter().map(|(_, id)| id).collect();
        assert_eq!(drain(&mut tree, &mut frontier), expected);
    }
}
