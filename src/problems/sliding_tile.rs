use derive_more::Display;
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

pub type Tile = u8;
pub type SlidingTileCost = u32;
pub type SlidingTilePath<const N: usize> = Path<TileBoard<N>, SlideAction, SlidingTileCost>;

/// The 3x3 puzzle.
pub type EightPuzzle = SlidingTileProblem<3>;
/// The 4x4 puzzle.
pub type FifteenPuzzle = SlidingTileProblem<4>;

/// The tile we slide around.
pub const BLANK: Tile = 0;

#[derive(Debug, Error)]
pub enum SlidingTileError {
    #[error("Empty input")]
    EmptyInput,
    #[error("Expected a {expected}x{expected} board, found {rows} rows")]
    WrongRowCount { expected: usize, rows: usize },
    #[error("Expected {expected} tiles in row {row}, found {found}")]
    WrongRowLength {
        expected: usize,
        row: usize,
        found: usize,
    },
    #[error("Invalid tile '{token}' found at ({row},{column})")]
    InvalidTile {
        token: String,
        row: usize,
        column: usize,
    },
    #[error("Tile {0} appears more than once")]
    DuplicateTile(Tile),
    #[error("Expected an initial board and an optional goal board, found {0} boards")]
    WrongBoardCount(usize),
    #[error("Unsolvable board, {inversions} inversions relative to the goal")]
    Unsolvable { inversions: usize },
}

/// A square board of `N*N` distinct tiles, `BLANK` included.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileBoard<const N: usize> {
    tiles: [[Tile; N]; N],
    /// Where `BLANK` is, as `(row, column)`.
    blank: (u8, u8),
}
impl<const N: usize> State for TileBoard<N> {}

impl<const N: usize> TileBoard<N> {
    /// Tiles must fit in a `Tile`.
    const SIZE_OK: () = assert!(N >= 1 && N * N <= (Tile::MAX as usize) + 1);

    /// Validates that `tiles` is a permutation of `0..N*N`.
    pub fn new(tiles: [[Tile; N]; N]) -> Result<Self, SlidingTileError> {
        #[allow(clippy::let_unit_value)]
        let () = Self::SIZE_OK;

        let mut seen = vec![false; N * N];
        let mut blank = (0u8, 0u8);
        for (row, line) in tiles.iter().enumerate() {
            for (column, &tile) in line.iter().enumerate() {
                match seen.get_mut(tile as usize) {
                    None => {
                        return Err(SlidingTileError::InvalidTile {
                            token: tile.to_string(),
                            row,
                            column,
                        });
                    }
                    Some(true) => return Err(SlidingTileError::DuplicateTile(tile)),
                    Some(seen) => *seen = true,
                }
                if tile == BLANK {
                    blank = (row as u8, column as u8);
                }
            }
        }
        Ok(Self { tiles, blank })
    }

    /// Tiles in order, with the blank at the bottom-right corner.
    pub fn solved() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SIZE_OK;

        let mut tiles = [[BLANK; N]; N];
        for (i, tile) in tiles.iter_mut().flatten().enumerate() {
            *tile = ((i + 1) % (N * N)) as Tile;
        }
        Self {
            tiles,
            blank: ((N - 1) as u8, (N - 1) as u8),
        }
    }

    #[inline(always)]
    pub fn tile(&self, row: usize, column: usize) -> Tile {
        self.tiles[row][column]
    }
    #[inline(always)]
    pub fn tiles(&self) -> &[[Tile; N]; N] {
        &self.tiles
    }
    /// `(row, column)` of the blank.
    #[inline(always)]
    pub fn blank(&self) -> (usize, usize) {
        (self.blank.0 as usize, self.blank.1 as usize)
    }

    /// Tiles in reading order.
    pub fn iter(&self) -> impl Iterator<Item = Tile> + '_ {
        self.tiles.iter().flatten().copied()
    }

    /// `(row, column)` of every tile, indexed by tile.
    pub fn positions(&self) -> Vec<(u8, u8)> {
        let mut positions = vec![(0u8, 0u8); N * N];
        for (row, line) in self.tiles.iter().enumerate() {
            for (column, &tile) in line.iter().enumerate() {
                positions[tile as usize] = (row as u8, column as u8);
            }
        }
        positions
    }
}

impl<const N: usize> std::fmt::Display for TileBoard<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let width = (N * N - 1).to_string().len();
        for (row, line) in self.tiles.iter().enumerate() {
            if row != 0 {
                writeln!(f)?;
            }
            for (column, tile) in line.iter().enumerate() {
                if column != 0 {
                    write!(f, " ")?;
                }
                match *tile {
                    BLANK => write!(f, "{:>width$}", "_")?,
                    tile => write!(f, "{tile:>width$}")?,
                }
            }
        }
        Ok(())
    }
}

impl<const N: usize> std::convert::TryFrom<&str> for TileBoard<N> {
    type Error = SlidingTileError;

    /// Parses whitespace separated tiles, one row per line.
    ///
    /// `0` or `_` is the blank. Empty lines and `#` comments are skipped.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let lines: Vec<&str> = s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();

        if lines.is_empty() {
            return Err(SlidingTileError::EmptyInput);
        }
        if lines.len() != N {
            return Err(SlidingTileError::WrongRowCount {
                expected: N,
                rows: lines.len(),
            });
        }

        let mut tiles = [[BLANK; N]; N];
        for (row, line) in lines.iter().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != N {
                return Err(SlidingTileError::WrongRowLength {
                    expected: N,
                    row,
                    found: tokens.len(),
                });
            }
            for (column, token) in tokens.into_iter().enumerate() {
                tiles[row][column] = match token {
                    "_" => BLANK,
                    token => token
                        .parse::<Tile>()
                        .map_err(|_| SlidingTileError::InvalidTile {
                            token: token.to_string(),
                            row,
                            column,
                        })?,
                };
            }
        }

        TileBoard::new(tiles)
    }
}

/// Where the blank goes.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum SlideAction {
    #[display("←")]
    Left,
    #[display("↑")]
    Up,
    #[display("→")]
    Right,
    #[display("↓")]
    Down,
}
impl Action for SlideAction {}

/// Moves are the same on every board, so the space carries no data.
#[derive(Copy, Clone, Debug, Default)]
pub struct SlidingTileSpace<const N: usize>;

impl<const N: usize> Space<TileBoard<N>, SlideAction, SlidingTileCost> for SlidingTileSpace<N> {
    fn actions(&self, s: &TileBoard<N>) -> Actions<SlideAction> {
        let (row, column) = s.blank();
        let mut actions = Actions::new();
        if column > 0 {
            actions.push(SlideAction::Left);
        }
        if row > 0 {
            actions.push(SlideAction::Up);
        }
        if column + 1 < N {
            actions.push(SlideAction::Right);
        }
        if row + 1 < N {
            actions.push(SlideAction::Down);
        }
        actions
    }

    fn apply(&self, s: &TileBoard<N>, a: &SlideAction) -> Option<TileBoard<N>> {
        let (row, column) = s.blank();

        let (new_row, new_column) = match a {
            SlideAction::Left => (row, column.checked_sub(1)?),
            SlideAction::Up => (row.checked_sub(1)?, column),
            SlideAction::Right => (row, column + 1),
            SlideAction::Down => (row + 1, column),
        };
        if new_row >= N || new_column >= N {
            return None;
        }

        let mut next = *s;
        next.tiles[row][column] = s.tiles[new_row][new_column];
        next.tiles[new_row][new_column] = BLANK;
        next.blank = (new_row as u8, new_column as u8);
        Some(next)
    }
}

#[derive(Clone, Debug)]
pub struct SlidingTileProblem<const N: usize> {
    space: SlidingTileSpace<N>,
    initial: TileBoard<N>,
    goal: TileBoard<N>,
    /// Goal `(row, column)` of every tile, indexed by tile.
    goal_positions: Vec<(u8, u8)>,
}

impl<const N: usize> Problem<SlidingTileSpace<N>, TileBoard<N>, SlideAction, SlidingTileCost>
    for SlidingTileProblem<N>
{
    fn space(&self) -> &SlidingTileSpace<N> {
        &self.space
    }
    fn start(&self) -> &TileBoard<N> {
        &self.initial
    }
    fn is_goal(&self, s: &TileBoard<N>) -> bool {
        *s == self.goal
    }
}

impl<const N: usize> SlidingTileProblem<N> {
    pub fn new(initial: TileBoard<N>, goal: TileBoard<N>) -> Self {
        Self {
            space: SlidingTileSpace,
            initial,
            goal,
            goal_positions: goal.positions(),
        }
    }
    /// A problem towards the solved board.
    pub fn from_initial(initial: TileBoard<N>) -> Self {
        Self::new(initial, TileBoard::solved())
    }

    pub fn initial(&self) -> &TileBoard<N> {
        &self.initial
    }
    pub fn goal(&self) -> &TileBoard<N> {
        &self.goal
    }
    #[inline(always)]
    pub(crate) fn goal_position(&self, tile: Tile) -> (usize, usize) {
        let (row, column) = self.goal_positions[tile as usize];
        (row as usize, column as usize)
    }

    /// Pairs of non-blank tiles whose order in `board` is the opposite of
    /// their order in the goal, both read row by row.
    pub fn inversions(&self, board: &TileBoard<N>) -> usize {
        let ranks: Vec<usize> = board
            .iter()
            .filter(|&t| t != BLANK)
            .map(|t| {
                let (row, column) = self.goal_position(t);
                row * N + column
            })
            .collect();

        let mut inversions = 0usize;
        for (i, a) in ranks.iter().enumerate() {
            inversions += ranks[i + 1..].iter().filter(|&b| a > b).count();
        }
        inversions
    }

    /// Whether the goal can be reached from `board`.
    ///
    /// Horizontal moves keep the inversion count. Vertical moves jump a tile
    /// over `N-1` others, so they only flip its parity when `N` is even, and
    /// then they also move the blank one row.
    pub fn is_solvable(&self, board: &TileBoard<N>) -> bool {
        let mut parity = self.inversions(board);
        if N % 2 == 0 {
            let row = board.blank().0;
            let goal_row = self.goal.blank().0;
            parity += row.abs_diff(goal_row);
        }
        parity % 2 == 0
    }

    /// Cheap rejection of initial boards that can't reach the goal.
    pub fn check_solvable(&self) -> Result<(), SlidingTileError> {
        if self.is_solvable(&self.initial) {
            return Ok(());
        }
        Err(SlidingTileError::Unsolvable {
            inversions: self.inversions(&self.initial),
        })
    }

    /// A problem with the same goal, starting from a board scrambled with
    /// `moves` random moves away from the goal.
    ///
    /// Scrambles never undo their previous move.
    pub fn randomize<R: rand::Rng>(&self, r: &mut R, moves: usize) -> Self {
        let mut board = self.goal;
        let mut previous: Option<SlideAction> = None;
        for _ in 0..moves {
            let actions: Actions<SlideAction> = self
                .space
                .actions(&board)
                .into_iter()
                .filter(|a| Some(a.reverse()) != previous)
                .collect();
            if actions.is_empty() {
                break;
            }
            let a = actions[r.random_range(0..actions.len())];
            if let Some(next) = self.space.apply(&board, &a) {
                board = next;
                previous = Some(a);
            }
        }
        Self::new(board, self.goal)
    }

    /// Plays `actions` from the initial board.
    pub fn replay(&self, actions: &[SlideAction]) -> Option<TileBoard<N>> {
        actions
            .iter()
            .try_fold(self.initial, |board, a| self.space.apply(&board, a))
    }

    /// Searches a path to the goal ranking boards with `H`.
    pub fn solve<H>(&self, config: &SearchConfig) -> Result<SlidingTilePath<N>, SearchError>
    where
        H: Heuristic<Self, SlidingTileSpace<N>, TileBoard<N>, SlideAction, SlidingTileCost>,
    {
        search::<H, Self, SlidingTileSpace<N>, TileBoard<N>, SlideAction, SlidingTileCost>(
            self, config,
        )
    }
}

impl SlideAction {
    pub fn reverse(&self) -> Self {
        match self {
            SlideAction::Left => SlideAction::Right,
            SlideAction::Up => SlideAction::Down,
            SlideAction::Right => SlideAction::Left,
            SlideAction::Down => SlideAction::Up,
        }
    }
}

impl<const N: usize> std::convert::TryFrom<&str> for SlidingTileProblem<N> {
    type Error = SlidingTileError;

    /// Parses an initial board and an optional goal board separated by an
    /// empty line. The goal defaults to the solved board.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut blocks: Vec<Vec<&str>> = vec![];
        let mut block: Vec<&str> = vec![];
        for line in s.lines().map(str::trim).filter(|l| !l.starts_with('#')) {
            if line.is_empty() {
                if !block.is_empty() {
                    blocks.push(std::mem::take(&mut block));
                }
            } else {
                block.push(line);
            }
        }
        if !block.is_empty() {
            blocks.push(block);
        }

        match blocks.as_slice() {
            [] => Err(SlidingTileError::EmptyInput),
            [initial] => Ok(Self::from_initial(TileBoard::try_from(
                initial.join("\n").as_str(),
            )?)),
            [initial, goal] => Ok(Self::new(
                TileBoard::try_from(initial.join("\n").as_str())?,
                TileBoard::try_from(goal.join("\n").as_str())?,
            )),
            blocks => Err(SlidingTileError::WrongBoardCount(blocks.len())),
        }
    }
}

impl<const N: usize> std::fmt::Display for SlidingTileProblem<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "SlidingTileProblem({N}x{N}):")?;
        writeln!(f, "{}", self.initial)?;
        writeln!(f, "->")?;
        write!(f, "{}", self.goal)
    }
}

/// Sum of the Manhattan distances of every tile to its goal position,
/// the blank included.
///
/// Counting the blank can overestimate, so this is not admissible.
#[derive(Debug)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct SlidingTileManhattanDistance;

/// Sum of the Manhattan distances of every tile to its goal position,
/// the blank excluded.
///
/// Admissible and consistent.
#[derive(Debug)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct SlidingTileManhattanDistanceNoBlank;

/// Number of non-blank tiles out of place.
#[derive(Debug)]
#[cfg_attr(feature = "inspect", derive(Clone))]
pub struct SlidingTileMisplacedTiles;

fn manhattan_distance<const N: usize>(
    p: &SlidingTileProblem<N>,
    s: &TileBoard<N>,
    count_blank: bool,
) -> SlidingTileCost {
    let mut d = 0usize;
    for (row, line) in s.tiles().iter().enumerate() {
        for (column, &tile) in line.iter().enumerate() {
            if tile == BLANK && !count_blank {
                continue;
            }
            let (goal_row, goal_column) = p.goal_position(tile);
            d += row.abs_diff(goal_row) + column.abs_diff(goal_column);
        }
    }
    d as SlidingTileCost
}

impl<const N: usize>
    Heuristic<
        SlidingTileProblem<N>,
        SlidingTileSpace<N>,
        TileBoard<N>,
        SlideAction,
        SlidingTileCost,
    > for SlidingTileManhattanDistance
{
    #[inline(always)]
    fn h(p: &SlidingTileProblem<N>, s: &TileBoard<N>) -> Result<SlidingTileCost, ProblemError> {
        Ok(manhattan_distance(p, s, true))
    }
}

impl<const N: usize>
    Heuristic<
        SlidingTileProblem<N>,
        SlidingTileSpace<N>,
        TileBoard<N>,
        SlideAction,
        SlidingTileCost,
    > for SlidingTileManhattanDistanceNoBlank
{
    #[inline(always)]
    fn h(p: &SlidingTileProblem<N>, s: &TileBoard<N>) -> Result<SlidingTileCost, ProblemError> {
        Ok(manhattan_distance(p, s, false))
    }
}

impl<const N: usize>
    Heuristic<
        SlidingTileProblem<N>,
        SlidingTileSpace<N>,
        TileBoard<N>,
        SlideAction,
        SlidingTileCost,
    > for SlidingTileMisplacedTiles
{
    #[inline(always)]
    fn h(p: &SlidingTileProblem<N>, s: &TileBoard<N>) -> Result<SlidingTileCost, ProblemError> {
        let misplaced = s
            .iter()
            .zip(p.goal().iter())
            .filter(|&(tile, goal)| tile != BLANK && tile != goal)
            .count();
        Ok(misplaced as SlidingTileCost)
    }
}
