use serde::{Deserialize, Serialize};

/// A point in percentage coordinates (0-100) of the image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position, in percent units.
    pub fn distance_to(&self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// How clicks are graded. One policy per room; never mixed mid-game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringPolicy {
    /// Euclidean distance bands in percent space.
    #[default]
    Distance,
    /// Discrete 16x16 board cells with quadrant sections. Wrong clicks can
    /// score negative points.
    Grid,
}

/// Grid dimensions for the [`ScoringPolicy::Grid`] policy.
pub const GRID_SIZE: i32 = 16;

/// Score a click against the target under the given policy.
pub fn score(policy: ScoringPolicy, click: Position, target: Position) -> i32 {
    match policy {
        ScoringPolicy::Distance => distance_score(click, target),
        ScoringPolicy::Grid => grid_score(to_cell(click), to_cell(target)),
    }
}

/// Distance-band scoring. Thresholds evaluated in ascending order, first
/// match wins.
pub fn distance_score(click: Position, target: Position) -> i32 {
    let d = click.distance_to(target);
    if d <= 5.0 {
        100 // perfect hit
    } else if d <= 15.0 {
        75
    } else if d <= 30.0 {
        50
    } else if d <= 50.0 {
        25
    } else if d <= 100.0 {
        10
    } else {
        0
    }
}

/// A cell on the 16x16 board. Out-of-range cells represent clicks outside
/// the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

/// Map a percent position onto a board cell. Positions outside 0-100 land
/// outside the board.
pub fn to_cell(pos: Position) -> Cell {
    Cell {
        row: (pos.y / 100.0 * GRID_SIZE as f64).floor() as i32,
        col: (pos.x / 100.0 * GRID_SIZE as f64).floor() as i32,
    }
}

fn on_board(cell: Cell) -> bool {
    (0..GRID_SIZE).contains(&cell.row) && (0..GRID_SIZE).contains(&cell.col)
}

/// Quadrant section (1-4) of a board cell: top-left, top-right,
/// bottom-left, bottom-right.
fn section_of(cell: Cell) -> u8 {
    match (cell.row < GRID_SIZE / 2, cell.col < GRID_SIZE / 2) {
        (true, true) => 1,
        (true, false) => 2,
        (false, true) => 3,
        (false, false) => 4,
    }
}

/// Grid-cell grading: exact cell 100, any of the 8 neighbours 50, same
/// section 0, elsewhere on the board -10, off the board -25.
pub fn grid_score(click: Cell, target: Cell) -> i32 {
    if !on_board(click) {
        return -25;
    }
    if click == target {
        return 100;
    }
    let adjacent = (click.row - target.row).abs() <= 1 && (click.col - target.col).abs() <= 1;
    if adjacent {
        return 50;
    }
    if section_of(click) == section_of(target) {
        return 0;
    }
    -10
}
