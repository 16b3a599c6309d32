//! Grid map model
//!
//! Maps are plain text, one row per line, one symbol per cell. The symbol
//! table is built once per load; unknown symbols are treated as empty floor.
//! The player symbol marks the spawn coordinate and leaves an empty cell.

use crate::PlayerState;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub const SPAWN_SYMBOL: char = '☺';

/// Small walled room used when no map file is given. Spawn is at (1, 1).
pub const DEFAULT_MAP: &str = "\
▤▤▤▤▤▤▤▤▤▤▤▤▤▤▤▤
▤☺             ▤
▤    ♣♣        ▤
▤    ♣♣    ☠   ▤
▤  ၜ           ▤
▤         ▤▤▤  ▤
▤   ࠎ       ○  ▤
▤▤▤▤▤▤▤▤▤▤▤▤▤▤▤▤";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Empty,
    Wall,
    Enemy,
    Vegetation,
    Coin,
    Portal,
    Duck,
}

const SYMBOLS: [(char, CellKind); 7] = [
    (' ', CellKind::Empty),
    ('▤', CellKind::Wall),
    ('☠', CellKind::Enemy),
    ('♣', CellKind::Vegetation),
    ('ၜ', CellKind::Coin),
    ('○', CellKind::Portal),
    ('ࠎ', CellKind::Duck),
];

impl CellKind {
    /// Solid cells block movement.
    pub fn is_solid(&self) -> bool {
        matches!(self, CellKind::Wall | CellKind::Enemy | CellKind::Duck)
    }

    pub fn symbol(&self) -> char {
        SYMBOLS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(symbol, _)| *symbol)
            .unwrap_or(' ')
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map: {0}")]
    Io(#[from] std::io::Error),

    #[error("map has no spawn symbol")]
    MissingSpawn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMap {
    cells: Vec<Vec<CellKind>>,
    spawn: PlayerState,
}

impl GameMap {
    pub fn parse(text: &str) -> Result<Self, MapError> {
        let table: HashMap<char, CellKind> = SYMBOLS.iter().copied().collect();

        let mut spawn = None;
        let mut cells = Vec::new();

        for (y, line) in text.lines().enumerate() {
            let mut row = Vec::new();
            for (x, symbol) in line.chars().enumerate() {
                if symbol == SPAWN_SYMBOL {
                    spawn = Some(PlayerState::new(x as i32, y as i32));
                    row.push(CellKind::Empty);
                } else {
                    row.push(table.get(&symbol).copied().unwrap_or(CellKind::Empty));
                }
            }
            cells.push(row);
        }

        let spawn = spawn.ok_or(MapError::MissingSpawn)?;
        Ok(Self { cells, spawn })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn spawn(&self) -> PlayerState {
        self.spawn
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    /// Length of the longest row.
    pub fn width(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell at `(x, y)`, or `None` outside the grid. Rows may be ragged.
    pub fn cell(&self, x: i32, y: i32) -> Option<CellKind> {
        if x < 0 || y < 0 {
            return None;
        }
        self.cells
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).is_some_and(|cell| !cell.is_solid())
    }
}

impl Default for GameMap {
    fn default() -> Self {
        // DEFAULT_MAP always contains the spawn symbol.
        Self::parse(DEFAULT_MAP).unwrap_or_else(|_| Self {
            cells: vec![vec![CellKind::Empty; 3]; 3],
            spawn: crate::DEFAULT_SPAWN,
        })
    }
}
