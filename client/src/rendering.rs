use crate::world::LocalView;
use log::info;
use shared::map::GameMap;
use shared::{PlayerId, WorldTable};

/// Symbol drawn for the local player.
pub const LOCAL_PLAYER_SYMBOL: char = '☺';
/// Symbol drawn for every other player.
pub const REMOTE_PLAYER_SYMBOL: char = '☻';

pub trait Renderer: Send {
    fn render(&mut self, view: &LocalView);
}

/// Draws the map as text with players overlaid, one line per row.
pub fn render_grid(map: &GameMap, player_id: PlayerId, players: &WorldTable) -> String {
    let mut grid = String::with_capacity(map.height() * (map.width() + 1));

    for y in 0..map.height() as i32 {
        for x in 0..map.width() as i32 {
            let occupant = players
                .iter()
                .find(|(_, position)| position.x == x && position.y == y)
                .map(|(id, _)| *id);

            let symbol = match occupant {
                Some(id) if id == player_id => LOCAL_PLAYER_SYMBOL,
                Some(_) => REMOTE_PLAYER_SYMBOL,
                None => map.cell(x, y).map(|cell| cell.symbol()).unwrap_or(' '),
            };
            grid.push(symbol);
        }
        grid.push('\n');
    }

    grid
}

/// Writes a frame to the log whenever the visible state changes.
#[derive(Default)]
pub struct LogRenderer {
    last_frame: Option<String>,
    frames: usize,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames actually drawn, not counting unchanged redraws.
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, view: &LocalView) {
        let frame = render_grid(&view.map, view.player_id, &view.players);
        if self.last_frame.as_deref() == Some(frame.as_str()) {
            return;
        }

        let position = view
            .local_position()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        info!(
            "Player {} at {}, {} players online\n{}",
            view.player_id,
            position,
            view.players.len(),
            frame
        );

        self.last_frame = Some(frame);
        self.frames += 1;
    }
}
