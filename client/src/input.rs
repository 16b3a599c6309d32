//! Line-based input: one command per line on stdin

use log::{debug, warn};
use std::io::BufRead;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Move { dx: i32, dy: i32 },
    Quit,
}

impl InputAction {
    /// `w`/`a`/`s`/`d` move up, left, down and right; `q` or `quit` exits.
    /// Anything else is ignored.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "w" => Some(InputAction::Move { dx: 0, dy: -1 }),
            "a" => Some(InputAction::Move { dx: -1, dy: 0 }),
            "s" => Some(InputAction::Move { dx: 0, dy: 1 }),
            "d" => Some(InputAction::Move { dx: 1, dy: 0 }),
            "q" | "quit" => Some(InputAction::Quit),
            _ => None,
        }
    }
}

/// Forwards parsed actions until the reader ends or the receiver is dropped.
/// End of input counts as `Quit`. Blocks the calling thread.
pub fn forward_actions<R: BufRead>(reader: R, actions: &mpsc::Sender<InputAction>) {
    let mut lines = reader.lines();

    loop {
        let action = match lines.next() {
            Some(Ok(line)) => match InputAction::parse(&line) {
                Some(action) => action,
                None => {
                    debug!("Ignoring input {:?}", line);
                    continue;
                }
            },
            None => InputAction::Quit,
            Some(Err(e)) => {
                warn!("Failed to read input: {}", e);
                InputAction::Quit
            }
        };

        if actions.blocking_send(action).is_err() || action == InputAction::Quit {
            break;
        }
    }
}

/// Reads stdin on a plain thread. A blocked read there does not hold up
/// runtime shutdown.
pub fn spawn_stdin_reader(actions: mpsc::Sender<InputAction>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || forward_actions(std::io::stdin().lock(), &actions))
}
