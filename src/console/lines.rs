use crate::Result;
use crate::common::LineSource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

/// Default number of lines kept in [`History`]
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// A line source shared by successive sessions
///
/// The outbound pump of the running session holds the lock; the next
/// session's pump gets it once the previous pump has been stopped.
pub type SharedLineSource<L> = Arc<Mutex<L>>;

/// Strips trailing newline and carriage-return characters
///
/// ```
/// use wsgat::console::normalize_line;
///
/// assert_eq!(normalize_line("hello\r\n"), "hello");
/// assert_eq!(normalize_line("  spaced  "), "  spaced  ");
/// ```
pub fn normalize_line(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Bounded, in-memory input history
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Appends a line, evicting the oldest one when full
    pub fn push(&mut self, line: &str) {
        if self.limit == 0 {
            return;
        }
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(line.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

/// Operator lines read from standard input
///
/// Reading happens on a dedicated OS thread. A blocked terminal read
/// cannot be cancelled, and keeping it off the runtime's blocking pool
/// means process exit never waits for the operator to press enter.
pub struct StdinLines {
    lines: mpsc::Receiver<std::io::Result<String>>,
    history: History,
}

impl StdinLines {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        let reader = std::thread::Builder::new()
            .name("stdin-lines".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
                debug!("Standard input reader stopped");
            });
        // Without a reader the source simply reports end of input.
        if let Err(e) = reader {
            warn!(error = %e, "Failed to spawn stdin reader");
        }
        Self {
            lines: rx,
            history: History::default(),
        }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinLines {
    async fn read_line(&mut self) -> Result<Option<String>> {
        match self.lines.recv().await {
            Some(line) => Ok(Some(line?)),
            None => Ok(None),
        }
    }

    fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.lines.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    fn add_history(&mut self, line: &str) {
        self.history.push(line);
    }
}
