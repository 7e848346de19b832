//! The interactive console
//!
//! Two pumps feed the [`Console`] multiplexer: one carries messages in from
//! the connection, the other carries completed operator lines out. The
//! console is the only task that draws on the terminal or writes to the
//! peer.

pub mod lines;
pub mod multiplexer;
pub mod presenter;
pub mod pumps;
pub mod session;

pub use lines::{History, SharedLineSource, StdinLines, normalize_line};
pub use multiplexer::{Console, FAREWELL, Mode, SessionChannels, SessionEnd};
pub use presenter::{AnsiConsole, INBOUND_MARKER, PROMPT, Presenter, Style};
pub use pumps::{inbound_pump, outbound_pump};
pub use session::{CHANNEL_CAPACITY, run_session};
