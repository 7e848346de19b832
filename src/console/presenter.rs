use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::{self, Stdout, Write};

/// Text shown where the operator types
pub const PROMPT: &str = "> ";

/// Marker placed before every inbound message
pub const INBOUND_MARKER: &str = "< ";

/// How a piece of console text is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Terminal default colour
    Plain,
    /// Messages received from the peer
    Inbound,
    /// Session start/end notices
    Status,
    /// Failures reported to the operator
    Error,
    /// Non-fatal notices
    Warning,
}

impl Style {
    fn color(self) -> Option<Color> {
        match self {
            Style::Plain => None,
            Style::Inbound => Some(Color::Blue),
            Style::Status => Some(Color::Green),
            Style::Error => Some(Color::Red),
            Style::Warning => Some(Color::Yellow),
        }
    }
}

/// Minimal terminal surface the console draws on
///
/// Keeping it this small lets the multiplexer run against a recording
/// double in tests instead of a real terminal.
pub trait Presenter: Send {
    /// Erases whatever is on the cursor's line and returns to column 0
    fn clear_line(&mut self) -> io::Result<()>;

    /// Writes `text` in the given style
    fn write(&mut self, text: &str, style: Style) -> io::Result<()>;

    /// Redraws the input prompt
    fn prompt(&mut self) -> io::Result<()> {
        self.write(PROMPT, Style::Plain)
    }
}

/// ANSI terminal presenter
///
/// # Examples
///
/// ```
/// use wsgat::console::{AnsiConsole, Presenter, Style};
///
/// let mut console = AnsiConsole::new(Vec::new());
/// console.write("connected\n", Style::Status).unwrap();
/// let rendered = String::from_utf8(console.into_inner()).unwrap();
/// assert!(rendered.contains("connected"));
/// ```
#[derive(Debug)]
pub struct AnsiConsole<W: Write = Stdout> {
    out: W,
}

impl AnsiConsole<Stdout> {
    /// Presenter writing to the process's standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl Clone for AnsiConsole<Stdout> {
    fn clone(&self) -> Self {
        Self::stdout()
    }
}

impl<W: Write> AnsiConsole<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Presenter for AnsiConsole<W> {
    fn clear_line(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::CurrentLine), MoveToColumn(0))?;
        self.out.flush()
    }

    fn write(&mut self, text: &str, style: Style) -> io::Result<()> {
        match style.color() {
            Some(color) => queue!(
                self.out,
                SetForegroundColor(color),
                Print(text),
                ResetColor
            )?,
            None => queue!(self.out, Print(text))?,
        }
        self.out.flush()
    }
}
