//! Terminal output used by the session
//!
//! Commands are queued and only reach the device on `flush`, so one render is one write.

use std::io::{self, Stdout, Write};

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    queue,
    style::{Color, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

const FALLBACK_WIDTH: u16 = 80;

/// Terminal primitives the editor needs on top of plain writes.
pub trait Terminal: Write {
    fn move_to_column(&mut self, column: u16) -> io::Result<()>;
    /// Clear the whole current line.
    fn clear_line(&mut self) -> io::Result<()>;
    fn width(&self) -> u16;
    fn set_foreground(&mut self, color: Color) -> io::Result<()>;
    fn reset_color(&mut self) -> io::Result<()>;
    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()>;
    fn enter_raw_mode(&mut self) -> io::Result<()>;
    fn leave_raw_mode(&mut self) -> io::Result<()>;

    fn newline(&mut self) -> io::Result<()> {
        self.write_all(b"\r\n")
    }
}

/// Crossterm-backed terminal over any writer.
///
/// Only the stdout flavor touches the tty itself (raw mode, size); over other writers
/// those calls are bookkeeping so output can be captured.
pub struct CrosstermTerminal<W: Write> {
    out: W,
    owns_tty: bool,
    raw: bool,
}

impl CrosstermTerminal<Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: io::stdout(),
            owns_tty: true,
            raw: false,
        }
    }
}

impl<W: Write> CrosstermTerminal<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            owns_tty: false,
            raw: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }
}

impl<W: Write> Write for CrosstermTerminal<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl<W: Write> Terminal for CrosstermTerminal<W> {
    fn move_to_column(&mut self, column: u16) -> io::Result<()> {
        queue!(self.out, MoveToColumn(column))
    }

    fn clear_line(&mut self) -> io::Result<()> {
        queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))
    }

    fn width(&self) -> u16 {
        if !self.owns_tty {
            return FALLBACK_WIDTH;
        }
        match terminal::size() {
            Ok((cols, _)) if cols > 0 => cols,
            _ => FALLBACK_WIDTH,
        }
    }

    fn set_foreground(&mut self, color: Color) -> io::Result<()> {
        queue!(self.out, SetForegroundColor(color))
    }

    fn reset_color(&mut self) -> io::Result<()> {
        queue!(self.out, ResetColor)
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        if visible {
            queue!(self.out, Show)
        } else {
            queue!(self.out, Hide)
        }
    }

    fn enter_raw_mode(&mut self) -> io::Result<()> {
        if self.raw {
            return Ok(());
        }
        if self.owns_tty {
            terminal::enable_raw_mode()?;
        }
        self.raw = true;
        Ok(())
    }

    fn leave_raw_mode(&mut self) -> io::Result<()> {
        if !self.raw {
            return Ok(());
        }
        if self.owns_tty {
            terminal::disable_raw_mode()?;
        }
        self.raw = false;
        Ok(())
    }
}

impl<W: Write> Drop for CrosstermTerminal<W> {
    fn drop(&mut self) {
        if self.owns_tty && self.raw {
            let _ = terminal::disable_raw_mode();
        }
    }
}
