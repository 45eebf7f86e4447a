//! Submitted-line history

#[derive(Debug, Default, Clone)]
pub struct History {
    entries: Vec<String>,
    /// Navigation cursor in `[0, entries.len()]`; `len` means "past the newest entry".
    index: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted line and reset navigation to the end.
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
        self.index = self.entries.len();
    }

    /// Step towards older entries.
    pub fn older(&mut self) -> Option<&str> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index).map(String::as_str)
    }

    /// Step towards newer entries. Stops at the newest entry.
    pub fn newer(&mut self) -> Option<&str> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index).map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn index(&self) -> usize {
        self.index
    }
}
