//! Command line tokenizer
//!
//! Splits a submitted line into an action and its arguments:
//! - Words are separated by spaces/tabs: `cd src`
//! - Double quotes group words: `echo "a b"`
//! - Backslash escapes a quote: `echo a\"b` gives `a"b`
//! - Any other escaped char keeps its backslash: `cd C:\Users` stays `C:\Users`
//!
//! Tokenizing never fails. An unterminated quote runs to the end of the line.

/// A tokenized line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// First word of the line, the dispatch key.
    pub action: Option<String>,
    /// Remaining words in order.
    pub arguments: Vec<String>,
}

impl Command {
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
    }
}

/// Which slot the word being built will be committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// No char seen yet for the current word.
    None,
    Action,
    Argument,
}

struct Tokenizer {
    action: Option<String>,
    arguments: Vec<String>,
    word: String,
    slot: Slot,
    enclosed: bool,
    escaped: bool,
}

impl Tokenizer {
    fn new() -> Self {
        Self {
            action: None,
            arguments: Vec::new(),
            word: String::new(),
            slot: Slot::None,
            enclosed: false,
            escaped: false,
        }
    }

    /// Decide where the word goes the first time something is added to it.
    fn open_slot(&mut self) {
        if self.slot != Slot::None {
            return;
        }
        self.slot = if self.action.is_some() {
            Slot::Argument
        } else {
            Slot::Action
        };
    }

    fn push_char(&mut self, c: char) {
        if self.escaped {
            if c != '"' {
                self.word.push('\\');
            }
            self.escaped = false;
        }
        self.word.push(c);
        self.open_slot();
    }

    fn backslash(&mut self) {
        if self.escaped {
            self.push_char('\\');
        } else {
            self.escaped = true;
        }
    }

    fn quote(&mut self) {
        if self.escaped {
            self.push_char('"');
        } else if self.slot == Slot::None {
            self.enclosed = true;
            self.open_slot();
        } else {
            // Closing quote, or a stray quote inside an unquoted word.
            self.enclosed = false;
        }
    }

    fn whitespace(&mut self, c: char) {
        if self.enclosed {
            self.push_char(c);
        } else {
            self.finish_word();
        }
    }

    fn finish_word(&mut self) {
        let word = std::mem::take(&mut self.word);
        match self.slot {
            Slot::Action => self.action = Some(word),
            Slot::Argument => self.arguments.push(word),
            Slot::None => {}
        }
        self.slot = Slot::None;
        self.enclosed = false;
        self.escaped = false;
    }

    fn finish(mut self) -> Command {
        self.finish_word();
        Command {
            action: self.action,
            arguments: self.arguments,
        }
    }
}

/// Tokenize a command line.
pub fn parse(input: &str) -> Command {
    if input.trim().is_empty() {
        return Command::default();
    }

    let mut tokenizer = Tokenizer::new();
    for c in input.chars() {
        match c {
            ' ' | '\t' => tokenizer.whitespace(c),
            '\\' => tokenizer.backslash(),
            '"' => tokenizer.quote(),
            other => tokenizer.push_char(other),
        }
    }
    tokenizer.finish()
}
