use std::borrow::Cow;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, info};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

use crate::environment::Environment;
use crate::evaluator::Interpreter;
use crate::lexer::{TokenKind, tokenize};

const PROMPT: &str = ">>> ";
const CONTINUATION_PROMPT: &str = "... ";

const KEYWORDS: [&str; 7] = ["defun", "lambda", "if", "else", "print", "True", "False"];

/// Accumulates input lines until the braces they open are closed.
///
/// The count is a plain `{` minus `}` tally over the raw text, so braces
/// inside comments are counted too.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    text: String,
    depth: i64,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        ChunkBuffer::default()
    }

    pub fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
        for c in line.chars() {
            match c {
                '{' => self.depth += 1,
                '}' => self.depth -= 1,
                _ => {}
            }
        }
    }

    /// Unclosed `{` count. Negative when there are more closers than openers.
    pub fn depth(&self) -> i64 {
        self.depth
    }

    pub fn is_complete(&self) -> bool {
        self.depth <= 0
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Hands back the buffered chunk and resets the buffer.
    pub fn take(&mut self) -> String {
        self.depth = 0;
        std::mem::take(&mut self.text)
    }

    fn prompt(&self) -> &'static str {
        if self.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        }
    }
}

struct FunlangCompleter {
    env: Rc<RefCell<Environment>>,
}

impl FunlangCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        FunlangCompleter { env }
    }

    // Names in scope plus keywords that extend `prefix`, as suffixes
    fn candidates(&self, prefix: &str) -> Vec<String> {
        let mut names = self.env.borrow().get_identifiers();
        names.extend(KEYWORDS.iter().map(|k| k.to_string()));
        let mut suffixes: Vec<String> = names
            .into_iter()
            .filter(|name| name.len() > prefix.len() && name.starts_with(prefix))
            .map(|name| name[prefix.len()..].to_string())
            .collect();
        suffixes.sort();
        suffixes
    }
}

impl rustyline::completion::Completer for FunlangCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let suffixes = match tokenize(&line[..pos]) {
            Ok(tokens) => match tokens.last() {
                Some(token) if token.span.end == pos => match &token.kind {
                    TokenKind::Identifier(prefix) => self.candidates(prefix),
                    _ => vec![],
                },
                _ => vec![],
            },
            Err(_) => vec![],
        };
        Ok((pos, suffixes))
    }
}

// Colors the bracket pair around the cursor; stray closers turn red.
struct BracketHighlighter;

fn closes(opening: char, closing: char) -> bool {
    matches!((opening, closing), ('(', ')') | ('{', '}'))
}

impl Highlighter for BracketHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        // (bracket, offset in `line`, offset in `highlighted`)
        let mut stack: Vec<(char, usize, usize)> = Vec::new();
        let mut highlighted = String::with_capacity(line.len());
        let cursor = pos.checked_sub(1);

        for (i, c) in line.char_indices() {
            match c {
                '#' => {
                    highlighted.push_str(&format!("\x1b[90m{}\x1b[0m", &line[i..])); // Grey for comments
                    break;
                }
                '(' | '{' => {
                    stack.push((c, i, highlighted.len()));
                    highlighted.push(c);
                }
                ')' | '}' => match stack.pop() {
                    Some((opening, start, at)) if closes(opening, c) => {
                        if cursor == Some(i) || cursor == Some(start) {
                            highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c)); // Blue for the matching pair
                            highlighted.replace_range(
                                at..at + opening.len_utf8(),
                                &format!("\x1b[1;34m{}\x1b[0m", opening),
                            );
                        } else {
                            highlighted.push(c);
                        }
                    }
                    Some((opening, _, at)) => {
                        highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for mismatched pairs
                        highlighted.replace_range(
                            at..at + opening.len_utf8(),
                            &format!("\x1b[1;31m{}\x1b[0m", opening),
                        );
                    }
                    None => highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)),
                },
                _ => highlighted.push(c),
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct ReplHelper {
    #[rustyline(Highlighter)]
    highlighter: BracketHighlighter,
    #[rustyline(Completer)]
    completer: FunlangCompleter,
}

/// Line editor settings for [`run`].
#[derive(Debug, Clone)]
pub struct ReplOptions {
    pub history: PathBuf,
    pub vi: bool,
}

impl Default for ReplOptions {
    fn default() -> Self {
        ReplOptions {
            history: PathBuf::from(".funlang_history"),
            vi: false,
        }
    }
}

/// Runs the interactive loop until `exit`, Ctrl-D, or Ctrl-C on an empty
/// prompt. Definitions persist across chunks.
pub fn run(mut interpreter: Interpreter, options: ReplOptions) -> rustyline::Result<()> {
    println!("funlang {}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let helper = ReplHelper {
        highlighter: BracketHighlighter,
        completer: FunlangCompleter::new(interpreter.globals()),
    };
    let edit_mode = if options.vi {
        rustyline::EditMode::Vi
    } else {
        rustyline::EditMode::Emacs
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(edit_mode)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    // Ctrl-S inserts a newline without submitting the line
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(&options.history).is_err() {
        info!("no history at {}", options.history.display());
    }

    let mut buffer = ChunkBuffer::new();
    loop {
        match rl.readline(buffer.prompt()) {
            Ok(line) => {
                let trimmed = line.trim();
                if buffer.is_empty() {
                    if trimmed.is_empty() {
                        continue;
                    }
                    if trimmed.eq_ignore_ascii_case("exit") {
                        break;
                    }
                }
                rl.add_history_entry(line.as_str())?;
                buffer.push_line(&line);
                if !buffer.is_complete() {
                    debug!("chunk open at depth {}", buffer.depth());
                    continue;
                }

                let chunk = buffer.take();
                match interpreter.run(&chunk) {
                    Ok(value) if value.is_void() => {}
                    Ok(value) => println!("{}", value),
                    Err(err) => err.pretty_print("REPL", &chunk),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                if buffer.is_empty() {
                    break;
                }
                buffer.take();
                println!("Discarded incomplete input.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!();
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&options.history)
}
