//! Command-line driver for [`BalancedTree`].
//!
//! Run with: `cargo run --features cli -- insert=10 insert=20 insert=30 print height`

use std::{
    fmt::Write as _,
    io::{self, BufRead, Write as _},
    num::ParseIntError,
    str::FromStr,
};

use anyhow::{Context, Result};
use clap::Parser;
use cordyceps_avl::{BalancedTree, Key};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "cordyceps_avl")]
#[command(about = "Run commands against an in-memory AVL tree")]
struct Cli {
    /// Maximum level of log events written to stderr.
    #[arg(long, default_value_t = Level::WARN)]
    log_level: Level,

    /// Check every tree invariant after each command.
    #[arg(long)]
    check: bool,

    /// Commands to run: insert=K, delete=K, search=K, min, max, height, len, print, dot, clear.
    ///
    /// If no commands are given, they are read from standard input.
    commands: Vec<Command>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Insert(Key),
    Delete(Key),
    Search(Key),
    Min,
    Max,
    Height,
    Len,
    Print,
    Dot,
    Clear,
}

#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),

    #[error("command `{0}` requires a key, as in `{0}=42`")]
    MissingKey(String),

    #[error("command `{command}` takes no key")]
    UnexpectedKey { command: String },

    #[error("invalid key `{key}` for command `{command}`")]
    InvalidKey {
        command: String,
        key: String,
        source: ParseIntError,
    },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once('=') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };

        let key = || -> Result<Key, CommandError> {
            let arg = arg.ok_or_else(|| CommandError::MissingKey(name.to_owned()))?;
            arg.trim().parse().map_err(|source| CommandError::InvalidKey {
                command: name.to_owned(),
                key: arg.to_owned(),
                source,
            })
        };

        let no_key = |command: Command| match arg {
            Some(_) => Err(CommandError::UnexpectedKey {
                command: name.to_owned(),
            }),
            None => Ok(command),
        };

        match name {
            "insert" => Ok(Command::Insert(key()?)),
            "delete" => Ok(Command::Delete(key()?)),
            "search" => Ok(Command::Search(key()?)),
            "min" => no_key(Command::Min),
            "max" => no_key(Command::Max),
            "height" => no_key(Command::Height),
            "len" => no_key(Command::Len),
            "print" => no_key(Command::Print),
            "dot" => no_key(Command::Dot),
            "clear" => no_key(Command::Clear),
            _ => Err(CommandError::Unknown(name.to_owned())),
        }
    }
}

fn found(key: Option<Key>) -> String {
    match key {
        Some(key) => key.to_string(),
        None => "not found".to_owned(),
    }
}

// Runs `command`, returning the line to print, if any.
fn run(tree: &mut BalancedTree, command: Command) -> Result<Option<String>> {
    debug!(?command, len = tree.len(), "running command");

    let output = match command {
        Command::Insert(key) => {
            tree.insert(key);
            None
        }
        Command::Delete(key) => {
            if !tree.delete(key) {
                debug!(key, "key not present; nothing deleted");
            }
            None
        }
        Command::Search(key) => Some(found(tree.search(key))),
        Command::Min => Some(found(tree.find_min())),
        Command::Max => Some(found(tree.find_max())),
        Command::Height => Some(tree.height().to_string()),
        Command::Len => Some(tree.len().to_string()),
        Command::Print => Some(tree.to_string()),
        Command::Dot => {
            let mut out = String::new();
            tree.dotgraph("tree", &mut out)
                .context("failed to render tree")?;
            writeln!(out).context("failed to render tree")?;
            Some(out)
        }
        Command::Clear => {
            tree.clear();
            None
        }
    };

    Ok(output)
}

fn read_commands(input: impl BufRead) -> Result<Vec<Command>> {
    let mut commands = Vec::new();

    for (line_no, line) in input.lines().enumerate() {
        let line = line.context("failed to read standard input")?;

        for token in line.split_whitespace() {
            let command = token
                .parse::<Command>()
                .with_context(|| format!("line {}", line_no + 1))?;
            commands.push(command);
        }
    }

    Ok(commands)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .init();

    let commands = if cli.commands.is_empty() {
        read_commands(io::stdin().lock())?
    } else {
        cli.commands
    };

    let mut tree = BalancedTree::new();
    let mut stdout = io::stdout().lock();

    for command in commands {
        if let Some(line) = run(&mut tree, command)? {
            writeln!(stdout, "{line}").context("failed to write to standard output")?;
        }

        if cli.check {
            tree.assert_invariants();
        }
    }

    Ok(())
}
