//! Line-oriented console grammar shared by the emulator and firmware hosts.
//!
//! Commands are whitespace separated and case-insensitive. The first word is
//! looked up in [`COMMANDS`]; each command then parses its own arguments with
//! small `winnow` parsers applied to whole words, so a malformed argument is
//! reported against the word that carried it.

use core::fmt;
use core::time::Duration;

use winnow::ascii::{Caseless, digit1, multispace0};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{literal, take_till};

/// Largest number of pulses a single `pulse` command may inject.
pub const MAX_PULSE_COUNT: u16 = 1_024;

/// Raw code injected by `pulse` when no `raw=` is given (mid-scale).
pub const DEFAULT_PULSE_RAW: u16 = 2_048;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Init,
    Start,
    Stop,
    Average,
    Status,
    Log,
    Pulse,
    Wait,
    Notify,
    Help,
}

/// Static description of one console command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
    pub summary: &'static str,
}

/// Every command the console understands, in help order.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "init",
        tag: CommandTag::Init,
        usage: "init",
        summary: "configure clocks, trigger, routing, converter and transfer engine",
    },
    CommandSpec {
        name: "start",
        tag: CommandTag::Start,
        usage: "start",
        summary: "begin one sampling session if idle",
    },
    CommandSpec {
        name: "stop",
        tag: CommandTag::Stop,
        usage: "stop",
        summary: "halt the trigger chain and clear the session flag",
    },
    CommandSpec {
        name: "avg",
        tag: CommandTag::Average,
        usage: "avg",
        summary: "print the buffer average in millivolts",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        usage: "status",
        summary: "show session, transfer and power state",
    },
    CommandSpec {
        name: "log",
        tag: CommandTag::Log,
        usage: "log",
        summary: "dump the telemetry ring",
    },
    CommandSpec {
        name: "pulse",
        tag: CommandTag::Pulse,
        usage: "pulse [<count>] [raw=<code>]",
        summary: "inject trigger pulses converting to the given raw code",
    },
    CommandSpec {
        name: "wait",
        tag: CommandTag::Wait,
        usage: "wait <n>ms|<n>s|<n>us",
        summary: "advance simulated time",
    },
    CommandSpec {
        name: "notify",
        tag: CommandTag::Notify,
        usage: "notify on|off",
        summary: "subscribe: sample continuously and report each average",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: "help [<command>]",
        summary: "list commands or describe one",
    },
];

/// Looks up a command by name, ignoring case.
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Parsed console command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Init,
    Start,
    Stop,
    Average,
    Status,
    Log,
    Pulse { count: u16, raw: u16 },
    Wait(Duration),
    Notify(bool),
    Help(Option<&'static CommandSpec>),
    /// Help was requested for a word that is not a command.
    HelpUnknown(&'a str),
}

/// Reasons a console line was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleError<'a> {
    Empty,
    UnknownCommand(&'a str),
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    InvalidArgument {
        command: &'static str,
        found: &'a str,
    },
    OutOfRange {
        command: &'static str,
        found: &'a str,
        min: u32,
        max: u32,
    },
    UnexpectedInput(&'a str),
}

impl fmt::Display for ConsoleError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::UnknownCommand(word) => write!(f, "unknown command `{word}`"),
            ConsoleError::MissingArgument { command, expected } => {
                write!(f, "{command}: expected {expected}")
            }
            ConsoleError::InvalidArgument { command, found } => {
                write!(f, "{command}: invalid argument `{found}`")
            }
            ConsoleError::OutOfRange {
                command,
                found,
                min,
                max,
            } => write!(f, "{command}: `{found}` out of range ({min}..={max})"),
            ConsoleError::UnexpectedInput(rest) => write!(f, "unexpected input `{rest}`"),
        }
    }
}

type Error = ErrMode<ContextError>;

/// Parses one console line.
///
/// # Errors
///
/// Returns a [`ConsoleError`] naming the offending word.
pub fn parse(line: &str) -> Result<ConsoleCommand<'_>, ConsoleError<'_>> {
    let mut input = line.trim();
    let word = next_word(&mut input).ok_or(ConsoleError::Empty)?;
    let entry = find(word).ok_or(ConsoleError::UnknownCommand(word))?;

    let command = match entry.tag {
        CommandTag::Init => ConsoleCommand::Init,
        CommandTag::Start => ConsoleCommand::Start,
        CommandTag::Stop => ConsoleCommand::Stop,
        CommandTag::Average => ConsoleCommand::Average,
        CommandTag::Status => ConsoleCommand::Status,
        CommandTag::Log => ConsoleCommand::Log,
        CommandTag::Pulse => parse_pulse(entry, &mut input)?,
        CommandTag::Wait => parse_wait(entry, &mut input)?,
        CommandTag::Notify => parse_notify(entry, &mut input)?,
        CommandTag::Help => match next_word(&mut input) {
            None => ConsoleCommand::Help(None),
            Some(topic) => find(topic).map_or(ConsoleCommand::HelpUnknown(topic), |entry| {
                ConsoleCommand::Help(Some(entry))
            }),
        },
    };

    match input.trim_start() {
        "" => Ok(command),
        rest => Err(ConsoleError::UnexpectedInput(rest)),
    }
}

fn next_word<'a>(input: &mut &'a str) -> Option<&'a str> {
    let word: Result<Option<&'a str>, Error> =
        opt(preceded(multispace0, take_till(1.., char::is_whitespace))).parse_next(input);
    word.ok().flatten()
}

/// Runs `parser` over a whole word, failing if anything is left over.
fn whole<'a, O>(word: &'a str, mut parser: impl Parser<&'a str, O, Error>) -> Option<O> {
    parser.parse(word).ok()
}

fn number(word: &str) -> Option<u64> {
    whole(word, digit1.parse_to::<u64>())
}

fn parse_pulse<'a>(
    entry: &'static CommandSpec,
    input: &mut &'a str,
) -> Result<ConsoleCommand<'a>, ConsoleError<'a>> {
    let mut count = 1;
    let mut raw = DEFAULT_PULSE_RAW;
    let mut word = next_word(input);

    if let Some(found) = word
        && let Some(value) = number(found)
    {
        count = u16::try_from(value)
            .ok()
            .filter(|count| (1..=MAX_PULSE_COUNT).contains(count))
            .ok_or(ConsoleError::OutOfRange {
                command: entry.name,
                found,
                min: 1,
                max: u32::from(MAX_PULSE_COUNT),
            })?;
        word = next_word(input);
    }

    if let Some(found) = word {
        let value = whole(
            found,
            preceded(literal(Caseless("raw=")), digit1.parse_to::<u64>()),
        )
        .ok_or(ConsoleError::InvalidArgument {
            command: entry.name,
            found,
        })?;
        raw = u16::try_from(value).map_err(|_| ConsoleError::OutOfRange {
            command: entry.name,
            found,
            min: 0,
            max: u32::from(u16::MAX),
        })?;
    }

    Ok(ConsoleCommand::Pulse { count, raw })
}

#[derive(Clone, Copy)]
enum Unit {
    Micros,
    Millis,
    Secs,
}

fn parse_wait<'a>(
    entry: &'static CommandSpec,
    input: &mut &'a str,
) -> Result<ConsoleCommand<'a>, ConsoleError<'a>> {
    let found = next_word(input).ok_or(ConsoleError::MissingArgument {
        command: entry.name,
        expected: "duration",
    })?;

    let (value, unit) = whole(
        found,
        (
            digit1.parse_to::<u64>(),
            alt((
                literal(Caseless("ms")).value(Unit::Millis),
                literal(Caseless("us")).value(Unit::Micros),
                literal(Caseless("s")).value(Unit::Secs),
            )),
        ),
    )
    .ok_or(ConsoleError::InvalidArgument {
        command: entry.name,
        found,
    })?;

    let duration = match unit {
        Unit::Micros => Duration::from_micros(value),
        Unit::Millis => Duration::from_millis(value),
        Unit::Secs => Duration::from_secs(value),
    };
    Ok(ConsoleCommand::Wait(duration))
}

fn parse_notify<'a>(
    entry: &'static CommandSpec,
    input: &mut &'a str,
) -> Result<ConsoleCommand<'a>, ConsoleError<'a>> {
    let found = next_word(input).ok_or(ConsoleError::MissingArgument {
        command: entry.name,
        expected: "on|off",
    })?;

    whole(
        found,
        alt((
            literal(Caseless("on")).value(true),
            literal(Caseless("off")).value(false),
        )),
    )
    .map(ConsoleCommand::Notify)
    .ok_or(ConsoleError::InvalidArgument {
        command: entry.name,
        found,
    })
}
