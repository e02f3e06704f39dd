//! Choosing which recording to fetch.

use std::{
    fmt::Display,
    io::{self, BufRead, Write},
};

use chrono::{DateTime, Local, TimeZone};

use crate::{
    error::{Error, Result},
    types::SignalDescriptor,
};

/// Picks one recording out of a non-empty listing.
pub trait SignalSelector {
    /// Index into `recordings`, or `None` when the user backs out.
    fn select(&self, recordings: &[SignalDescriptor]) -> Result<Option<usize>>;
}

/// Lists the recordings on stdout and reads an index from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSelector;

impl SignalSelector for ConsoleSelector {
    fn select(&self, recordings: &[SignalDescriptor]) -> Result<Option<usize>> {
        let mut out = io::stdout().lock();
        for (index, recording) in recordings.iter().enumerate() {
            writeln!(out, "{}", selection_line(index, recording, &Local))?;
        }
        write!(out, "Enter signal number: ")?;
        out.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        parse_selection(&answer, recordings.len())
    }
}

/// Always answers the same index; for scripts and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSelector(pub Option<usize>);

impl SignalSelector for FixedSelector {
    fn select(&self, recordings: &[SignalDescriptor]) -> Result<Option<usize>> {
        match self.0 {
            Some(index) if index >= recordings.len() => Err(Error::InvalidSelection(format!(
                "index {index} out of range (0..{})",
                recordings.len()
            ))),
            other => Ok(other),
        }
    }
}

/// `"{index} - dd/mm/YYYY HH:MM:SS"` in `tz`.
pub fn selection_line<Tz>(index: usize, recording: &SignalDescriptor, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match DateTime::from_timestamp(recording.timestamp, 0) {
        Some(at) => format!(
            "{index} - {}",
            at.with_timezone(tz).format("%d/%m/%Y %H:%M:%S")
        ),
        None => format!("{index} - @{}", recording.timestamp),
    }
}

/// Blank input cancels; anything else must be an index below `len`.
fn parse_selection(answer: &str, len: usize) -> Result<Option<usize>> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(None);
    }
    let index: usize = answer
        .parse()
        .map_err(|_| Error::InvalidSelection(format!("`{answer}` is not a number")))?;
    if index >= len {
        return Err(Error::InvalidSelection(format!(
            "index {index} out of range (0..{len})"
        )));
    }
    Ok(Some(index))
}
