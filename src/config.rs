//! Boot-time scheduler options.
//!
//! Options come from the kernel command line, e.g.
//! `-o mlfqs -time-slice=4 run alarm-multiple`. Parsing stops at the first
//! token that is not an option; everything after it belongs to the caller.

use alloc::string::{String, ToString};
use core::str::FromStr;

use crate::{OsError, Result};

/// Timer interrupts per second.
pub const TIMER_FREQ: i64 = 100;

/// Timer ticks given to each thread before it is preempted.
pub const TIME_SLICE: u32 = 4;

/// Maximum number of holders a single donation walks through.
pub const DONATION_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Use the multi-level feedback queue scheduler instead of explicit
    /// priorities.
    pub mlfqs: bool,
    pub time_slice: u32,
    pub timer_freq: i64,
    pub donation_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mlfqs: false,
            time_slice: TIME_SLICE,
            timer_freq: TIMER_FREQ,
            donation_depth: DONATION_DEPTH,
        }
    }
}

impl Options {
    pub fn mlfqs() -> Self {
        Self {
            mlfqs: true,
            ..Self::default()
        }
    }

    /// Parses the option prefix of a kernel command line.
    pub fn parse(cmdline: &str) -> Result<Self> {
        let mut options = Self::default();
        let mut tokens = cmdline.split_whitespace().peekable();

        while let Some(token) = tokens.next_if(|t| t.starts_with('-')) {
            let (name, value) = match token.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (token, None),
            };

            match (name, value) {
                ("-o", None) => match tokens.next() {
                    Some("mlfqs") => options.mlfqs = true,
                    Some(other) => return Err(OsError::UnknownOption(other.to_string())),
                    None => return Err(OsError::BadOption(name.to_string())),
                },
                ("-mlfqs", None) => options.mlfqs = true,
                ("-time-slice", Some(v)) => {
                    options.time_slice = number(name, v)?;
                    if options.time_slice == 0 {
                        return Err(OsError::BadOption(name.to_string()));
                    }
                }
                ("-timer-freq", Some(v)) => {
                    options.timer_freq = number(name, v)?;
                    // The tick rate must stay within what the interval timer
                    // can generate.
                    if !(19..=1000).contains(&options.timer_freq) {
                        return Err(OsError::BadOption(name.to_string()));
                    }
                }
                ("-donate-depth", Some(v)) => options.donation_depth = number(name, v)?,
                _ => return Err(OsError::UnknownOption(String::from(token))),
            }
        }

        Ok(options)
    }
}

fn number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| OsError::BadOption(name.to_string()))
}
