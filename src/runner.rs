// src/runner.rs

//! External command execution
//!
//! Every process the tool starts (`dpkg-query`, `apt`, `git`, `sudo`, ...)
//! goes through the [`CommandRunner`] trait. The real implementation is
//! [`SystemRunner`]; tests use `ScriptedRunner`, which answers from canned
//! output and records what was asked of it.

use crate::error::{Error, Result};
use std::borrow::Cow;
use std::process::{Command, Stdio};
#[cfg(any(test, feature = "test-utils"))]
use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io,
};
use tracing::debug;

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Describe a failure for error messages
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr_str();
        let stderr = stderr.trim();
        match (self.code, stderr.is_empty()) {
            (Some(code), true) => format!("exit status {}", code),
            (Some(code), false) => format!("exit status {}: {}", code, stderr),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {}", stderr),
        }
    }
}

/// Narrow interface over process execution: arguments in, output out
pub trait CommandRunner {
    /// Run a command to completion, capturing stdout and stderr
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command attached to the terminal and return its exit code
    ///
    /// Used for commands whose output is meant for the operator (the package
    /// manager). The default implementation captures instead.
    fn run_attached(&self, program: &str, args: &[&str]) -> Result<Option<i32>> {
        self.run(program, args).map(|output| output.code)
    }
}

/// Render a command line for logs and error messages
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs real processes with `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("Running: {}", command_line(program, args));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::CommandSpawn {
                command: command_line(program, args),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn run_attached(&self, program: &str, args: &[&str]) -> Result<Option<i32>> {
        debug!("Running (attached): {}", command_line(program, args));

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| Error::CommandSpawn {
                command: command_line(program, args),
                source,
            })?;

        Ok(status.code())
    }
}

/// Prefix used to run commands with elevated privileges
///
/// An empty prefix runs commands directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Elevation {
    prefix: Vec<String>,
}

impl Elevation {
    pub fn new(prefix: Vec<String>) -> Self {
        Self { prefix }
    }

    /// Run commands as-is
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Build the effective program and argument list
    pub fn wrap<'a>(&'a self, program: &'a str, args: &[&'a str]) -> (&'a str, Vec<&'a str>) {
        match self.prefix.split_first() {
            None => (program, args.to_vec()),
            Some((first, rest)) => {
                let mut full: Vec<&str> = rest.iter().map(String::as_str).collect();
                full.push(program);
                full.extend_from_slice(args);
                (first.as_str(), full)
            }
        }
    }
}

/// Test double that replays canned outputs keyed by command line
///
/// Responses registered for the same command line are returned in order;
/// the last one keeps being returned once the queue is down to it. Unknown
/// commands fail as if the program did not exist.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: RefCell<HashMap<String, VecDeque<CommandOutput>>>,
    calls: RefCell<Vec<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for `program args...`
    pub fn on(&self, program: &str, args: &[&str], output: CommandOutput) -> &Self {
        self.responses
            .borrow_mut()
            .entry(command_line(program, args))
            .or_default()
            .push_back(output);
        self
    }

    /// Command lines executed so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Whether a command line starting with `prefix` was executed
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|call| call.starts_with(prefix))
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let line = command_line(program, args);
        self.calls.borrow_mut().push(line.clone());

        let mut responses = self.responses.borrow_mut();
        let queue = responses.get_mut(&line).filter(|q| !q.is_empty());
        match queue {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap_or_else(|| CommandOutput::ok(""))),
            Some(queue) => Ok(queue[0].clone()),
            None => Err(Error::CommandSpawn {
                command: line,
                source: io::Error::new(io::ErrorKind::NotFound, "no scripted response"),
            }),
        }
    }
}
