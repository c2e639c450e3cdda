//! Test doubles shared across unit tests.

use std::collections::HashMap;

use parking_lot::Mutex;

use forge_core::error::{ForgeError, Result};

use crate::exec::{CommandRunner, RunOptions};

type Script = (usize, Vec<std::result::Result<String, String>>);

/// A [`CommandRunner`] that replays scripted responses keyed by the
/// exact command line. Unscripted commands fail the way a real runner
/// would, using the caller's failure context.
#[derive(Default)]
pub(crate) struct FakeRunner {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses for a command line. The last response repeats
    /// once the queue is exhausted.
    pub fn script(&self, cmd: &str, responses: Vec<std::result::Result<&str, &str>>) {
        let responses = responses
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        self.scripts.lock().insert(cmd.to_string(), (0, responses));
    }

    /// Always answer `cmd` with `output`.
    pub fn ok(&self, cmd: &str, output: &str) {
        self.script(cmd, vec![Ok(output)]);
    }

    pub fn call_count(&self, cmd: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == cmd).count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, cmd: &[String], opts: &RunOptions) -> Result<String> {
        let joined = cmd.join(" ");
        self.calls.lock().push(joined.clone());

        let mut scripts = self.scripts.lock();
        let Some((index, responses)) = scripts.get_mut(&joined) else {
            return Err(ForgeError::Command(
                opts.failure_context
                    .clone()
                    .unwrap_or_else(|| format!("no scripted response for: {}", joined)),
            ));
        };
        let i = (*index).min(responses.len() - 1);
        *index += 1;
        match &responses[i] {
            Ok(output) => Ok(output.clone()),
            Err(detail) => Err(ForgeError::Command(
                opts.failure_context.clone().unwrap_or_else(|| detail.clone()),
            )),
        }
    }
}
