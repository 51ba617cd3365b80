//! In-memory fakes for the command seam (testing only)
//!
//! `ScriptedExecutor` satisfies [`CommandExecutor`] without spawning anything:
//! every invocation is recorded and answered by a caller-supplied responder.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::process::{CommandExecutor, CommandOutput, Invocation};

type Responder = Box<dyn Fn(&Invocation) -> CommandOutput + Send + Sync>;

/// Records invocations and answers them from a closure.
pub struct ScriptedExecutor {
    responder: Responder,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Invocation) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command exits 0 with empty output.
    pub fn succeeding() -> Self {
        Self::new(|_| CommandOutput::default())
    }

    /// Snapshot of the invocations seen so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations of `program` only.
    pub fn invocations_of(&self, program: &str) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|i| i.program == program)
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.responder)(invocation))
    }
}

/// Exit code helper for responders.
pub fn exit(code: i32) -> CommandOutput {
    CommandOutput {
        exit_code: code,
        ..CommandOutput::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn records_invocations_in_order() {
        let executor = ScriptedExecutor::new(|inv| {
            if inv.program == "false" {
                exit(1)
            } else {
                exit(0)
            }
        });

        for program in ["make", "false", "make"] {
            let invocation = Invocation {
                program: program.to_string(),
                args: vec![],
                cwd: PathBuf::from("."),
                env: vec![],
            };
            let out = executor.execute(&invocation).await.unwrap();
            assert_eq!(out.success(), program != "false");
        }

        assert_eq!(executor.invocations().len(), 3);
        assert_eq!(executor.invocations_of("make").len(), 2);
    }
}
