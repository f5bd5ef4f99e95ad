//! External tool execution.
//!
//! Everything leaves this process as an argv vector; user input lands in
//! single argv elements and never passes through a local shell.

use tokio::process::Command;
use tracing::debug;

use crate::validate::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("nothing to execute")]
    EmptyCommand,

    #[error("failed to start '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' exited with status {code}")]
    Exit { tool: String, code: i32 },

    #[error("'{tool}' was terminated by a signal")]
    Interrupted { tool: String },

    #[error("local path {0:?} does not exist")]
    MissingLocal(std::path::PathBuf),
}

/// Runs an argv vector in the foreground, stdio inherited, and waits for
/// the tool to finish. Non-zero exit becomes [`ExecError::Exit`].
pub async fn run_interactive(argv: &[String]) -> Result<(), ExecError> {
    let (tool, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
    debug!("running {:?}", argv);

    let status = Command::new(tool)
        .args(args)
        .status()
        .await
        .map_err(|source| ExecError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(ExecError::Exit {
            tool: tool.clone(),
            code,
        }),
        None => Err(ExecError::Interrupted { tool: tool.clone() }),
    }
}

/// Starts a GUI tool and returns immediately; the child outlives us.
pub fn spawn_detached(argv: &[String]) -> Result<(), ExecError> {
    let (tool, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
    debug!("spawning {:?}", argv);

    Command::new(tool)
        .args(args)
        .spawn()
        .map(drop)
        .map_err(|source| ExecError::Spawn {
            tool: tool.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        assert!(matches!(
            run_interactive(&[]).await,
            Err(ExecError::EmptyCommand)
        ));
    }

    #[tokio::test]
    async fn missing_tool_surfaces_as_spawn_error() {
        let err = run_interactive(&argv(&["hostlink-no-such-tool"]))
            .await
            .unwrap_err();
        match err {
            ExecError::Spawn { tool, .. } => assert_eq!(tool, "hostlink-no-such-tool"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_is_ok() {
        run_interactive(&argv(&["true"])).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_the_code() {
        let err = run_interactive(&argv(&["false"])).await.unwrap_err();
        match err {
            ExecError::Exit { tool, code } => {
                assert_eq!(tool, "false");
                assert_eq!(code, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
