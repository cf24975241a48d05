//! Git repository access
//!
//! All queries go through a [`CommandRunner`] so tests can substitute a fake
//! for the real `git` binary. Detection queries never fail: anything that
//! goes wrong simply means "not a repository".

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Suffix of a path component that marks a bare repository directory
pub const REPOSITORY_SUFFIX: &str = ".git";

/// Revision read when a repository source does not name one
pub const DEFAULT_REVISION: &str = "main";

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Check if the command exited with status zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout as trimmed text
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    /// Stderr as lossy text
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Capability to execute an external program
///
/// Each call runs in its own working directory with its own captured
/// output streams.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` inside `cwd` and wait for it to exit
    async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> std::io::Result<CommandOutput>;
}

/// Runs commands as child processes via `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> std::io::Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Options for repository access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Program invoked for git queries
    pub git_program: String,
    /// Revision read when none is given
    pub default_revision: String,
    /// Classify paths inside repositories; when false every path is a plain file
    pub detect: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            git_program: "git".into(),
            default_revision: DEFAULT_REVISION.into(),
            detect: true,
        }
    }
}

/// Git queries used by source classification and revision reads
#[derive(Clone)]
pub struct Repository {
    runner: Arc<dyn CommandRunner>,
    options: RepositoryOptions,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new(Arc::new(ProcessRunner), RepositoryOptions::default())
    }
}

impl Repository {
    /// Create repository access over the given runner
    pub fn new(runner: Arc<dyn CommandRunner>, options: RepositoryOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    /// Check if `path` is a bare repository
    ///
    /// Any failure (not a directory, not a repository, git missing) is `false`.
    pub async fn is_bare(&self, path: &Path) -> bool {
        if !self.options.detect {
            return false;
        }
        match self.git(&["rev-parse", "--is-bare-repository"], path).await {
            Ok(output) if output.success() => output.stdout_text() == "true",
            Ok(_) => false,
            Err(e) => {
                log::trace!("bare check failed for {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Top-level directory of the checked-out repository containing `path`
    ///
    /// The query runs from the nearest existing directory of `path`, so the
    /// file itself need not exist. Any failure is `None`.
    pub async fn root_of(&self, path: &Path) -> Option<PathBuf> {
        if !self.options.detect {
            return None;
        }
        let dir = nearest_existing_dir(path).await?;
        match self.git(&["rev-parse", "--show-toplevel"], &dir).await {
            Ok(output) if output.success() => {
                let top = output.stdout_text();
                if top.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(top))
                }
            }
            Ok(_) => None,
            Err(e) => {
                log::trace!("toplevel query failed for {}: {}", dir.display(), e);
                None
            }
        }
    }

    /// Read `file_path` as of `revision` (default revision when `None`)
    ///
    /// Fails with an I/O error carrying the command line, exit code and
    /// stderr when git cannot be run or exits non-zero.
    pub async fn read_at_revision(
        &self,
        root: &Path,
        file_path: &Path,
        revision: Option<&str>,
    ) -> Result<String> {
        let revision = revision.unwrap_or(&self.options.default_revision);
        let object = format!("{}:{}", revision, git_path(file_path));
        let args = ["show", object.as_str()];

        let output = self.git(&args, root).await.map_err(|e| {
            Error::command_spawn(self.command_line(&args), &e)
        })?;

        if !output.success() {
            return Err(Error::command_failed(
                self.command_line(&args),
                output.exit_code,
                output.stderr_text(),
            ));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            Error::invalid_document(
                format!("{}:{}", root.display(), object),
                format!("content is not valid UTF-8: {}", e),
            )
        })
    }

    async fn git(&self, args: &[&str], cwd: &Path) -> std::io::Result<CommandOutput> {
        log::trace!("running {} in {}", self.command_line(args), cwd.display());
        self.runner.run(&self.options.git_program, args, cwd).await
    }

    fn command_line(&self, args: &[&str]) -> String {
        let mut line = self.options.git_program.clone();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Check whether a failed git read means the path is absent at that revision
pub(crate) fn is_missing_path(stderr: &str) -> bool {
    stderr.contains("does not exist in") || stderr.contains("exists on disk, but not in")
}

/// Join path components with `/` as git object paths expect
fn git_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn nearest_existing_dir(path: &Path) -> Option<PathBuf> {
    for dir in path.ancestors() {
        if let Ok(metadata) = tokio::fs::metadata(dir).await {
            if metadata.is_dir() {
                return Some(dir.to_path_buf());
            }
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted stand-in for the git binary

    use super::*;
    use std::sync::Mutex;

    /// Answers git invocations from a list of (args prefix, cwd, output) rules
    ///
    /// Unmatched invocations fail as if git were not installed.
    #[derive(Default)]
    pub struct FakeRunner {
        rules: Vec<(Vec<String>, Option<PathBuf>, CommandOutput)>,
        pub calls: Mutex<Vec<(Vec<String>, PathBuf)>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond to `args` run in `cwd` (any cwd when `None`)
        pub fn on(mut self, args: &[&str], cwd: Option<&Path>, output: CommandOutput) -> Self {
            self.rules.push((
                args.iter().map(|s| s.to_string()).collect(),
                cwd.map(Path::to_path_buf),
                output,
            ));
            self
        }

        pub fn ok(stdout: &str) -> CommandOutput {
            CommandOutput {
                exit_code: Some(0),
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
            }
        }

        pub fn fail(code: i32, stderr: &str) -> CommandOutput {
            CommandOutput {
                exit_code: Some(code),
                stdout: Vec::new(),
                stderr: stderr.as_bytes().to_vec(),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(
            &self,
            _program: &str,
            args: &[&str],
            cwd: &Path,
        ) -> std::io::Result<CommandOutput> {
            let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            self.calls
                .lock()
                .unwrap()
                .push((args.clone(), cwd.to_path_buf()));

            self.rules
                .iter()
                .find(|(expected, dir, _)| {
                    *expected == args && dir.as_deref().is_none_or(|d| d == cwd)
                })
                .map(|(_, _, output)| output.clone())
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "git not found"))
        }
    }
}
