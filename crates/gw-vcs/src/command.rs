// command.rs — Bounded invocation of the git executable.
//
// Output goes to anonymous temp files rather than pipes so a chatty child can
// never block on a full pipe while we poll for its exit.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, VcsError};

const MAX_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished git process.
#[derive(Debug)]
pub(crate) struct Output {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout without the trailing newline.
    pub fn line(&self) -> &str {
        self.stdout.trim_end_matches(['\n', '\r'])
    }
}

/// Builder for one `git -C <root> ...` invocation.
pub(crate) struct GitCommand {
    program: PathBuf,
    root: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(&'static str, OsString)>,
    input: Option<Vec<u8>>,
    timeout: Duration,
}

impl GitCommand {
    pub fn new(program: &Path, root: &Path, timeout: Duration) -> Self {
        Self {
            program: program.to_path_buf(),
            root: root.to_path_buf(),
            args: Vec::new(),
            envs: Vec::new(),
            input: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: &'static str, value: impl AsRef<OsStr>) -> Self {
        self.envs.push((key, value.as_ref().to_os_string()));
        self
    }

    /// Feed `data` to the child's stdin.
    pub fn input(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.input = Some(data.into());
        self
    }

    /// `git <subcommand>` for logs and errors.
    pub fn describe(&self) -> String {
        let mut args = self.args.iter().map(|a| a.to_string_lossy());
        while let Some(arg) = args.next() {
            if arg == "-c" {
                args.next();
            } else if !arg.starts_with('-') {
                return format!("git {}", arg);
            }
        }
        "git".to_string()
    }

    /// Run to completion. A non-zero exit is not an error here.
    pub fn run(self) -> Result<Output> {
        let description = self.describe();
        tracing::debug!(
            command = %description,
            root = %self.root.display(),
            args = ?self.args,
            "running git"
        );

        let mut stdout = capture_file()?;
        let mut stderr = capture_file()?;
        let stdin = match &self.input {
            Some(data) => Stdio::from(input_file(data)?),
            None => Stdio::null(),
        };

        let mut command = Command::new(&self.program);
        command
            .arg("-C")
            .arg(&self.root)
            .args(&self.args)
            // Inherited repository overrides would redirect us to another repo.
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_LITERAL_PATHSPECS", "1")
            .env("LC_ALL", "C")
            .stdin(stdin)
            .stdout(clone_file(&stdout)?)
            .stderr(clone_file(&stderr)?);
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| VcsError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let deadline = Instant::now() + self.timeout;
        let mut interval = Duration::from_millis(2);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        tracing::warn!(
                            command = %description,
                            timeout_secs = self.timeout.as_secs(),
                            "git killed after timeout"
                        );
                        return Err(VcsError::Timeout {
                            command: description,
                            timeout: self.timeout,
                        });
                    }
                    thread::sleep(interval);
                    interval = (interval * 2).min(MAX_POLL_INTERVAL);
                }
                Err(source) => {
                    let _ = child.kill();
                    return Err(VcsError::Io {
                        path: self.root.clone(),
                        source,
                    });
                }
            }
        };

        Ok(Output {
            code: status.code(),
            stdout: read_back(&mut stdout)?,
            stderr: read_back(&mut stderr)?,
        })
    }

    /// Run and turn a non-zero exit into [`VcsError::CommandFailed`].
    pub fn run_checked(self) -> Result<Output> {
        let description = self.describe();
        let output = self.run()?;
        if output.success() {
            Ok(output)
        } else {
            Err(failed(description, &output))
        }
    }
}

pub(crate) fn failed(command: String, output: &Output) -> VcsError {
    VcsError::CommandFailed {
        command,
        code: output.code,
        stderr: output.stderr.trim().to_string(),
    }
}

fn capture_file() -> Result<File> {
    tempfile::tempfile().map_err(|source| VcsError::Io {
        path: std::env::temp_dir(),
        source,
    })
}

fn input_file(data: &[u8]) -> Result<File> {
    let mut file = capture_file()?;
    file.write_all(data)
        .and_then(|_| file.seek(SeekFrom::Start(0)))
        .map_err(|source| VcsError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
    Ok(file)
}

fn clone_file(file: &File) -> Result<File> {
    file.try_clone().map_err(|source| VcsError::Io {
        path: std::env::temp_dir(),
        source,
    })
}

fn read_back(file: &mut File) -> Result<String> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut buf))
        .map_err(|source| VcsError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
