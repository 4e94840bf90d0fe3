use super::{HEADER_MARKER, LOG_FORMAT};
use crate::error::{GtallyError, Result};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Cap on the diagnostic output kept from a subprocess. The rest is still read.
pub const MAX_STDERR_BYTES: usize = 50_000;
const STDERR_IN_MESSAGE: usize = 500;

/// One commit as streamed by `git log`: the header line and its numstat lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    pub header: String,
    pub stats: Vec<String>,
}

/// Splits a `git log --numstat` stream into [`RawCommit`] blocks.
pub struct RawBlocks<R> {
    reader: R,
    pending: Option<String>,
    buf: Vec<u8>,
}

impl<R: BufRead> RawBlocks<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: None,
            buf: Vec::new(),
        }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> Iterator for RawBlocks<R> {
    type Item = io::Result<RawCommit>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = match self.pending.take() {
            Some(header) => header,
            None => loop {
                match self.read_line() {
                    Ok(Some(line)) if line.is_empty() => continue,
                    Ok(Some(line)) => break line,
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e)),
                }
            },
        };

        let mut stats = Vec::new();
        loop {
            match self.read_line() {
                Ok(Some(line)) if line.starts_with(HEADER_MARKER) => {
                    self.pending = Some(line);
                    break;
                }
                Ok(Some(line)) => {
                    if !line.is_empty() {
                        stats.push(line);
                    }
                }
                Ok(None) => break,
                Err(e) => return Some(Err(e)),
            }
        }

        Some(Ok(RawCommit { header, stats }))
    }
}

/// A running subprocess whose stdout is consumed lazily as commit blocks while
/// a second thread keeps draining stderr, so neither pipe can fill up and stall
/// the child.
pub struct HistoryStream {
    repo: PathBuf,
    child: Child,
    blocks: Option<RawBlocks<BufReader<ChildStdout>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl HistoryStream {
    pub fn spawn(repo: &Path, mut command: Command) -> Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| GtallyError::extraction(repo, format!("failed to start git log: {e}")))?;

        let stderr = child.stderr.take().map(|pipe| thread::spawn(move || drain_capped(pipe)));
        let blocks = child.stdout.take().map(|out| RawBlocks::new(BufReader::new(out)));

        Ok(Self {
            repo: repo.to_path_buf(),
            child,
            blocks,
            stderr,
        })
    }

    /// Drains whatever stdout is left, waits for the child and joins the stderr
    /// reader. Only then is the exit status looked at.
    pub fn finish(mut self) -> Result<()> {
        if let Some(blocks) = self.blocks.take() {
            let mut rest = blocks.into_inner();
            io::copy(&mut rest, &mut io::sink())
                .map_err(|e| GtallyError::extraction(&self.repo, format!("reading git output: {e}")))?;
        }

        let status = self
            .child
            .wait()
            .map_err(|e| GtallyError::extraction(&self.repo, format!("waiting for git: {e}")))?;

        let stderr = match self.stderr.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => Vec::new(),
        };

        if status.success() {
            return Ok(());
        }

        let text = String::from_utf8_lossy(&stderr);
        let text: String = text.trim().chars().take(STDERR_IN_MESSAGE).collect();
        Err(GtallyError::extraction(
            &self.repo,
            format!("git log exited with {status}: {text}"),
        ))
    }
}

impl Iterator for HistoryStream {
    type Item = io::Result<RawCommit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocks.as_mut()?.next()
    }
}

impl Drop for HistoryStream {
    fn drop(&mut self) {
        // Abandoned before `finish`: make sure the child does not linger.
        if self.blocks.is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn drain_capped(mut pipe: impl Read) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = MAX_STDERR_BYTES.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    kept
}

/// Builds the `git log` invocation that streams every reachable commit with
/// per-file numeric diff stats.
#[derive(Debug, Clone)]
pub struct HistoryExtractor {
    program: String,
}

impl Default for HistoryExtractor {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl HistoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command(&self, repo: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .current_dir(repo)
            .args(["-c", "core.quotepath=off", "log", "--all", "--no-color", "--no-ext-diff", "-M"])
            .arg(format!("--pretty=format:{LOG_FORMAT}"))
            .arg("--numstat");
        command
    }

    /// Starts streaming the full history of `repo`. Period filtering happens on
    /// authored time after parsing, because git's own date limits use commit time.
    pub fn stream(&self, repo: &Path) -> Result<HistoryStream> {
        debug!(repo = %repo.display(), "starting git log");
        HistoryStream::spawn(repo, self.command(repo))
    }
}
