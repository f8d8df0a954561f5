//! Line-Delimited Streaming
//!
//! Compiles a stream of text chunks where every non-blank line is one
//! document. Chunks may split lines anywhere; a trailing line without a
//! terminator is still compiled. The first error ends the stream.

use std::collections::VecDeque;
use std::io;

use futures::stream::{self, Stream, StreamExt};
use log::{debug, warn};

use super::read_documents;
use crate::compiler::Compiler;
use crate::error::{CompileError, Result};
use crate::machine::Branch;
use crate::notation::{parse_line, LineSplitter};

struct StreamState<'a, S> {
    compiler: &'a mut Compiler,
    chunks: S,
    splitter: LineSplitter,
    lines: VecDeque<String>,
    line_number: usize,
    exhausted: bool,
    failed: bool,
}

impl<'a, S> StreamState<'a, S>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    /// Produces the next compiled branch, or `None` once input is consumed.
    async fn next_branch(&mut self) -> Option<Result<Branch>> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                self.line_number += 1;
                if line.trim().is_empty() {
                    continue;
                }
                match self.compile_line(&line).await {
                    Ok(Some(branch)) => return Some(Ok(branch)),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Line {} failed to compile: {}", self.line_number, e);
                        return Some(Err(e));
                    }
                }
            }

            if self.exhausted {
                return None;
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => {
                    let lines = self.splitter.push(&chunk);
                    self.lines.extend(lines);
                }
                Some(Err(e)) => return Some(Err(CompileError::Io(e))),
                None => {
                    self.exhausted = true;
                    if let Some(rest) = std::mem::take(&mut self.splitter).finish() {
                        self.lines.push_back(rest);
                    }
                }
            }
        }
    }

    async fn compile_line(&mut self, line: &str) -> Result<Option<Branch>> {
        let node = parse_line(line)?;
        if node.is_null() {
            debug!("Skipping empty document on line {}", self.line_number);
            return Ok(None);
        }
        read_documents(self.compiler, vec![node]).await.map(Some)
    }
}

/// Compiles each line of `chunks` into a branch.
///
/// All lines share `compiler`, so generated names stay unique across the
/// whole stream.
pub fn read_stream<'a, S>(
    compiler: &'a mut Compiler,
    chunks: S,
) -> impl Stream<Item = Result<Branch>> + 'a
where
    S: Stream<Item = io::Result<String>> + Unpin + Send + 'a,
{
    let state = StreamState {
        compiler,
        chunks,
        splitter: LineSplitter::new(),
        lines: VecDeque::new(),
        line_number: 0,
        exhausted: false,
        failed: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }
        let item = state.next_branch().await?;
        state.failed = item.is_err();
        Some((item, state))
    })
}

/// Like [`read_stream`], but yields each branch as compact JSON followed by
/// a newline.
pub fn read_to_stream<'a, S>(
    compiler: &'a mut Compiler,
    chunks: S,
) -> impl Stream<Item = Result<String>> + 'a
where
    S: Stream<Item = io::Result<String>> + Unpin + Send + 'a,
{
    read_stream(compiler, chunks).map(|item| {
        let branch = item?;
        let mut line = serde_json::to_string(&branch)?;
        line.push('\n');
        Ok(line)
    })
}
