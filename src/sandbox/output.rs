// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Output collection for a sandboxed child.
//!
//! stdout and stderr are drained by two independent tasks so a child that
//! fills one pipe never stalls on it. Chunks are merged in arrival order:
//! there is no ordering guarantee between the two streams.

use crate::core::constants::output::{CHANNEL_DEPTH, READ_CHUNK};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct OutputCollector {
    readers: [JoinHandle<()>; 2],
    merger: Option<JoinHandle<()>>,
    output: Arc<Mutex<Vec<u8>>>,
}

impl OutputCollector {
    /// Start draining both streams immediately.
    pub fn spawn<O, E>(stdout: O, stderr: E) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let output = Arc::new(Mutex::new(Vec::new()));
        Self {
            readers: [
                tokio::spawn(read_stream(stdout, tx.clone(), "stdout")),
                tokio::spawn(read_stream(stderr, tx, "stderr")),
            ],
            merger: Some(tokio::spawn(merge(rx, Arc::clone(&output)))),
            output,
        }
    }

    /// Wait until both streams reach EOF.
    ///
    /// Anything that still holds a write end (an escaped descendant) keeps
    /// this pending, so race it against the caller's interrupt. Cancel-safe.
    pub async fn wait(&mut self) {
        if let Some(merger) = self.merger.as_mut() {
            if let Err(e) = merger.await {
                warn!(error = %e, "Output merger task failed");
            }
            self.merger = None;
        }
    }

    /// Stop reading and return everything merged so far.
    pub fn into_output(self) -> Vec<u8> {
        for reader in &self.readers {
            reader.abort();
        }
        if let Some(merger) = &self.merger {
            merger.abort();
        }
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *output)
    }

    /// Wait for EOF on both streams and return the merged output.
    pub async fn finish(mut self) -> Vec<u8> {
        self.wait().await;
        self.into_output()
    }
}

async fn read_stream<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // A closed pipe is how Windows reports EOF on some handles
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => break,
            Err(e) => {
                debug!(stream, error = %e, "Pipe read failed");
                break;
            }
        }
    }
}

async fn merge(mut rx: mpsc::Receiver<Vec<u8>>, output: Arc<Mutex<Vec<u8>>>) {
    while let Some(chunk) = rx.recv().await {
        output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&chunk);
    }
}
