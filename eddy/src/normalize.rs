use std::path::PathBuf;

use clap::Args;
use snafu::{ResultExt, ensure};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::error::{IoSnafu, JsonSerializeSnafu, RejectedSnafu, Result};

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// File with one JSON message per line, `-` for stdin.
    #[arg(default_value = "-")]
    input: PathBuf,
    /// Exit with an error if any message was rejected.
    #[arg(long)]
    strict: bool,
}

impl NormalizeArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let path = self.input.display().to_string();
        let input: Box<dyn AsyncRead + Unpin + Send> = if path == "-" {
            Box::new(tokio::io::stdin())
        } else {
            let file = tokio::fs::File::open(&self.input)
                .await
                .context(IoSnafu { path: path.clone() })?;
            Box::new(file)
        };

        let mut lines = BufReader::new(input).lines();
        let mut stdout = tokio::io::stdout();
        let mut total = 0;
        let mut rejected = 0;
        let mut line_number = 0;

        loop {
            let line = tokio::select! {
                _ = ct.cancelled() => break,
                line = lines.next_line() => line.context(IoSnafu { path: path.clone() })?,
            };

            let Some(line) = line else {
                break;
            };
            line_number += 1;

            if line.trim().is_empty() {
                continue;
            }
            total += 1;

            match eddy_events::normalize(line.as_bytes()) {
                Ok(event) => {
                    let mut json = serde_json::to_vec(&event).context(JsonSerializeSnafu {})?;
                    json.push(b'\n');
                    stdout
                        .write_all(&json)
                        .await
                        .context(IoSnafu { path: "stdout" })?;
                }
                Err(err) => {
                    rejected += 1;
                    eprintln!("line {line_number}: rejected: {err}");
                }
            }
        }

        stdout.flush().await.context(IoSnafu { path: "stdout" })?;
        eprintln!("{} normalized, {} rejected", total - rejected, rejected);

        ensure!(!self.strict || rejected == 0, RejectedSnafu { rejected, total });
        Ok(())
    }
}
