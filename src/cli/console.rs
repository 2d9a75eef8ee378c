//! Operator prompts on the terminal. Prompts go to stderr so stdout stays
//! machine-readable.

use std::io::Write;

use action_flow::Operator;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::debug;

pub struct ConsoleOperator<R> {
    input: Mutex<R>,
}

impl ConsoleOperator<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ConsoleOperator<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    /// One trimmed line; `None` at end of input.
    async fn read_line(&self, prompt: &str) -> Option<String> {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{prompt}");
        let _ = stderr.flush();

        let mut line = String::new();
        match self.input.lock().await.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(err) => {
                debug!(error = %err, "Operator input unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl<R> Operator for ConsoleOperator<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn alert(&self, message: &str) {
        let _ = self
            .read_line(&format!("\n{message}\n[press Enter to continue] "))
            .await;
    }

    async fn confirm(&self, message: &str) -> bool {
        self.read_line(&format!("\n{message} [y/N] "))
            .await
            .map(|answer| matches!(answer.to_lowercase().as_str(), "y" | "yes" | "כן"))
            .unwrap_or(false)
    }

    async fn prompt(&self, message: &str) -> Option<String> {
        self.read_line(&format!("\n{message}\n> "))
            .await
            .filter(|answer| !answer.is_empty())
    }
}
