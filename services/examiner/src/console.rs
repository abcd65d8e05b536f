//! A text console standing in for the audio transport.

use anyhow::Result;
use async_trait::async_trait;
use examiner_core::voice::{END_OF_INPUT, VoiceChannel};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout,
};
use tokio::sync::Mutex;

/// A [`VoiceChannel`] that reads utterances line by line and prints replies.
pub struct ConsoleChannel<R, W> {
    input: Mutex<Lines<R>>,
    output: Mutex<W>,
}

impl ConsoleChannel<BufReader<Stdin>, Stdout> {
    /// A channel on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input.lines()),
            output: Mutex::new(output),
        }
    }

    pub fn into_output(self) -> W {
        self.output.into_inner()
    }
}

#[async_trait]
impl<R, W> VoiceChannel for ConsoleChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn speak(&self, text: &str, _allow_interruptions: bool) -> Result<()> {
        let mut output = self.output.lock().await;
        output
            .write_all(format!("Examiner: {}\n", text).as_bytes())
            .await?;
        output.flush().await?;
        Ok(())
    }

    async fn listen(&self) -> Result<String> {
        let mut input = self.input.lock().await;
        while let Some(line) = input.next_line().await? {
            let line = line.trim();
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
        Ok(END_OF_INPUT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listen_skips_blank_lines_and_ends_with_exit() {
        let channel = ConsoleChannel::new(&b"\n  hello there \n\n\nend test\n"[..], Vec::new());

        assert_eq!(channel.listen().await.unwrap(), "hello there");
        assert_eq!(channel.listen().await.unwrap(), "end test");
        assert_eq!(channel.listen().await.unwrap(), END_OF_INPUT);
        assert_eq!(channel.listen().await.unwrap(), END_OF_INPUT);
    }

    #[tokio::test]
    async fn test_speak_writes_prefixed_lines() {
        let channel = ConsoleChannel::new(&b""[..], Vec::new());
        channel.speak("Hello.", true).await.unwrap();
        channel.speak("Goodbye.", false).await.unwrap();

        let written = String::from_utf8(channel.into_output()).unwrap();
        assert_eq!(written, "Examiner: Hello.\nExaminer: Goodbye.\n");
    }
}
