//! Interactive question-answering loop over an index.

use std::io::{BufRead, Write};

use tracing::{info, warn};

use crate::error::Result;
use crate::generator::GroundedGenerator;
use crate::retriever::Retriever;

/// Prompt printed before each question in [`Session::run`].
pub const PROMPT: &str = "You: ";

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// `quit` or `exit`, in any case.
    Exit,
    /// Blank line.
    Skip,
    /// A question, trimmed.
    Query(String),
}

impl SessionInput {
    /// Classify a raw input line.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Self::Skip
        } else if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            Self::Exit
        } else {
            Self::Query(trimmed.to_string())
        }
    }
}

/// Retrieve-then-generate over a single index.
#[derive(Debug)]
pub struct Session {
    retriever: Retriever,
    generator: GroundedGenerator,
}

impl Session {
    /// Create a session.
    pub fn new(retriever: Retriever, generator: GroundedGenerator) -> Self {
        Self { retriever, generator }
    }

    /// The retriever used for each question.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer one question: retrieve the top chunks, then generate.
    pub async fn answer(&self, query: &str) -> Result<String> {
        let chunks = self.retriever.retrieve(query).await?;
        self.generator.generate(query, &chunks).await
    }

    /// Drive the loop over any line source until an exit keyword or EOF.
    ///
    /// Per-question failures are printed as `An error occurred: ...` and the
    /// loop continues. Only I/O errors on `reader` or `writer` end it early.
    pub async fn run<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> Result<()> {
        let mut line = String::new();
        loop {
            write!(writer, "\n{PROMPT}")?;
            writer.flush()?;

            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }

            match SessionInput::parse(&line) {
                SessionInput::Exit => break,
                SessionInput::Skip => continue,
                SessionInput::Query(query) => match self.answer(&query).await {
                    Ok(response) => writeln!(writer, "\nAssistant: {response}")?,
                    Err(e) => {
                        warn!(error = %e, "question failed");
                        writeln!(writer, "An error occurred: {e}")?;
                    }
                },
            }
        }
        info!("session ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exit_keywords_case_insensitively() {
        assert_eq!(SessionInput::parse("quit\n"), SessionInput::Exit);
        assert_eq!(SessionInput::parse("  EXIT "), SessionInput::Exit);
        assert_eq!(SessionInput::parse("Quit"), SessionInput::Exit);
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(SessionInput::parse(""), SessionInput::Skip);
        assert_eq!(SessionInput::parse("   \n"), SessionInput::Skip);
    }

    #[test]
    fn other_input_is_a_trimmed_query() {
        assert_eq!(
            SessionInput::parse("  what is quitting?  \n"),
            SessionInput::Query("what is quitting?".to_string())
        );
    }
}
