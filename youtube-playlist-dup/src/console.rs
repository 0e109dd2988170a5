//! Line-oriented prompts.

use std::io::{BufRead, Write};

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("console I/O failed")]
    Io(#[source] std::io::Error),
    #[error("no input")]
    NoInput,
    #[error("the playlist name cannot be empty")]
    EmptyName,
}

/// Asks for the title of the playlist to create.
///
/// Surrounding whitespace (including the line terminator) is removed; an empty name is an
/// error rather than a reason to ask again.
pub fn prompt_playlist_name(
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<String, PromptError> {
    write!(out, "Name for the new playlist: ").map_err(PromptError::Io)?;
    out.flush().map_err(PromptError::Io)?;

    let mut line = String::new();
    if input.read_line(&mut line).map_err(PromptError::Io)? == 0 {
        return Err(PromptError::NoInput);
    }
    let name = line.trim();
    if name.is_empty() {
        return Err(PromptError::EmptyName);
    }
    Ok(name.to_string())
}
