//! Command definitions
//!
//! Parses frame payload text into a closed set of commands.
//!
//! ## Grammar
//! ```text
//! LIST
//! GET <filename>
//! UPLOAD <filename> <base64-payload>
//! ```
//!
//! Verbs are case-insensitive. `UPLOAD` is split into at most three
//! whitespace-delimited fields so the base64 payload is never tokenized;
//! every other verb goes through shell-style word splitting, so
//! `GET "my file.txt"` addresses a name containing a space.

use std::fmt;

use crate::error::CommandError;

/// Command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    List,
    Get,
    Upload,
}

impl Verb {
    /// Static verb table; anything outside it is rejected at parse time
    const TABLE: [(&'static str, Verb); 3] = [
        ("list", Verb::List),
        ("get", Verb::Get),
        ("upload", Verb::Upload),
    ];

    /// Look up a verb, ignoring ASCII case
    pub fn lookup(word: &str) -> Option<Verb> {
        Self::TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(word))
            .map(|&(_, verb)| verb)
    }

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::List => "list",
            Verb::Get => "get",
            Verb::Upload => "upload",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every file in the service directory
    List,

    /// Fetch one file
    Get { filename: String },

    /// Store a file; `data` is still base64 text
    Upload { filename: String, data: String },
}

impl Command {
    /// Parse the text of a request frame
    pub fn parse(text: &str) -> Result<Command, CommandError> {
        let trimmed = text.trim();
        let first = trimmed.split_whitespace().next();

        if first.is_some_and(|word| Verb::lookup(word) == Some(Verb::Upload)) {
            // Trailing whitespace is significant: it separates an empty payload
            return Self::parse_upload(text.trim_start());
        }

        let mut words = split_words(trimmed)?.into_iter();
        let verb_word = words.next().ok_or(CommandError::Empty)?;
        let verb = Verb::lookup(&verb_word)
            .ok_or_else(|| CommandError::UnknownCommand(verb_word.to_lowercase()))?;

        match verb {
            Verb::List => Ok(Command::List),
            Verb::Get => {
                let filename = words.next().ok_or(CommandError::MissingFilename)?;
                Ok(Command::Get { filename })
            }
            // Only reachable when the first raw word was quoted, e.g. `"upload" x y`
            Verb::Upload => {
                let filename = words.next().ok_or(CommandError::InvalidUploadFormat)?;
                let data = words.next().ok_or(CommandError::InvalidUploadFormat)?;
                Ok(Command::Upload { filename, data })
            }
        }
    }

    /// `UPLOAD <filename> <rest>`: the rest is one opaque field
    ///
    /// The separator after the filename is required, the payload is not:
    /// `UPLOAD e.bin ` carries an empty file, `UPLOAD e.bin` carries nothing.
    fn parse_upload(text: &str) -> Result<Command, CommandError> {
        let (_, rest) = split_field(text).ok_or(CommandError::InvalidUploadFormat)?;
        let (filename, data) = split_field(rest).ok_or(CommandError::InvalidUploadFormat)?;

        Ok(Command::Upload {
            filename: filename.to_string(),
            data: data.trim().to_string(),
        })
    }

    /// The verb of this command
    pub fn verb(&self) -> Verb {
        match self {
            Command::List => Verb::List,
            Command::Get { .. } => Verb::Get,
            Command::Upload { .. } => Verb::Upload,
        }
    }

    /// Render the command as request text
    pub fn to_wire(&self) -> String {
        match self {
            Command::List => "LIST".to_string(),
            Command::Get { filename } => format!("GET {}", quote_word(filename)),
            Command::Upload { filename, data } => format!("UPLOAD {filename} {data}"),
        }
    }
}

/// Split off the first whitespace-delimited field
fn split_field(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let (field, rest) = text.split_once(char::is_whitespace)?;
    Some((field, rest.trim_start()))
}

/// Quote a word only when the tokenizer would otherwise split or unescape it
fn quote_word(word: &str) -> String {
    let needs_quoting = word.is_empty()
        || word
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'));

    if !needs_quoting {
        return word.to_string();
    }

    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('"');
    for c in word.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

// =============================================================================
// Shell-style word splitting
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Split text into words the way a POSIX shell would, without expansion.
///
/// - whitespace separates words
/// - `'...'` is literal
/// - `"..."` is literal except `\"` and `\\`
/// - a backslash outside quotes escapes the next character
pub fn split_words(text: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    word.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\')) => word.push(next),
                    Some(next) => {
                        word.push('\\');
                        word.push(next);
                    }
                    None => return Err(processing("No closing quotation")),
                },
                _ => word.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_word = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_word = true;
                }
                '\\' => {
                    let next = chars
                        .next()
                        .ok_or_else(|| processing("No escaped character"))?;
                    word.push(next);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut word));
                        in_word = false;
                    }
                }
                _ => {
                    word.push(c);
                    in_word = true;
                }
            },
        }
    }

    if quote != Quote::None {
        return Err(processing("No closing quotation"));
    }
    if in_word {
        words.push(word);
    }

    Ok(words)
}

fn processing(message: &str) -> CommandError {
    CommandError::Processing(message.to_string())
}
