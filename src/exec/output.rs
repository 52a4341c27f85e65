// src/exec/output.rs

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which pipe a chunk was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamName::Stdout => f.write_str("stdout"),
            StreamName::Stderr => f.write_str("stderr"),
        }
    }
}

/// Options for [`OutputChunk::decode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Remove ANSI escape sequences (colors, cursor movement, OSC links).
    pub strip_ansi: bool,
}

/// One buffered read from a child's stdout or stderr.
///
/// Chunk boundaries are whatever the OS handed us; a chunk may hold several
/// lines or part of one.
#[derive(Clone, PartialEq, Eq)]
pub struct OutputChunk {
    stream: StreamName,
    raw: Vec<u8>,
}

impl OutputChunk {
    pub fn new(stream: StreamName, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            stream,
            raw: raw.into(),
        }
    }

    pub fn stream(&self) -> StreamName {
        self.stream
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    /// Lossy UTF-8 decode.
    pub fn decode(&self, opts: DecodeOptions) -> String {
        let text = String::from_utf8_lossy(&self.raw);
        if opts.strip_ansi {
            strip_ansi(&text).into_owned()
        } else {
            text.into_owned()
        }
    }

    /// Decoded text with ANSI escape sequences removed.
    pub fn sanitized_text(&self) -> String {
        self.decode(DecodeOptions { strip_ansi: true })
    }
}

impl fmt::Debug for OutputChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputChunk")
            .field("stream", &self.stream)
            .field("text", &String::from_utf8_lossy(&self.raw))
            .finish()
    }
}

// CSI sequences, OSC sequences (BEL or ST terminated) and two-byte escapes.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("ANSI escape pattern is valid")
});

/// Remove ANSI escape sequences from `text`.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }
    ANSI_ESCAPE.replace_all(text, "")
}
