use std::path::PathBuf;

use crate::span::Location;

/// A loaded MusicCoder source file.
///
/// Unlike the multi-file `SourceDb` this is modeled after, a MusicCoder
/// run only ever has one: the CLI's positional `<FILE>` argument. There
/// is no import/module system to resolve, so no database of sources is
/// needed.
#[derive(Clone, Debug)]
pub struct Source {
    pub path: PathBuf,
    pub name: String,
    pub content: String,
    line_starts: Vec<usize>,
}

impl Source {
    pub fn new(path: PathBuf, content: String) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<unknown>".to_string());

        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            path,
            name,
            content,
            line_starts,
        }
    }

    pub fn from_string(name: impl Into<String>, content: String) -> Self {
        let name = name.into();
        Self::new(PathBuf::from(&name), content)
    }

    /// Get line and column from a byte offset.
    pub fn location(&self, offset: usize) -> Location {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let column = offset.saturating_sub(line_start) + 1;
        Location::new(line + 1, column)
    }

    /// Get the content of a specific line (1-based).
    pub fn line(&self, line: usize) -> Option<&str> {
        if line == 0 || line > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.content.len());
        Some(self.content[start..end].trim_end_matches('\n'))
    }

    /// Get the number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
