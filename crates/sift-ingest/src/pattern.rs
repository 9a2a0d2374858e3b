//! Gitignore-style inclusion patterns
//!
//! An inclusion spec is a list of lines, evaluated like a `.gitignore` but
//! with the verdict flipped: a matching pattern *includes* a file, a
//! matching `!pattern` excludes it again. For every candidate path all
//! patterns are tried and the last one that matches decides. A path that no
//! pattern matches is excluded.
//!
//! Supported syntax:
//!
//! - blank lines and lines starting with `#` are ignored; `\#` and `\!`
//!   escape a literal first character
//! - `*` and `?` never cross a `/`, `**` spans any number of segments,
//!   `[...]` is a character class
//! - a pattern without `/` is tried against every segment of the path
//!   (the basename at any depth, or any ancestor directory)
//! - a pattern with a `/` is anchored at the root; a leading `/` is optional
//! - a trailing `/` only matches directories
//! - a pattern that matches a directory matches everything beneath it

use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;

/// One parsed pattern line
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    negated: bool,
    dir_only: bool,
    matcher: GlobMatcher,
}

impl Pattern {
    /// Parse a single line. Returns `None` for blanks, comments, and globs
    /// that fail to compile.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']).trim_end();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let body = match body.strip_prefix('\\') {
            Some(rest) if rest.starts_with('#') || rest.starts_with('!') => rest,
            _ => body,
        };

        let (dir_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        if body.is_empty() {
            return None;
        }

        let glob = if body.contains('/') {
            body.trim_start_matches('/').to_string()
        } else {
            format!("**/{}", body)
        };

        match GlobBuilder::new(&glob)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
        {
            Ok(compiled) => Some(Self {
                source: line.to_string(),
                negated,
                dir_only,
                matcher: compiled.compile_matcher(),
            }),
            Err(e) => {
                warn!(pattern = line, error = %e, "ignoring invalid inclusion pattern");
                None
            },
        }
    }

    /// The line this pattern was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether this pattern matches `path` or one of its ancestor directories
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return false;
        }

        // Every ancestor prefix is a directory; the full path is whatever
        // the caller says it is.
        let ends = path
            .match_indices('/')
            .map(|(i, _)| (i, true))
            .chain(std::iter::once((path.len(), is_dir)));

        for (end, prefix_is_dir) in ends {
            if self.dir_only && !prefix_is_dir {
                continue;
            }
            if self.matcher.is_match(&path[..end]) {
                return true;
            }
        }

        false
    }
}

/// Ordered list of inclusion patterns
#[derive(Debug, Clone, Default)]
pub struct InclusionSpec {
    patterns: Vec<Pattern>,
}

impl InclusionSpec {
    /// Parse a multi-line inclusion spec
    pub fn parse(text: &str) -> Self {
        Self {
            patterns: text.lines().filter_map(Pattern::parse).collect(),
        }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Verdict for one file path: the last matching pattern wins
    pub fn is_included(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .rev()
            .find(|p| p.matches(path, false))
            .is_some_and(|p| !p.negated)
    }

    /// Keep the included paths, preserving input order
    pub fn filter<S: AsRef<str>>(&self, files: &[S]) -> Vec<String> {
        files
            .iter()
            .filter_map(|f| {
                let path: &str = f.as_ref();
                self.is_included(path).then(|| path.to_string())
            })
            .collect()
    }
}

/// Filter a flat file list with an inclusion spec given as text
pub fn filter_file_list<S: AsRef<str>>(files: &[S], include: &str) -> Vec<String> {
    InclusionSpec::parse(include).filter(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_go_module_filter() {
        let include = "!.git\ngo.*\ninternal/**/*.go\n!.*\n";
        let files = ["go.mod", "go.sum", "internal/x/y.go", ".gitignore", ".idea/x"];

        let filtered = filter_file_list(&files, include);

        assert_eq!(filtered, vec!["go.mod", "go.sum", "internal/x/y.go"]);
    }

    #[test]
    fn test_last_match_wins() {
        let files = ["notes.txt", "secret.txt"];

        assert_eq!(filter_file_list(&files, "*.txt\n!secret.txt"), vec!["notes.txt"]);
        assert_eq!(
            filter_file_list(&files, "!secret.txt\n*.txt"),
            vec!["notes.txt", "secret.txt"]
        );
    }

    #[test]
    fn test_nothing_included_by_default() {
        assert!(filter_file_list(&["a", "b/c"], "").is_empty());
        assert!(filter_file_list(&["a", "b/c"], "# only a comment\n\n").is_empty());
        assert!(filter_file_list(&["a"], "!a").is_empty());
    }

    #[test]
    fn test_directory_name_selects_contents() {
        let include = "api\ninternal/**/*.go\n!.*\n!**/*_test.go\n!**/tests";
        let files = [
            "api/v1alpha1/filter_types.go",
            "internal/controller/filter_controller.go",
            "internal/controller/filter_test.go",
            "internal/tests/resources/bundle.go",
            ".github/dependabot.yml",
            "cmd/main.go",
        ];

        let filtered = filter_file_list(&files, include);

        assert_eq!(
            filtered,
            vec![
                "api/v1alpha1/filter_types.go",
                "internal/controller/filter_controller.go",
            ]
        );
    }

    #[test]
    fn test_star_stays_within_segment() {
        let spec = InclusionSpec::parse("/*.go");
        assert!(spec.is_included("main.go"));
        assert!(!spec.is_included("cmd/main.go"));

        let spec = InclusionSpec::parse("*.go");
        assert!(spec.is_included("cmd/main.go"));
    }

    #[test]
    fn test_double_star_spans_zero_or_more_segments() {
        let spec = InclusionSpec::parse("internal/**/*.go");
        assert!(spec.is_included("internal/y.go"));
        assert!(spec.is_included("internal/a/b/c/y.go"));
        assert!(!spec.is_included("pkg/internal/y.go"));
    }

    #[test]
    fn test_trailing_slash_only_matches_directories() {
        let spec = InclusionSpec::parse("docs/");
        assert!(spec.is_included("docs/index.md"));
        assert!(spec.is_included("site/docs/index.md"));
        assert!(!spec.is_included("docs"));
    }

    #[test]
    fn test_escaped_comment_and_bang() {
        let spec = InclusionSpec::parse("\\#notes\n\\!important");
        assert_eq!(spec.len(), 2);
        assert!(spec.is_included("#notes"));
        assert!(spec.is_included("!important"));
    }

    #[test]
    fn test_crlf_and_trailing_spaces() {
        let spec = InclusionSpec::parse("go.mod  \r\n!*.sum\r\n");
        assert_eq!(spec.len(), 2);
        assert!(spec.is_included("go.mod"));
        assert!(!spec.is_included("go.sum"));
    }

    #[test]
    fn test_question_mark_and_class() {
        let spec = InclusionSpec::parse("file?.txt\n[ab].md");
        assert!(spec.is_included("file1.txt"));
        assert!(!spec.is_included("file10.txt"));
        assert!(spec.is_included("a.md"));
        assert!(!spec.is_included("c.md"));
    }

    #[test]
    fn test_filter_preserves_input_order() {
        let files = ["z.go", "a.go", "m.txt", "b.go"];
        assert_eq!(filter_file_list(&files, "*.go"), vec!["z.go", "a.go", "b.go"]);
    }
}
