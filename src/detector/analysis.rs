//! File-pattern and keyword analysis
//!
//! Heuristics deciding whether a changed file signals task completion. All
//! matching is case-insensitive; file reads are best-effort and a read failure
//! counts as "no match".

use std::path::Path;

/// Whether the file name matches any configured pattern
///
/// Patterns containing `*` are wildcards over the file name; plain patterns
/// match as substrings.
pub(super) fn path_matches(patterns: &[String], path: &Path) -> bool {
    let Some(file_name) = path.file_name() else {
        return false;
    };
    let file_name = file_name.to_string_lossy().to_lowercase();
    patterns
        .iter()
        .any(|p| pattern_matches(&p.to_lowercase(), &file_name))
}

fn pattern_matches(pattern: &str, file_name: &str) -> bool {
    if pattern.contains('*') {
        wildcard_match(pattern, file_name)
    } else {
        file_name.contains(pattern)
    }
}

/// Wildcard match with `*` (any run of characters) over the whole text
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < text.len() {
        if pi < pattern.len() && pattern[pi] != '*' && pattern[pi] == text[ti] {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(star_pos) = star {
            pi = star_pos + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

/// Every configured keyword present in the content, lowercase
pub(super) fn matched_keywords(keywords: &[String], content: &str) -> Vec<String> {
    let haystack = content.to_lowercase();
    keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty() && haystack.contains(k.as_str()))
        .collect()
}

/// Read a file and report matched keywords; read failure is "no match"
pub(super) async fn scan_file(path: &Path, keywords: &[String]) -> Vec<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => matched_keywords(keywords, &content),
        Err(e) => {
            log::debug!(
                "Cannot read {} for completion analysis: {e}",
                path.display()
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn wildcard_patterns() {
        assert!(wildcard_match("*.log", "build.log"));
        assert!(wildcard_match("readme*", "readme.md"));
        assert!(wildcard_match("*test*", "integration_tests.rs"));
        assert!(!wildcard_match("*.log", "build.log.bak"));
        assert!(!wildcard_match("*.log", "log"));
    }

    #[test]
    fn plain_patterns_match_as_substrings() {
        let patterns = vec!["package.json".to_string()];
        assert!(path_matches(&patterns, &PathBuf::from("/work/package.json")));
        assert!(!path_matches(&patterns, &PathBuf::from("/work/package.lock")));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let patterns = vec!["readme*".to_string()];
        assert!(path_matches(&patterns, &PathBuf::from("/work/README.md")));

        let keywords = vec!["Build Successful".to_string()];
        assert_eq!(
            matched_keywords(&keywords, "... BUILD SUCCESSFUL in 2s ..."),
            vec!["build successful".to_string()]
        );
    }

    #[test]
    fn all_matching_keywords_are_reported() {
        let keywords: Vec<String> = ["completed", "done", "failed"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let matched = matched_keywords(&keywords, "task completed, all done");
        assert_eq!(matched, vec!["completed".to_string(), "done".to_string()]);
    }

    #[test]
    fn directoryless_paths_do_not_match() {
        let patterns = vec!["*.log".to_string()];
        assert!(!path_matches(&patterns, &PathBuf::from("/")));
    }

    #[tokio::test]
    async fn unreadable_file_is_no_match() {
        let keywords = vec!["done".to_string()];
        let matched = scan_file(Path::new("/nonexistent/taskwatch/file.log"), &keywords).await;
        assert!(matched.is_empty());
    }
}
