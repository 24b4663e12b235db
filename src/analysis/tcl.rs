// Line interpreter for TCL modulefiles
//
// Only three directives matter for finding commands:
//   set <key> <value>
//   prepend-path PATH <value>
//   append-path PATH <value>
// Everything else is ignored, as are lines that fail to expand.

use crate::analysis::bins::scan_path_value;
use globset::Glob;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Interpret `source` line by line and collect bins from its PATH edits.
///
/// `set` writes to the process environment so later lines can refer to the
/// variable. That is the only environment mutation analysis performs.
pub fn analyze_source(source: &str, bins: &mut Vec<String>) {
    for line in source.lines() {
        let mut tokens = line.split_whitespace();

        let Some(cmd) = tokens.next() else { continue };

        if cmd.starts_with('#') {
            continue;
        }

        match cmd {
            "set" => {
                let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
                    continue;
                };

                let Some(expanded) = expand_word(value) else { continue };

                if !is_settable(key, &expanded) {
                    debug!("skipping unsettable variable {:?}", key);
                    continue;
                }

                std::env::set_var(key, expanded);
            }
            "prepend-path" | "append-path" => {
                if tokens.next() != Some("PATH") {
                    continue;
                }

                let Some(value) = tokens.next() else { continue };

                if let Some(expanded) = expand_word(value) {
                    scan_path_value(&expanded, bins);
                }
            }
            _ => {}
        }
    }
}

// set_var panics on these
fn is_settable(key: &str, value: &str) -> bool {
    !key.is_empty() && !key.contains(['=', '\0']) && !value.contains('\0')
}

/// Shell-style word expansion without command substitution.
///
/// Handles quoting, `~`, `$VAR`/`${VAR}` (unset variables expand to nothing)
/// and glob patterns. Returns `None` if the word can't be expanded.
pub fn expand_word(word: &str) -> Option<String> {
    if word.contains("$(") || word.contains('`') {
        debug!("refusing command substitution in {}", word);
        return None;
    }

    let (body, expand) = unquote(word)?;

    if !expand {
        return Some(body.to_string());
    }

    let expanded = shellexpand::full_with_context(
        body,
        || dirs::home_dir().map(|p| p.to_string_lossy().into_owned()),
        |var| Ok::<_, std::env::VarError>(Some(std::env::var(var).unwrap_or_default())),
    )
    .ok()?;

    if has_glob_chars(&expanded) {
        return Some(expand_glob(&expanded));
    }

    Some(expanded.into_owned())
}

/// Strip one level of quoting. Single quotes and braces disable expansion.
fn unquote(word: &str) -> Option<(&str, bool)> {
    let quoted = |open: char, close: char| {
        word.len() >= 2 && word.starts_with(open) && word.ends_with(close)
    };

    if quoted('\'', '\'') || quoted('{', '}') {
        return Some((&word[1..word.len() - 1], false));
    }

    if quoted('"', '"') {
        return Some((&word[1..word.len() - 1], true));
    }

    // unbalanced quote, same as a shell syntax error
    if word.starts_with(['"', '\'']) {
        return None;
    }

    Some((word, true))
}

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expand a glob to every matching path, joined with ':'.
/// A pattern that matches nothing is kept as written.
fn expand_glob(pattern: &str) -> String {
    let matches = glob_matches(pattern);

    if matches.is_empty() {
        return pattern.to_string();
    }

    matches
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<Cow<str>>>()
        .join(":")
}

fn glob_matches(pattern: &str) -> Vec<PathBuf> {
    let Ok(glob) = Glob::new(pattern) else {
        return Vec::new();
    };
    let matcher = glob.compile_matcher();

    // walk from the longest literal prefix, only as deep as the pattern goes
    let components: Vec<&str> = pattern.split('/').collect();
    let literal = components
        .iter()
        .take_while(|c| !has_glob_chars(c))
        .count();

    let base = if literal == 0 {
        PathBuf::from(".")
    } else {
        let prefix = components[..literal].join("/");
        if prefix.is_empty() {
            PathBuf::from("/")
        } else {
            PathBuf::from(prefix)
        }
    };
    let depth = components.len() - literal;

    let mut matches: Vec<PathBuf> = WalkDir::new(&base)
        .min_depth(depth)
        .max_depth(depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| matcher.is_match(strip_dot(p)))
        .collect();

    matches.sort();
    matches
}

fn strip_dot(path: &Path) -> &Path {
    path.strip_prefix(".").unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn make_bin(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    #[serial]
    fn test_prepend_path_literal() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        make_bin(&bin, "fooctl");

        let source = format!("#%Module1.0\nprepend-path PATH {}\n", bin.display());
        let mut bins = Vec::new();
        analyze_source(&source, &mut bins);

        assert_eq!(bins, vec!["fooctl"]);
    }

    #[test]
    #[serial]
    fn test_set_then_reference() {
        let temp = TempDir::new().unwrap();
        make_bin(&temp.path().join("bin"), "tool");

        let source = format!(
            "set MII_TEST_ROOT {}\nappend-path PATH $MII_TEST_ROOT/bin\n",
            temp.path().display()
        );
        let mut bins = Vec::new();
        analyze_source(&source, &mut bins);

        assert_eq!(bins, vec!["tool"]);
        std::env::remove_var("MII_TEST_ROOT");
    }

    #[test]
    #[serial]
    fn test_other_variables_and_junk_ignored() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        make_bin(&bin, "nope");

        let source = format!(
            "prepend-path LD_LIBRARY_PATH {dir}\n# prepend-path PATH {dir}\nprepend-path PATH\nset\nmodule-whatis \"junk\"\n",
            dir = bin.display()
        );
        let mut bins = Vec::new();
        analyze_source(&source, &mut bins);

        assert!(bins.is_empty());
    }

    #[test]
    #[serial]
    fn test_unsettable_variables_skipped() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        make_bin(&bin, "fooctl");

        let source = format!(
            "#%Module\nset MII_BAD=1 bar\nset MII_NUL_TEST a\0b\nset MII_EQ_TEST a=b\nprepend-path PATH {}\n",
            bin.display()
        );
        let mut bins = Vec::new();
        analyze_source(&source, &mut bins);

        assert_eq!(bins, vec!["fooctl"]);
        assert!(std::env::var_os("MII_NUL_TEST").is_none());
        // '=' is fine in a value
        assert_eq!(std::env::var("MII_EQ_TEST").as_deref(), Ok("a=b"));
        std::env::remove_var("MII_EQ_TEST");
    }

    #[test]
    fn test_command_substitution_refused() {
        assert_eq!(expand_word("$(whoami)"), None);
        assert_eq!(expand_word("`id`"), None);
    }

    #[test]
    #[serial]
    fn test_expand_variables_and_quotes() {
        std::env::set_var("MII_EXPAND_TEST", "/opt/x");
        assert_eq!(expand_word("$MII_EXPAND_TEST/bin").as_deref(), Some("/opt/x/bin"));
        assert_eq!(expand_word("\"${MII_EXPAND_TEST}/bin\"").as_deref(), Some("/opt/x/bin"));
        assert_eq!(expand_word("'$MII_EXPAND_TEST'").as_deref(), Some("$MII_EXPAND_TEST"));
        std::env::remove_var("MII_EXPAND_TEST");

        assert_eq!(expand_word("$MII_SURELY_UNSET/bin").as_deref(), Some("/bin"));
        assert_eq!(expand_word("\"unterminated"), None);
    }

    #[test]
    fn test_expand_glob() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/bin")).unwrap();
        fs::create_dir_all(temp.path().join("b/bin")).unwrap();

        let pattern = format!("{}/*/bin", temp.path().display());
        let expanded = expand_word(&pattern).unwrap();

        assert_eq!(
            expanded,
            format!(
                "{}:{}",
                temp.path().join("a/bin").display(),
                temp.path().join("b/bin").display()
            )
        );
    }
}
