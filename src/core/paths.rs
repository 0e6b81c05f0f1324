//! Shared path manipulation utilities: placeholder expansion and resolution.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Home directory of the current user.
///
/// `SWEEP_HOME` wins over the platform lookup so tests and sandboxes can
/// relocate every default path at once.
pub fn home_dir() -> PathBuf {
    if let Some(custom) = env::var_os("SWEEP_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(custom);
    }
    dirs::home_dir().unwrap_or_else(|| {
        eprintln!("[CSW-PATHS] WARNING: home directory unknown, falling back to temp dir");
        env::temp_dir()
    })
}

/// Expand `~`, `$VAR`, `${VAR}` and `%VAR%` placeholders in a raw rule path.
///
/// Unknown variables are left untouched, matching shell `expandvars` behavior.
pub fn expand_placeholders(raw: &str) -> PathBuf {
    expand_with(raw, &home_dir(), |name| env::var(name).ok())
}

fn expand_with<F>(raw: &str, home: &Path, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(raw.len());
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '~' if i == 0 && chars.get(1).is_none_or(|c| *c == '/' || *c == '\\') => {
                out.push_str(&home.to_string_lossy());
                i += 1;
            }
            '$' if chars.get(1 + i) == Some(&'{') => {
                let Some(end) = chars[i + 2..].iter().position(|c| *c == '}') else {
                    out.extend(&chars[i..]);
                    break;
                };
                let name: String = chars[i + 2..i + 2 + end].iter().collect();
                match lookup(&name) {
                    Some(value) => out.push_str(&value),
                    None => out.extend(&chars[i..i + 3 + end]),
                }
                i += 3 + end;
            }
            '$' => {
                let len = chars[i + 1..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                    .count();
                let name: String = chars[i + 1..i + 1 + len].iter().collect();
                match (len, lookup(&name)) {
                    (0, _) | (_, None) => out.extend(&chars[i..=i + len]),
                    (_, Some(value)) => out.push_str(&value),
                }
                i += 1 + len;
            }
            '%' => {
                let close = chars[i + 1..].iter().position(|c| *c == '%');
                let resolved = close.and_then(|end| {
                    let name: String = chars[i + 1..i + 1 + end].iter().collect();
                    if name.is_empty() {
                        None
                    } else {
                        lookup(&name).map(|v| (v, end))
                    }
                });
                if let Some((value, end)) = resolved {
                    out.push_str(&value);
                    i += 2 + end;
                } else {
                    out.push('%');
                    i += 1;
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    PathBuf::from(out)
}

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. path does not exist), the path is made absolute relative
/// to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "CACHE" => Some("/var/cache".to_string()),
            "LOCALAPPDATA" => Some("C:/Users/me/AppData/Local".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_tilde_prefix() {
        let home = Path::new("/home/me");
        assert_eq!(
            expand_with("~/.cache", home, lookup),
            PathBuf::from("/home/me/.cache")
        );
        assert_eq!(expand_with("~", home, lookup), PathBuf::from("/home/me"));
        // Tilde inside a name is literal.
        assert_eq!(
            expand_with("/data/a~b", home, lookup),
            PathBuf::from("/data/a~b")
        );
    }

    #[test]
    fn expands_env_forms() {
        let home = Path::new("/home/me");
        assert_eq!(
            expand_with("$CACHE/pip", home, lookup),
            PathBuf::from("/var/cache/pip")
        );
        assert_eq!(
            expand_with("${CACHE}/npm", home, lookup),
            PathBuf::from("/var/cache/npm")
        );
        assert_eq!(
            expand_with("%LOCALAPPDATA%/Temp", home, lookup),
            PathBuf::from("C:/Users/me/AppData/Local/Temp")
        );
    }

    #[test]
    fn unknown_variables_are_kept() {
        let home = Path::new("/home/me");
        assert_eq!(
            expand_with("$NOPE/x", home, lookup),
            PathBuf::from("$NOPE/x")
        );
        assert_eq!(
            expand_with("${NOPE}/x", home, lookup),
            PathBuf::from("${NOPE}/x")
        );
        assert_eq!(
            expand_with("50%off/%NOPE%", home, lookup),
            PathBuf::from("50%off/%NOPE%")
        );
        assert_eq!(expand_with("cost$", home, lookup), PathBuf::from("cost$"));
    }

    #[test]
    fn resolves_existing_path_canonically() {
        let cwd = env::current_dir().unwrap();
        let resolved = resolve_absolute_path(Path::new("."));
        assert_eq!(resolved, std::fs::canonicalize(&cwd).unwrap());
    }

    #[test]
    fn normalizes_nonexistent_path_syntactically() {
        #[cfg(unix)]
        let root = Path::new("/");
        #[cfg(windows)]
        let root = Path::new("C:");

        let input = root.join("nonexistent").join("foo").join("..").join("bar");
        let expected = root.join("nonexistent").join("bar");
        assert!(std::fs::canonicalize(&input).is_err());
        assert_eq!(resolve_absolute_path(&input), expected);
    }
}
