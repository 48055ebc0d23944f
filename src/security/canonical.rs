use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath {
    pub text: String,
    pub absolute: bool,
    pub traversal: bool,
}

impl CanonicalPath {
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.text.split('/').filter(|segment| !segment.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedNul;

pub fn canonicalize(raw: &str, home: Option<&Path>) -> Result<CanonicalPath, EmbeddedNul> {
    if raw.contains('\0') {
        return Err(EmbeddedNul);
    }
    let decoded = percent_decode_fully(raw.trim());
    if decoded.contains('\0') {
        return Err(EmbeddedNul);
    }
    let expanded = expand_home(&decoded.replace('\\', "/"), home);
    Ok(normalize(&expanded))
}

fn percent_decode_fully(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = String::from_utf8_lossy(&urlencoding::decode_binary(current.as_bytes()))
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn expand_home(raw: &str, home: Option<&Path>) -> String {
    let Some(home) = home.and_then(Path::to_str) else {
        return raw.to_string();
    };
    let home = home.trim_end_matches('/');
    for prefix in ["~", "$HOME", "${HOME}"] {
        if raw == prefix {
            return home.to_string();
        }
        if let Some(rest) = raw.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
            return format!("{home}/{rest}");
        }
    }
    raw.to_string()
}

// `..` that would climb above the start of the path clamps at a conceptual
// root, so a relative escape becomes root-anchored.
fn normalize(raw: &str) -> CanonicalPath {
    let mut absolute = raw.starts_with('/');
    let mut traversal = false;
    let mut stack: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    traversal = true;
                    absolute = true;
                }
            }
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    let text = if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    };
    CanonicalPath {
        text,
        absolute,
        traversal,
    }
}
