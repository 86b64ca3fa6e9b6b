use std::path::{Component, Path};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("path '{path}' is not a file under source root '{root}'")]
    OutsideRoot { path: String, root: String },
}

pub struct KeyPath;

impl KeyPath {
    /// Standardize directory separators to forward slashes.
    /// This is the wire format for object keys.
    pub fn normalize(path: &str) -> String {
        path.replace('\\', "/")
    }
}

/// Derive the destination object key for a local file: the destination
/// prefix joined with the file's path relative to the source root,
/// forward-slash separated and free of empty segments.
///
/// Fails when `local_path` does not sit strictly under `source_root`,
/// including paths that escape via `..`.
pub fn destination_key(
    source_root: &str,
    destination_prefix: &str,
    local_path: &str,
) -> Result<String, KeyError> {
    let root = KeyPath::normalize(source_root);
    let local = KeyPath::normalize(local_path);

    let outside = || KeyError::OutsideRoot {
        path: local_path.to_string(),
        root: source_root.to_string(),
    };

    let rel = Path::new(&local)
        .strip_prefix(Path::new(root.trim_end_matches('/')))
        .map_err(|_| outside())?;

    let mut segments: Vec<String> = KeyPath::normalize(destination_prefix)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let prefix_len = segments.len();
    for component in rel.components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => segments.push(part.to_string()),
                None => return Err(outside()),
            },
            // `.` contributes nothing; anything else escapes the root.
            Component::CurDir => {}
            _ => return Err(outside()),
        }
    }
    if segments.len() == prefix_len {
        return Err(outside());
    }

    Ok(segments.join("/"))
}
