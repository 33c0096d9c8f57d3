//! Policy and data loading for `verdict eval`.
//!
//! `.rego` files become policy modules, `.json` files are deep-merged into
//! a single data document. Directories are walked recursively in sorted
//! order so module order is stable between runs. A JSON file found inside a
//! subdirectory is mounted under that subdirectory's relative path, so
//! `policies/users/data.json` lands at `data.users` when `policies/` is
//! loaded. Files named directly are merged at the root.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Loader error
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// File or directory could not be read
    #[error("unable to read {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Data file is not valid JSON
    #[error("unable to parse {path}: {source}")]
    Json {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Data file does not hold a JSON object
    #[error("{0}: data document must be a JSON object")]
    NotAnObject(PathBuf),

    /// Explicit path with an extension the loader does not know
    #[error("{0}: expected a .rego or .json file")]
    UnsupportedFile(PathBuf),
}

/// Modules and merged data gathered from the `--data` paths
#[derive(Debug, Default)]
pub struct Loaded {
    /// Policy module sources in load order
    pub modules: Vec<String>,
    /// Merged data document, if any JSON file was loaded
    pub data: Option<Value>,
}

impl Loaded {
    /// Data document serialized for the request
    #[must_use]
    pub fn data_json(&self) -> Option<String> {
        self.data.as_ref().map(Value::to_string)
    }
}

/// Load every path in order
///
/// # Errors
///
/// Returns the first unreadable or malformed file
pub fn load_paths(paths: &[PathBuf]) -> Result<Loaded, LoadError> {
    let mut loaded = Loaded::default();
    for path in paths {
        load_path(path, &[], true, &mut loaded)?;
    }
    Ok(loaded)
}

fn load_path(
    path: &Path,
    prefix: &[String],
    explicit: bool,
    loaded: &mut Loaded,
) -> Result<(), LoadError> {
    let io = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(path).map_err(io)?;
    if metadata.is_dir() {
        let mut entries = fs::read_dir(path)
            .map_err(io)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io)?;
        entries.sort();

        // The root of each walk mounts at the top of the data document
        let mut child_prefix = prefix.to_vec();
        if !explicit {
            if let Some(name) = path.file_name() {
                child_prefix.push(name.to_string_lossy().into_owned());
            }
        }
        for entry in entries {
            load_path(&entry, &child_prefix, false, loaded)?;
        }
        return Ok(());
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("rego") => {
            let source = fs::read_to_string(path).map_err(io)?;
            tracing::debug!(path = %path.display(), "loaded module");
            loaded.modules.push(source);
        }
        Some("json") => {
            let raw = fs::read_to_string(path).map_err(io)?;
            let doc: Value = serde_json::from_str(&raw).map_err(|source| LoadError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            if !doc.is_object() {
                return Err(LoadError::NotAnObject(path.to_path_buf()));
            }
            tracing::debug!(path = %path.display(), "loaded data");
            let doc = mount(prefix, doc);
            match loaded.data.as_mut() {
                Some(existing) => merge(existing, doc),
                None => loaded.data = Some(doc),
            }
        }
        _ if explicit => return Err(LoadError::UnsupportedFile(path.to_path_buf())),
        _ => {}
    }
    Ok(())
}

/// Nest `doc` under the keys in `prefix`, outermost first
fn mount(prefix: &[String], doc: Value) -> Value {
    prefix.iter().rev().fold(doc, |inner, key| {
        let mut outer = Map::new();
        outer.insert(key.clone(), inner);
        Value::Object(outer)
    })
}

/// Deep-merge `incoming` into `base`. Objects merge key by key; any other
/// value in `incoming` replaces the one in `base`.
pub fn merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => merge_objects(base, incoming),
        (base, incoming) => *base = incoming,
    }
}

fn merge_objects(base: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match base.get_mut(&key) {
            Some(existing) => merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}
