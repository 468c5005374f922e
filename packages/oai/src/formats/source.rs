//! Loading stored source documents from the data directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::RenderError;
use crate::xml::extract_element;

/// Read `file` below `{data_dir}/{subdir}` and cut out its `root_tag` element.
///
/// `file` is a relative path assembled from persistent identifiers; every
/// component is checked so identifiers cannot escape the data directory.
pub(super) fn load_source_xml(
    data_dir: &Path,
    subdir: &str,
    file: &[&str],
    root_tag: &str,
) -> Result<String, RenderError> {
    let path = source_path(data_dir, subdir, file)?;
    let contents = fs::read_to_string(&path).map_err(|source| RenderError::Io {
        path: path.display().to_string(),
        source,
    })?;

    Ok(extract_element(&contents, root_tag)?)
}

fn source_path(data_dir: &Path, subdir: &str, file: &[&str]) -> Result<PathBuf, RenderError> {
    let mut path = data_dir.join(subdir);
    for component in file {
        if !is_safe_component(component) {
            return Err(RenderError::InvalidIdentifier((*component).to_string()));
        }
        path.push(component);
    }
    Ok(path)
}

fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}
