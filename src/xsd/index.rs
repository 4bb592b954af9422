use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::core::CfdiError;

/// Local-only resolver for `xs:import` / `xs:include` locations.
///
/// Built once per validator: every file under the schema root is indexed by
/// file name, so the last-resort lookup never walks the directory again.
/// Nothing is ever fetched over the network; SAT URLs are mapped to their
/// base file name.
#[derive(Debug, Clone)]
pub struct SchemaIndex {
    root: PathBuf,
    by_name: HashMap<String, PathBuf>,
}

impl SchemaIndex {
    /// Index every file under `root`. When two files share a name the one
    /// closest to the root wins, then the first in name order.
    pub fn build(root: impl Into<PathBuf>) -> Result<Self, CfdiError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CfdiError::SchemaNotFound { dir: root });
        }

        let mut by_name: HashMap<String, (usize, PathBuf)> = HashMap::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| CfdiError::Schema(format!("schema index: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let depth = entry.depth();
            by_name
                .entry(name.to_string())
                .and_modify(|(d, p)| {
                    if depth < *d {
                        *d = depth;
                        *p = entry.path().to_path_buf();
                    }
                })
                .or_insert_with(|| (depth, entry.path().to_path_buf()));
        }

        tracing::debug!(root = %root.display(), files = by_name.len(), "schema index built");
        Ok(Self {
            root,
            by_name: by_name.into_iter().map(|(k, (_, p))| (k, p)).collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Resolve a schema location, trying in order: the base file name directly
    /// in the root, the literal relative path under the root, then the index.
    /// Absolute paths and `..` components never reach outside the root.
    pub fn resolve(&self, location: &str) -> Option<PathBuf> {
        let name = base_name(location);
        if matches!(name, "" | "." | "..") {
            return None;
        }

        let direct = self.root.join(name);
        if direct.is_file() {
            return Some(direct);
        }

        if !is_url(location) && stays_under_root(location) {
            let relative = self.root.join(location);
            if relative.is_file() {
                return Some(relative);
            }
        }

        self.by_name.get(name).cloned()
    }
}

fn is_url(location: &str) -> bool {
    location.contains("://")
}

fn stays_under_root(location: &str) -> bool {
    Path::new(location)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// File name component of a URL or path, without query or fragment.
pub(crate) fn base_name(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = &location[..end];
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\"/>").unwrap();
    }

    #[test]
    fn base_name_strips_url_parts() {
        assert_eq!(
            base_name("http://www.sat.gob.mx/sitio_internet/cfd/catalogos/catCFDI.xsd"),
            "catCFDI.xsd"
        );
        assert_eq!(base_name("sub\\dir\\t.xsd"), "t.xsd");
        assert_eq!(base_name("a/b.xsd?v=2#frag"), "b.xsd");
        assert_eq!(base_name("plain.xsd"), "plain.xsd");
    }

    #[test]
    fn resolves_sat_url_in_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("catCFDI.xsd"));
        let index = SchemaIndex::build(dir.path()).unwrap();
        assert_eq!(
            index.resolve("http://www.sat.gob.mx/sitio_internet/cfd/catalogos/catCFDI.xsd"),
            Some(dir.path().join("catCFDI.xsd"))
        );
    }

    #[test]
    fn resolves_relative_path_then_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("tipos/tdCFDI.xsd"));
        touch(&dir.path().join("deep/er/catalogos/catCFDI.xsd"));
        let index = SchemaIndex::build(dir.path()).unwrap();

        assert_eq!(
            index.resolve("tipos/tdCFDI.xsd"),
            Some(dir.path().join("tipos/tdCFDI.xsd"))
        );
        assert_eq!(
            index.resolve("http://www.sat.gob.mx/sitio_internet/cfd/catalogos/catCFDI.xsd"),
            Some(dir.path().join("deep/er/catalogos/catCFDI.xsd"))
        );
        assert_eq!(index.resolve("http://example.com/missing.xsd"), None);
        assert_eq!(index.resolve(""), None);
    }

    #[test]
    fn shallowest_duplicate_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/b/dup.xsd"));
        touch(&dir.path().join("z/dup.xsd"));
        let index = SchemaIndex::build(dir.path()).unwrap();
        assert_eq!(index.resolve("x/dup.xsd"), Some(dir.path().join("z/dup.xsd")));
    }

    #[test]
    fn locations_outside_the_root_are_not_followed() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("xsd");
        touch(&root.join("main.xsd"));
        touch(&outer.path().join("secret/outside.xsd"));
        let index = SchemaIndex::build(&root).unwrap();

        let absolute = outer.path().join("secret/outside.xsd");
        assert_eq!(index.resolve(absolute.to_str().unwrap()), None);
        assert_eq!(index.resolve("../secret/outside.xsd"), None);
        assert_eq!(index.resolve("sub/../../secret/outside.xsd"), None);
        assert_eq!(index.resolve(".."), None);

        // A location outside the root still resolves by name to a file inside it.
        touch(&root.join("nested/outside.xsd"));
        let index = SchemaIndex::build(&root).unwrap();
        assert_eq!(
            index.resolve("../secret/outside.xsd"),
            Some(root.join("nested/outside.xsd"))
        );
    }

    #[test]
    fn missing_root_is_schema_not_found() {
        let err = SchemaIndex::build("/definitely/not/here/xsd").unwrap_err();
        assert!(matches!(err, CfdiError::SchemaNotFound { .. }));
    }
}
