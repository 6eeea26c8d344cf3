// PathManager maps cache identifiers to locations under the data root.
//
// The layout is flat:
//
//	<root>
//	├── <id>          committed artifact, immutable until evicted
//	└── <id>.part     placeholder for an upload in progress
//
// The placeholder and the committed artifact never coexist for one
// identifier except inside the rename that promotes the former to the
// latter. The engine exclusively owns everything under the root.

use std::path::PathBuf;

/// Suffix tagging an in-progress upload placeholder.
const PLACEHOLDER_SUFFIX: &str = ".part";

#[derive(Clone)]
pub struct PathManager {
    root: PathBuf,
}

impl PathManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PathManager { root: root.into() }
    }

    /// Returns the path of the committed artifact for `id`,
    /// (e.g. `<root>/<id>`).
    pub fn artifact_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Returns the path of the upload placeholder for `id`,
    /// (e.g. `<root>/<id>.part`).
    pub fn placeholder_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{PLACEHOLDER_SUFFIX}"))
    }
}
