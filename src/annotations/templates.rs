// src/annotations/templates.rs

//! Plot template lookup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{ReprodagError, Result};
use crate::fs::FileSystem;

/// Templates every installation knows about.
pub const BUILTIN_TEMPLATES: &[&str] = &[
    "default",
    "linear",
    "simple",
    "scatter",
    "smooth",
    "confusion",
    "confusion_normalized",
    "bar_horizontal",
    "bar_horizontal_sorted",
];

/// Where a template name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Builtin(&'static str),
    File(PathBuf),
}

/// Resolves template names against the built-ins, the templates directory
/// and the pipeline root, in that order.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    templates_dir: PathBuf,
}

impl TemplateRegistry {
    /// `templates_dir` is taken relative to `root` unless absolute.
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, templates_dir: &Path) -> Self {
        let root = root.into();
        let templates_dir = root.join(templates_dir);
        Self {
            fs,
            root,
            templates_dir,
        }
    }

    pub fn resolve(&self, name: &str) -> Option<TemplateSource> {
        if let Some(builtin) = BUILTIN_TEMPLATES.iter().find(|b| **b == name) {
            return Some(TemplateSource::Builtin(builtin));
        }
        if name.is_empty() {
            return None;
        }

        let candidates = [
            self.templates_dir.join(name),
            self.templates_dir.join(format!("{name}.json")),
            self.root.join(name),
        ];
        let found = candidates.into_iter().find(|p| self.fs.is_file(p));
        if let Some(path) = &found {
            debug!(template = %name, path = %path.display(), "resolved template file");
        }
        found.map(TemplateSource::File)
    }

    /// Check the value of a `template` annotation.
    pub fn validate(&self, value: &toml::Value) -> Result<TemplateSource> {
        let Some(name) = value.as_str() else {
            return Err(ReprodagError::TemplateNotFound(value.to_string()));
        };
        self.resolve(name)
            .ok_or_else(|| ReprodagError::TemplateNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn registry(fs: &Arc<MockFileSystem>) -> TemplateRegistry {
        TemplateRegistry::new(fs.clone(), "/repo", Path::new(".reprodag/plots"))
    }

    #[test]
    fn builtins_resolve_without_files() {
        let fs = Arc::new(MockFileSystem::new());
        assert_eq!(
            registry(&fs).resolve("linear"),
            Some(TemplateSource::Builtin("linear"))
        );
    }

    #[test]
    fn templates_dir_is_searched_with_and_without_extension() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/repo/.reprodag/plots/fancy.json", "{}");
        let reg = registry(&fs);

        let expected = Some(TemplateSource::File(PathBuf::from(
            "/repo/.reprodag/plots/fancy.json",
        )));
        assert_eq!(reg.resolve("fancy"), expected);
        assert_eq!(reg.resolve("fancy.json"), expected);
    }

    #[test]
    fn root_relative_file_resolves() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/repo/custom_template.json", "{}");
        assert_eq!(
            registry(&fs).resolve("custom_template.json"),
            Some(TemplateSource::File(PathBuf::from("/repo/custom_template.json")))
        );
    }

    #[test]
    fn unknown_and_non_string_templates_are_rejected() {
        let fs = Arc::new(MockFileSystem::new());
        let reg = registry(&fs);
        assert!(matches!(
            reg.validate(&toml::Value::String("not-existing-template.json".into())),
            Err(ReprodagError::TemplateNotFound(_))
        ));
        assert!(matches!(
            reg.validate(&toml::Value::Integer(3)),
            Err(ReprodagError::TemplateNotFound(_))
        ));
    }
}
