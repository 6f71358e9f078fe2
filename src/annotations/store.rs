// src/annotations/store.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::annotations::edit::apply_props_edit;
use crate::annotations::templates::TemplateRegistry;
use crate::config::loader::read_pipeline_text;
use crate::config::{
    load_and_validate, normalize_path, parse_pipeline, pipeline_root, ConfigSection, PipelineFile,
};
use crate::errors::{ReprodagError, Result};
use crate::fs::{walk_files, write_atomic, FileSystem};
use crate::types::OutputKind;

/// Name of the annotation that selects a plot template.
pub const TEMPLATE_KEY: &str = "template";

/// Reads and edits the presentational `props` of declared outputs.
///
/// The store only knows the declaration. It has no way to reach the lock,
/// so annotation edits can never invalidate a stage or create a lock file.
#[derive(Debug, Clone)]
pub struct OutputAnnotationStore {
    fs: Arc<dyn FileSystem>,
    pipeline_path: PathBuf,
    root: PathBuf,
}

impl OutputAnnotationStore {
    pub fn new(fs: Arc<dyn FileSystem>, pipeline_path: impl Into<PathBuf>) -> Self {
        let pipeline_path = pipeline_path.into();
        let root = pipeline_root(&pipeline_path);
        Self {
            fs,
            pipeline_path,
            root,
        }
    }

    pub fn pipeline_path(&self) -> &Path {
        &self.pipeline_path
    }

    /// Merge `props` into the annotations of `out`.
    pub fn set_props(&self, out: &str, props: &toml::Table) -> Result<()> {
        self.modify(out, props, &[])
    }

    /// Remove `keys` from the annotations of `out`.
    pub fn unset_props(&self, out: &str, keys: &[String]) -> Result<()> {
        self.modify(out, &toml::Table::new(), keys)
    }

    /// Set and unset annotations of `out` in one edit.
    ///
    /// Either the whole edit is written or the declaration is left as it
    /// was. A `template` value is checked before anything else, including
    /// whether a declaration exists at all.
    pub fn modify(&self, out: &str, set: &toml::Table, unset: &[String]) -> Result<()> {
        if let Some(template) = set.get(TEMPLATE_KEY) {
            self.templates().validate(template)?;
        }

        let text = self.read_declaration()?;
        let file = parse_pipeline(&text)?;
        let wanted = normalize_path(out);
        let (stage, _) = file
            .find_output(&wanted)
            .ok_or_else(|| ReprodagError::OutputNotFound(out.to_string()))?;

        let mut doc: DocumentMut = text.parse()?;
        apply_props_edit(&mut doc, stage, &wanted, set, unset)?;
        let updated = doc.to_string();

        // The edited document must still be a valid pipeline.
        parse_pipeline(&updated)?;
        write_atomic(self.fs.as_ref(), &self.pipeline_path, updated.as_bytes())?;

        info!(
            out = %wanted,
            stage = %stage,
            set = ?set.keys().collect::<Vec<_>>(),
            unset = ?unset,
            "updated output annotations"
        );
        Ok(())
    }

    /// Declared annotations of the exact output `out`.
    pub fn props(&self, out: &str) -> Result<toml::Table> {
        let file = self.load()?;
        file.find_output(out)
            .map(|(_, cfg)| cfg.props.clone())
            .ok_or_else(|| ReprodagError::OutputNotFound(out.to_string()))
    }

    /// Annotations that apply to `path`: those of the output declaring it,
    /// or of the output directory containing it.
    ///
    /// `None` when no declared output covers `path`.
    pub fn effective_props(&self, path: &str) -> Result<Option<toml::Table>> {
        let file = self.load()?;
        Ok(effective_props_in(&file, &normalize_path(path)))
    }

    /// Every file currently under a declared output of `kind`, with the
    /// annotations that apply to it. Directory outputs are walked now, so
    /// files added after the annotation was set are included.
    pub fn collect(&self, kind: OutputKind) -> Result<BTreeMap<String, toml::Table>> {
        let file = self.load()?;
        let mut collected = BTreeMap::new();

        for (stage, out) in file.outputs().filter(|(_, out)| out.kind == kind) {
            let rel = normalize_path(&out.path);
            let abs = self.root.join(&rel);

            if self.fs.is_dir(&abs) {
                for inner in walk_files(self.fs.as_ref(), &abs)? {
                    collected.insert(format!("{rel}/{inner}"), out.props.clone());
                }
            } else if self.fs.exists(&abs) {
                collected.insert(rel, out.props.clone());
            } else {
                debug!(stage = %stage, out = %rel, "output not on disk; not collected");
            }
        }

        Ok(collected)
    }

    /// Declared annotations of every output, keyed by output path.
    pub fn declared(&self) -> Result<BTreeMap<String, toml::Table>> {
        let file = self.load()?;
        Ok(file
            .outputs()
            .map(|(_, out)| (normalize_path(&out.path), out.props.clone()))
            .collect())
    }

    fn read_declaration(&self) -> Result<String> {
        read_pipeline_text(self.fs.as_ref(), &self.pipeline_path)?.ok_or_else(|| {
            ReprodagError::ConfigError(format!(
                "pipeline declaration not found: {}",
                self.pipeline_path.display()
            ))
        })
    }

    fn load(&self) -> Result<PipelineFile> {
        load_and_validate(self.fs.as_ref(), &self.pipeline_path)
    }

    /// Template lookup, using `[config] templates_dir` when the declaration
    /// has one and the default otherwise.
    fn templates(&self) -> TemplateRegistry {
        let configured = self
            .fs
            .read_to_string(&self.pipeline_path)
            .ok()
            .and_then(|text| text.parse::<toml::Table>().ok())
            .and_then(|doc| {
                doc.get("config")?
                    .get("templates_dir")?
                    .as_str()
                    .map(PathBuf::from)
            });
        let dir = configured.unwrap_or_else(|| PathBuf::from(ConfigSection::default().templates_dir));
        TemplateRegistry::new(self.fs.clone(), self.root.clone(), &dir)
    }
}

fn effective_props_in(file: &PipelineFile, path: &str) -> Option<toml::Table> {
    file.outputs().find_map(|(_, out)| {
        let declared = normalize_path(&out.path);
        let covers = declared == path || Path::new(path).starts_with(Path::new(&declared));
        covers.then(|| out.props.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const PIPELINE: &str = r#"[stage.copy_double]
cmd = "make plots"
deps = ["file.json"]
outs = [{ path = "subdir", cache = false, kind = "plot" }]
"#;

    fn store(fs: &Arc<MockFileSystem>) -> OutputAnnotationStore {
        fs.add_file("/repo/reprodag.toml", PIPELINE);
        OutputAnnotationStore::new(fs.clone(), "/repo/reprodag.toml")
    }

    #[test]
    fn directory_annotation_applies_to_files_below() {
        let fs = Arc::new(MockFileSystem::new());
        let store = store(&fs);
        store
            .set_props("subdir", &"title = \"TITLE\"".parse().unwrap())
            .unwrap();

        let p1 = store.effective_props("subdir/p1.json").unwrap().unwrap();
        assert_eq!(p1["title"].as_str(), Some("TITLE"));
        assert!(store.effective_props("elsewhere.json").unwrap().is_none());
        assert!(store.effective_props("subdirectory/x.json").unwrap().is_none());
    }

    #[test]
    fn collect_walks_directories_at_read_time() {
        let fs = Arc::new(MockFileSystem::new());
        let store = store(&fs);
        store
            .set_props("subdir", &"title = \"TITLE\"".parse().unwrap())
            .unwrap();

        fs.add_file("/repo/subdir/p1.json", "[]");
        fs.add_file("/repo/subdir/p2.json", "[]");

        let plots = store.collect(OutputKind::Plot).unwrap();
        let keys: Vec<&str> = plots.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["subdir/p1.json", "subdir/p2.json"]);
        assert_eq!(plots["subdir/p1.json"], plots["subdir/p2.json"]);
        assert!(store.collect(OutputKind::Metric).unwrap().is_empty());
    }

    #[test]
    fn unknown_output_is_rejected_without_writing() {
        let fs = Arc::new(MockFileSystem::new());
        let store = store(&fs);
        let err = store
            .set_props("nope.json", &"title = \"T\"".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, ReprodagError::OutputNotFound(_)));
        assert_eq!(
            fs.contents("/repo/reprodag.toml").unwrap(),
            PIPELINE.as_bytes()
        );
    }
}
