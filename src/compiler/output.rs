//! Generated-file layout.
//!
//! ```text
//! <root>/[<locale>/]<input dir>/<input file name>.js
//! <root>/<concat name>[_<locale>].soy.concat.js
//! ```
//!
//! The locale segment only appears when more than one locale is configured.
//! The same layout is used for the active output root and the precompiled
//! root, so a precompiled artifact can be copied path-for-path.

use std::path::{Path, PathBuf};

/// Extension the compiler appends to each input file name.
pub const GENERATED_EXT: &str = ".js";
/// Suffix of concatenated per-locale bundles.
pub const CONCAT_SUFFIX: &str = ".soy.concat.js";

/// Output paths under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    multi_locale: bool,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, multi_locale: bool) -> Self {
        Self {
            root: root.into(),
            multi_locale,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locale_root(&self, locale: Option<&str>) -> PathBuf {
        match locale {
            Some(locale) if self.multi_locale => self.root.join(locale),
            _ => self.root.clone(),
        }
    }

    /// Generated file for `source` (relative to the input root).
    pub fn artifact(&self, source: &Path, locale: Option<&str>) -> PathBuf {
        let mut file_name = source
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        file_name.push(GENERATED_EXT);

        let mut path = self.locale_root(locale);
        if let Some(dir) = source.parent() {
            path.push(dir);
        }
        path.push(file_name);
        path
    }

    /// Generated files for `sources`, in the same order.
    pub fn artifacts<'a, I>(&self, sources: I, locale: Option<&str>) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        sources
            .into_iter()
            .map(|source| self.artifact(source, locale))
            .collect()
    }

    /// Value of the compiler's `--outputPathFormat` flag.
    pub fn path_format(&self) -> String {
        let mut path = self.root.clone();
        if self.multi_locale {
            path.push("{LOCALE}");
        }
        path.push("{INPUT_DIRECTORY}");
        path.push(format!("{{INPUT_FILE_NAME}}{GENERATED_EXT}"));
        path.to_string_lossy().into_owned()
    }

    /// Concatenated bundle for `locale`.
    pub fn concat(&self, name: &str, locale: Option<&str>) -> PathBuf {
        let file_name = match locale {
            Some(locale) if self.multi_locale => format!("{name}_{locale}{CONCAT_SUFFIX}"),
            _ => format!("{name}{CONCAT_SUFFIX}"),
        };
        self.root.join(file_name)
    }
}
