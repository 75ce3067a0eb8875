//! Case-insensitive template lookup inside a theme tree.
//!
//! # Responsibilities
//! - Map a logical name (`post`, `pages/about`) to a template file
//! - Resolve directories and partials the same way
//! - Memoize every lookup by `(theme, kind, lowercased name)`
//!
//! # Design Decisions
//! - Missing templates fall back to `index`, except `index` and `error`
//! - Negative results are memoized too; the memo lives until `clear`
//! - Names containing `..` or empty segments never resolve

use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;

/// Template file extensions, in lookup order.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["hbs", "html", "htm"];

/// Directories searched for partials, in order.
pub const PARTIAL_DIRS: &[&str] = &["partials", "components"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Lookup {
    Theme,
    Exact,
    Directory,
    Partial,
}

pub struct TemplateResolver {
    themes_dir: PathBuf,
    live: bool,
    memo: DashMap<(String, Lookup, String), Option<PathBuf>>,
}

impl TemplateResolver {
    pub fn new(themes_dir: impl Into<PathBuf>, live: bool) -> Self {
        Self {
            themes_dir: themes_dir.into(),
            live,
            memo: DashMap::new(),
        }
    }

    /// Root directory of a theme.
    pub fn theme_dir(&self, theme: &str) -> Option<PathBuf> {
        self.memoized(theme, Lookup::Theme, "", || {
            find_entry(&self.themes_dir, theme).filter(|p| p.is_dir())
        })
    }

    /// Template for a logical name, falling back to `index`.
    pub fn resolve_template(&self, theme: &str, name: &str) -> Option<PathBuf> {
        let found = self.resolve_exact(theme, name);
        if found.is_some() {
            return found;
        }
        let lowered = name.to_ascii_lowercase();
        if lowered == "index" || lowered == "error" {
            return None;
        }
        tracing::debug!(theme = %theme, template = %name, "Template missing, falling back to index");
        self.resolve_exact(theme, "index")
    }

    /// Template for a logical name, without fallback.
    pub fn resolve_exact(&self, theme: &str, name: &str) -> Option<PathBuf> {
        self.memoized(theme, Lookup::Exact, name, || {
            let root = self.theme_dir(theme)?;
            find_template(&root, name)
        })
    }

    pub fn resolve_directory(&self, theme: &str, name: &str) -> Option<PathBuf> {
        self.memoized(theme, Lookup::Directory, name, || {
            let root = self.theme_dir(theme)?;
            walk_dirs(&root, &segments(name)?)
        })
    }

    /// Partial from `partials/`, then `components/`.
    pub fn resolve_partial(&self, theme: &str, name: &str) -> Option<PathBuf> {
        self.memoized(theme, Lookup::Partial, name, || {
            let root = self.theme_dir(theme)?;
            PARTIAL_DIRS
                .iter()
                .filter_map(|dir| find_entry(&root, dir).filter(|p| p.is_dir()))
                .find_map(|dir| find_template(&dir, name))
        })
    }

    pub fn clear(&self) {
        self.memo.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.memo.len()
    }

    fn memoized<F>(&self, theme: &str, kind: Lookup, name: &str, compute: F) -> Option<PathBuf>
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        if self.live {
            return compute();
        }
        let key = (theme.to_ascii_lowercase(), kind, name.to_ascii_lowercase());
        if let Some(hit) = self.memo.get(&key) {
            return hit.clone();
        }
        let found = compute();
        self.memo.insert(key, found.clone());
        found
    }
}

/// Find a directory entry whose name matches case-insensitively.
pub fn find_entry(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.exists() {
        return Some(exact);
    }
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|entry| entry.path())
}

/// Find a template file by stem, trying each template extension.
pub fn find_template_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    TEMPLATE_EXTENSIONS
        .iter()
        .filter_map(|ext| find_entry(dir, &format!("{}.{}", stem, ext)))
        .find(|p| p.is_file())
}

fn segments(name: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = name.trim_matches('/').split('/').collect();
    if parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
        return None;
    }
    Some(parts)
}

fn walk_dirs(root: &Path, parts: &[&str]) -> Option<PathBuf> {
    parts.iter().try_fold(root.to_path_buf(), |dir, part| {
        find_entry(&dir, part).filter(|p| p.is_dir())
    })
}

/// Template file for a logical name below `root`, each segment case-insensitive.
pub fn find_template(root: &Path, name: &str) -> Option<PathBuf> {
    let parts = segments(name)?;
    let (stem, dirs) = parts.split_last()?;
    let dir = walk_dirs(root, dirs)?;
    find_template_file(&dir, stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn theme() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("Default");
        fs::create_dir_all(root.join("Pages")).unwrap();
        fs::create_dir_all(root.join("partials")).unwrap();
        fs::create_dir_all(root.join("components")).unwrap();
        fs::write(root.join("Index.hbs"), "index").unwrap();
        fs::write(root.join("post.html"), "post").unwrap();
        fs::write(root.join("Pages/About.hbs"), "about").unwrap();
        fs::write(root.join("partials/Header.hbs"), "header").unwrap();
        fs::write(root.join("components/card.htm"), "card").unwrap();
        dir
    }

    #[test]
    fn resolves_case_insensitively() {
        let dir = theme();
        let resolver = TemplateResolver::new(dir.path(), false);
        let found = resolver.resolve_template("default", "POST").unwrap();
        assert!(found.ends_with("post.html"));
        let found = resolver.resolve_template("default", "pages/about").unwrap();
        assert!(found.ends_with("Pages/About.hbs"));
    }

    #[test]
    fn falls_back_to_index_except_for_error() {
        let dir = theme();
        let resolver = TemplateResolver::new(dir.path(), false);
        let found = resolver.resolve_template("default", "category").unwrap();
        assert!(found.ends_with("Index.hbs"));
        assert!(resolver.resolve_template("default", "error").is_none());
        assert!(resolver.resolve_exact("default", "category").is_none());
    }

    #[test]
    fn partials_then_components() {
        let dir = theme();
        let resolver = TemplateResolver::new(dir.path(), false);
        assert!(resolver.resolve_partial("default", "header").unwrap().ends_with("Header.hbs"));
        assert!(resolver.resolve_partial("default", "Card").unwrap().ends_with("card.htm"));
        assert!(resolver.resolve_partial("default", "footer").is_none());
    }

    #[test]
    fn directories_and_traversal() {
        let dir = theme();
        let resolver = TemplateResolver::new(dir.path(), false);
        assert!(resolver.resolve_directory("default", "pages").unwrap().is_dir());
        assert!(resolver.resolve_exact("default", "../Default/post").is_none());
        assert!(resolver.resolve_template("missing", "index").is_none());
    }

    #[test]
    fn memoizes_until_cleared() {
        let dir = theme();
        let resolver = TemplateResolver::new(dir.path(), false);
        assert!(resolver.resolve_exact("default", "tag").is_none());

        fs::write(dir.path().join("Default/tag.hbs"), "tag").unwrap();
        assert!(resolver.resolve_exact("default", "tag").is_none());

        resolver.clear();
        assert!(resolver.resolve_exact("default", "tag").is_some());
    }

    #[test]
    fn live_mode_skips_memo() {
        let dir = theme();
        let resolver = TemplateResolver::new(dir.path(), true);
        assert!(resolver.resolve_exact("default", "tag").is_none());
        fs::write(dir.path().join("Default/tag.hbs"), "tag").unwrap();
        assert!(resolver.resolve_exact("default", "tag").is_some());
        assert_eq!(resolver.cached_len(), 0);
    }
}
