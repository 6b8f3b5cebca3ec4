//! Search-order tests for the library locator using filesystem fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use dimreduce_core::config::SearchConfig;
use dimreduce_core::locator::{describe_with, locate_with};
use dimreduce_core::types::NativeLibrary;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// `<root>/site/pkg` as the package dir and `<root>/prefix` as the prefix.
struct Layout {
    _tmp: TempDir,
    root: PathBuf,
}

impl Layout {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("site/pkg")).unwrap();
        Self { _tmp: tmp, root }
    }

    fn package_dir(&self) -> PathBuf {
        self.root.join("site/pkg")
    }

    fn prefix(&self) -> PathBuf {
        self.root.join("prefix")
    }

    fn config(&self) -> SearchConfig {
        SearchConfig::builder(self.package_dir())
            .prefix(self.prefix())
            .build()
    }

    fn place(&self, dir: &Path, library: NativeLibrary) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(library.file_name());
        fs::write(&path, b"").unwrap();
        path
    }
}

#[test]
fn test_override_file_beats_bundled_copy() {
    let layout = Layout::new();
    let bundled = layout.place(&layout.package_dir().join("lib"), NativeLibrary::Gpu);
    let custom = layout.place(&layout.root.join("custom"), NativeLibrary::Gpu);

    let config = SearchConfig::builder(layout.package_dir())
        .prefix(layout.prefix())
        .override_path(NativeLibrary::Gpu, &custom)
        .build();
    assert_eq!(locate_with(NativeLibrary::Gpu, &config), Some(custom));

    let without = layout.config();
    assert_eq!(locate_with(NativeLibrary::Gpu, &without), Some(bundled));
}

#[test]
fn test_override_directory_is_searched_first() {
    let layout = Layout::new();
    layout.place(&layout.package_dir().join("lib"), NativeLibrary::Cpu);
    let custom_dir = layout.root.join("cpu-build");
    let custom = layout.place(&custom_dir, NativeLibrary::Cpu);

    let config = SearchConfig::builder(layout.package_dir())
        .prefix(layout.prefix())
        .override_path(NativeLibrary::Cpu, &custom_dir)
        .build();
    let descriptor = describe_with(NativeLibrary::Cpu, &config);
    assert_eq!(descriptor.candidates()[0], custom_dir);
    assert_eq!(descriptor.resolved(), Some(custom.as_path()));
}

#[test]
fn test_override_without_library_falls_through() {
    let layout = Layout::new();
    let legacy = layout.place(&layout.prefix().join("dimreduce4gpu"), NativeLibrary::Gpu);
    let empty = layout.root.join("empty");
    fs::create_dir_all(&empty).unwrap();

    let config = SearchConfig::builder(layout.package_dir())
        .prefix(layout.prefix())
        .override_path(NativeLibrary::Gpu, &empty)
        .build();
    assert_eq!(locate_with(NativeLibrary::Gpu, &config), Some(legacy));
}

#[test]
fn test_legacy_sibling_lib_is_last_resort() {
    let layout = Layout::new();
    let sibling = layout.place(&layout.root.join("site/lib"), NativeLibrary::Cpu);
    assert_eq!(locate_with(NativeLibrary::Cpu, &layout.config()), Some(sibling));

    let bundled = layout.place(&layout.package_dir().join("lib"), NativeLibrary::Cpu);
    assert_eq!(locate_with(NativeLibrary::Cpu, &layout.config()), Some(bundled));
}

#[test]
fn test_libraries_are_resolved_independently() {
    let layout = Layout::new();
    layout.place(&layout.package_dir().join("lib"), NativeLibrary::Cpu);
    let config = layout.config();
    assert!(locate_with(NativeLibrary::Cpu, &config).is_some());
    assert!(locate_with(NativeLibrary::Gpu, &config).is_none());
}

#[test]
fn test_lookup_is_not_cached() {
    let layout = Layout::new();
    let config = layout.config();
    assert_eq!(locate_with(NativeLibrary::Gpu, &config), None);

    let placed = layout.place(&layout.package_dir().join("lib"), NativeLibrary::Gpu);
    assert_eq!(locate_with(NativeLibrary::Gpu, &config), Some(placed.clone()));

    fs::remove_file(&placed).unwrap();
    assert_eq!(locate_with(NativeLibrary::Gpu, &config), None);
}
