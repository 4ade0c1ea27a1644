//! Fakes and fixtures shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use svgpad::platform::{BookmarkManager, FolderAuthorizer, PrivilegedRunner, ResolvedBookmark};
use svgpad::update::{BundleOps, InstallServices, ShellBundleOps};
use zip::write::SimpleFileOptions;

/// Create `<dir>/<name>` as a minimal bundle whose `Contents/marker` holds `marker`.
pub fn make_bundle(dir: &Path, name: &str, marker: &str) -> PathBuf {
    let bundle = dir.join(name);
    fs::create_dir_all(bundle.join("Contents")).unwrap();
    fs::write(bundle.join("Contents/marker"), marker).unwrap();
    bundle
}

pub fn read_marker(bundle: &Path) -> String {
    fs::read_to_string(bundle.join("Contents/marker")).unwrap()
}

/// Names of entries in `dir` that look like a moved-aside bundle.
pub fn aside_siblings(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.contains(" ("))
        .collect()
}

/// Zip with one `<name>/Contents/marker` per bundle name.
pub fn bundle_zip(bundles: &[&str]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().unix_permissions(0o755);
    for name in bundles {
        zip.add_directory(*name, options).unwrap();
        zip.add_directory(format!("{name}/Contents"), options).unwrap();
        zip.start_file(format!("{name}/Contents/marker"), options)
            .unwrap();
        zip.write_all(b"new").unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn write_bundle_zip(path: &Path, bundles: &[&str]) {
    let mut file = File::create(path).unwrap();
    file.write_all(&bundle_zip(bundles)).unwrap();
}

/// Privileged runner that records commands and always fails.
#[derive(Default)]
pub struct FailingPrivileged {
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl PrivilegedRunner for FailingPrivileged {
    fn run_privileged(&self, command: &str) -> anyhow::Result<()> {
        self.commands.lock().unwrap().push(command.to_owned());
        anyhow::bail!("User canceled.")
    }
}

/// Folder picker returning queued answers; an empty queue means cancel.
#[derive(Default)]
pub struct ScriptedAuthorizer {
    answers: Mutex<VecDeque<Option<PathBuf>>>,
    create_selected: bool,
    pub requests: Arc<Mutex<Vec<u32>>>,
}

impl ScriptedAuthorizer {
    pub fn answering(answers: Vec<Option<PathBuf>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            create_selected: true,
            requests: Arc::default(),
        }
    }
}

impl FolderAuthorizer for ScriptedAuthorizer {
    fn request_folder(&self, _folder: &Path, attempt: u32) -> anyhow::Result<Option<PathBuf>> {
        self.requests.lock().unwrap().push(attempt);
        let answer = self.answers.lock().unwrap().pop_front().flatten();
        if let (Some(selected), true) = (&answer, self.create_selected) {
            fs::create_dir_all(selected)?;
        }
        Ok(answer)
    }
}

/// Bookmarks that encode the folder path as bytes.
#[derive(Default)]
pub struct MemoryBookmarks {
    pub stale: bool,
    pub started: Arc<Mutex<Vec<PathBuf>>>,
    pub stopped: Arc<Mutex<Vec<PathBuf>>>,
}

impl BookmarkManager for MemoryBookmarks {
    fn create_bookmark(&self, folder: &Path) -> anyhow::Result<Vec<u8>> {
        Ok(folder.to_string_lossy().into_owned().into_bytes())
    }

    fn resolve_bookmark(&self, data: &[u8]) -> anyhow::Result<ResolvedBookmark> {
        Ok(ResolvedBookmark {
            path: PathBuf::from(String::from_utf8(data.to_vec())?),
            is_stale: self.stale,
        })
    }

    fn start_accessing(&self, folder: &Path) -> anyhow::Result<()> {
        self.started.lock().unwrap().push(folder.to_owned());
        Ok(())
    }

    fn stop_accessing(&self, folder: &Path) {
        self.stopped.lock().unwrap().push(folder.to_owned());
    }
}

/// Real file operations whose first `n` placements fail.
pub struct FlakyOps {
    failures_left: AtomicU32,
}

impl FlakyOps {
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
        }
    }
}

impl BundleOps for FlakyOps {
    fn move_aside(&self, destination: &Path, aside: &Path) -> anyhow::Result<()> {
        ShellBundleOps.move_aside(destination, aside)
    }

    fn place(&self, source: &Path, destination: &Path, copy: bool) -> anyhow::Result<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("Operation not permitted");
        }
        ShellBundleOps.place(source, destination, copy)
    }

    fn trash(&self, path: &Path, trash_dir: &Path) -> anyhow::Result<()> {
        ShellBundleOps.trash(path, trash_dir)
    }
}

pub fn services(
    ops: Box<dyn BundleOps>,
    privileged: FailingPrivileged,
    authorizer: ScriptedAuthorizer,
    bookmarks: MemoryBookmarks,
) -> InstallServices {
    InstallServices {
        ops,
        privileged: Box::new(privileged),
        authorizer: Box::new(authorizer),
        bookmarks: Box::new(bookmarks),
    }
}
