//! Update archive extraction.
//!
//! Unpacks the zip into a fresh scratch directory and finds the one bundle
//! at its top level. Nested bundles (helpers, plug-ins) are never considered.

use crate::error::{Result, SvgPadError};
use crate::progress::{Progress, ProgressCallback, ProgressEvent};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Unpacks update archives under a scratch root.
pub struct ArchiveExtractor {
    scratch_root: PathBuf,
    extension: String,
}

impl ArchiveExtractor {
    /// Create an extractor that looks for `.<extension>` bundles.
    pub fn new(scratch_root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            extension: extension.into(),
        }
    }

    /// Unpack `archive` into a new scratch directory and return the absolute
    /// path of the single top-level bundle.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::Archive`] if the archive is unreadable,
    /// [`SvgPadError::BundleNotFound`] if no bundle is at the top level, and
    /// [`SvgPadError::AmbiguousBundle`] if more than one is.
    pub fn extract(&self, archive: &Path, progress: Option<&ProgressCallback>) -> Result<PathBuf> {
        let scratch = self.fresh_scratch_dir()?;
        tracing::info!("extracting {} into {}", archive.display(), scratch.display());

        unpack_zip(archive, &scratch, progress)?;
        let bundle = locate_bundle(&scratch, &self.extension)?;
        let bundle = bundle.canonicalize().unwrap_or(bundle);

        tracing::info!("found bundle {}", bundle.display());
        Ok(bundle)
    }

    fn fresh_scratch_dir(&self) -> Result<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let dir = self
            .scratch_root
            .join(format!("extract-{stamp}-{}", std::process::id()));
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Find exactly one `.<extension>` directory directly inside `dir`.
///
/// # Errors
///
/// Returns [`SvgPadError::BundleNotFound`] or [`SvgPadError::AmbiguousBundle`].
pub fn locate_bundle(dir: &Path, extension: &str) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_bundle_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_bundle_dir && path.extension().is_some_and(|e| e == extension) {
            candidates.push(path);
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(SvgPadError::BundleNotFound {
            dir: dir.to_owned(),
            extension: extension.to_owned(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(SvgPadError::AmbiguousBundle {
            dir: dir.to_owned(),
            candidates,
        }),
    }
}

fn unpack_zip(archive: &Path, dest: &Path, progress: Option<&ProgressCallback>) -> Result<()> {
    let file = File::open(archive).map_err(|e| {
        SvgPadError::Archive(format!("cannot open {}: {e}", archive.display()))
    })?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| SvgPadError::Archive(format!("{} is not a zip archive: {e}", archive.display())))?;

    let total = zip.len() as u64;
    // Directory modes are applied last so read-only directories can still be filled.
    let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| SvgPadError::Archive(format!("corrupt entry #{i}: {e}")))?;
        unpack_entry(&mut entry, dest, &mut dir_modes)?;

        if let Some(cb) = progress {
            cb(ProgressEvent::ExtractProgress(Progress::new(i as u64 + 1, total)));
        }
    }

    for (dir, mode) in dir_modes.into_iter().rev() {
        set_mode(&dir, mode)?;
    }
    Ok(())
}

/// Write one entry under `dest`. Entries that would land outside it are
/// logged and skipped.
fn unpack_entry<R: io::Read>(
    entry: &mut zip::read::ZipFile<'_, R>,
    dest: &Path,
    dir_modes: &mut Vec<(PathBuf, u32)>,
) -> Result<()> {
    let Some(relative) = entry.enclosed_name() else {
        tracing::warn!("skipping unsafe archive entry {:?}", entry.name());
        return Ok(());
    };
    if let Some(link) = symlink_on_path(dest, &relative) {
        tracing::warn!(
            "skipping archive entry {:?} written through symlink {}",
            entry.name(),
            link.display()
        );
        return Ok(());
    }
    let out = dest.join(&relative);
    let mode = entry.unix_mode();

    if entry.is_dir() {
        fs::create_dir_all(&out)?;
        if let Some(mode) = mode {
            dir_modes.push((out, mode));
        }
        return Ok(());
    }

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
        let mut target = String::new();
        io::Read::read_to_string(entry, &mut target)?;
        if !link_stays_inside(&relative, Path::new(&target)) {
            tracing::warn!(
                "skipping symlink {:?} pointing outside the archive: {target}",
                entry.name()
            );
            return Ok(());
        }
        make_symlink(&target, &out)?;
    } else {
        let mut outfile = File::create(&out)?;
        io::copy(entry, &mut outfile)?;
        if let Some(mode) = mode {
            set_mode(&out, mode)?;
        }
    }
    Ok(())
}

/// First already-extracted symlink among `relative` and its ancestors.
fn symlink_on_path(dest: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = dest.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Some(current),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

/// Whether a link at `link` (relative to the extraction root) resolving to
/// `target` stays within that root. Checked lexically.
fn link_stays_inside(link: &Path, target: &Path) -> bool {
    use std::path::Component;

    let mut depth: usize = 0;
    let parent = link.parent().unwrap_or(Path::new(""));
    for component in parent.components().chain(target.components()) {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

#[cfg(unix)]
fn make_symlink(target: &str, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_symlink(target: &str, link: &Path) -> io::Result<()> {
    fs::write(link, target)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
