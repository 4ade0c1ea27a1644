//! Installer escalation tests.
//!
//! Real file operations run against temp directories; the privileged runner,
//! folder picker, and bookmark store are fakes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use std::path::Path;
use svgpad::update::{InstallOptions, InstallTarget, Installer, ShellBundleOps};
use svgpad::{InstallTier, Preferences, SvgPadError};

const PID: u32 = 4242;

fn options(trash: Option<&Path>) -> InstallOptions {
    InstallOptions {
        pid: PID,
        trash_dir: trash.map(Path::to_path_buf),
        folder_prompt_attempts: 2,
    }
}

#[test]
fn name_mismatch_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "Other.app", "new");
    let apps = tmp.path().join("Applications");
    let destination = make_bundle(&apps, "SVGPad.app", "old");

    let privileged = FailingPrivileged::default();
    let commands = privileged.commands.clone();
    let authorizer = ScriptedAuthorizer::default();
    let requests = authorizer.requests.clone();
    let services = services(
        Box::new(ShellBundleOps),
        privileged,
        authorizer,
        MemoryBookmarks::default(),
    );
    let mut prefs = Preferences::in_memory();

    let err = Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap_err();

    assert!(matches!(err, SvgPadError::NameMismatch { .. }));
    assert_eq!(read_marker(&destination), "old");
    assert_eq!(read_marker(&source), "new");
    assert!(aside_siblings(&apps).is_empty());
    assert!(commands.lock().unwrap().is_empty());
    assert!(requests.lock().unwrap().is_empty());
}

#[test]
fn fresh_install_succeeds_without_escalation() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    std::fs::create_dir_all(&apps).unwrap();
    let destination = apps.join("SVGPad.app");

    let privileged = FailingPrivileged::default();
    let commands = privileged.commands.clone();
    let services = services(
        Box::new(ShellBundleOps),
        privileged,
        ScriptedAuthorizer::default(),
        MemoryBookmarks::default(),
    );
    let mut prefs = Preferences::in_memory();

    let installed = Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap();

    assert_eq!(installed, destination);
    assert_eq!(read_marker(&destination), "new");
    assert!(!source.exists());
    assert!(aside_siblings(&apps).is_empty());
    assert!(commands.lock().unwrap().is_empty());
}

#[test]
fn replacing_moves_old_bundle_to_trash() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    let destination = make_bundle(&apps, "SVGPad.app", "old");
    let trash = tmp.path().join("Trash");
    std::fs::create_dir_all(&trash).unwrap();

    let services = services(
        Box::new(ShellBundleOps),
        FailingPrivileged::default(),
        ScriptedAuthorizer::default(),
        MemoryBookmarks::default(),
    );
    let mut prefs = Preferences::in_memory();

    Installer::new(&services, &mut prefs, options(Some(&trash)))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap();

    assert_eq!(read_marker(&destination), "new");
    assert!(aside_siblings(&apps).is_empty());
    assert_eq!(read_marker(&trash.join("SVGPad (4242).app")), "old");
}

#[test]
fn granted_folder_recursion_installs_under_scope() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    // The parent does not exist yet, so both the plain move and the
    // (failing) privileged move miss; the picker creates it on grant.
    let granted = tmp.path().join("Granted");
    let destination = granted.join("SVGPad.app");

    let privileged = FailingPrivileged::default();
    let commands = privileged.commands.clone();
    let authorizer = ScriptedAuthorizer::answering(vec![Some(granted.clone())]);
    let requests = authorizer.requests.clone();
    let bookmarks = MemoryBookmarks::default();
    let started = bookmarks.started.clone();
    let stopped = bookmarks.stopped.clone();
    let services = services(Box::new(ShellBundleOps), privileged, authorizer, bookmarks);
    let mut prefs = Preferences::in_memory();

    let installed = Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap();

    assert_eq!(installed, destination);
    assert_eq!(read_marker(&destination), "new");
    assert_eq!(*requests.lock().unwrap(), vec![0]);
    assert_eq!(commands.lock().unwrap().len(), 1);
    assert_eq!(*started.lock().unwrap(), vec![granted.clone()]);
    assert_eq!(*stopped.lock().unwrap(), vec![granted.clone()]);
    assert!(prefs.bookmark(&granted).is_some());
}

#[test]
fn partial_failure_leaves_old_bundle_aside() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    let destination = make_bundle(&apps, "SVGPad.app", "old");

    // Placement always fails; the picker is cancelled.
    let services = services(
        Box::new(FlakyOps::failing(u32::MAX)),
        FailingPrivileged::default(),
        ScriptedAuthorizer::default(),
        MemoryBookmarks::default(),
    );
    let mut prefs = Preferences::in_memory();

    let err = Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap_err();

    let failure = match err {
        SvgPadError::Escalation(failure) => failure,
        other => panic!("expected escalation failure, got {other:?}"),
    };
    assert_eq!(failure.errors().len(), 3);
    assert!(matches!(
        failure.errors()[0],
        SvgPadError::Permission {
            tier: InstallTier::Unprivileged,
            ..
        }
    ));
    assert!(matches!(
        failure.errors()[1],
        SvgPadError::Permission {
            tier: InstallTier::Privileged,
            ..
        }
    ));
    assert!(matches!(failure.last(), Some(SvgPadError::Cancelled)));

    assert!(!destination.exists());
    assert_eq!(read_marker(&apps.join("SVGPad (4242).app")), "old");
    assert_eq!(read_marker(&source), "new");
}

#[test]
fn cached_bookmark_skips_picker() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    std::fs::create_dir_all(&apps).unwrap();
    let destination = apps.join("SVGPad.app");

    let authorizer = ScriptedAuthorizer::default();
    let requests = authorizer.requests.clone();
    let bookmarks = MemoryBookmarks::default();
    let started = bookmarks.started.clone();
    let services = services(
        Box::new(FlakyOps::failing(1)),
        FailingPrivileged::default(),
        authorizer,
        bookmarks,
    );
    let mut prefs = Preferences::in_memory();
    prefs
        .set_bookmark(&apps, apps.to_string_lossy().as_bytes())
        .unwrap();

    Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap();

    assert_eq!(read_marker(&destination), "new");
    assert!(requests.lock().unwrap().is_empty());
    assert_eq!(*started.lock().unwrap(), vec![apps.clone()]);
}

#[test]
fn stale_bookmark_is_replaced_through_picker() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    std::fs::create_dir_all(&apps).unwrap();
    let destination = apps.join("SVGPad.app");

    let authorizer = ScriptedAuthorizer::answering(vec![Some(apps.clone())]);
    let requests = authorizer.requests.clone();
    let bookmarks = MemoryBookmarks {
        stale: true,
        ..Default::default()
    };
    let services = services(
        Box::new(FlakyOps::failing(1)),
        FailingPrivileged::default(),
        authorizer,
        bookmarks,
    );
    let mut prefs = Preferences::in_memory();
    prefs.set_bookmark(&apps, b"stale").unwrap();

    Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap();

    assert_eq!(read_marker(&destination), "new");
    assert_eq!(*requests.lock().unwrap(), vec![0]);
    assert_eq!(
        prefs.bookmark(&apps),
        Some(apps.to_string_lossy().into_owned().into_bytes())
    );
}

#[test]
fn wrong_folder_selection_is_reprompted() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    std::fs::create_dir_all(&apps).unwrap();
    let destination = apps.join("SVGPad.app");

    let authorizer = ScriptedAuthorizer::answering(vec![
        Some(tmp.path().join("Desktop")),
        Some(apps.clone()),
    ]);
    let requests = authorizer.requests.clone();
    let services = services(
        Box::new(FlakyOps::failing(1)),
        FailingPrivileged::default(),
        authorizer,
        MemoryBookmarks::default(),
    );
    let mut prefs = Preferences::in_memory();

    Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap();

    assert_eq!(*requests.lock().unwrap(), vec![0, 1]);
    assert_eq!(read_marker(&destination), "new");
}

#[test]
fn wrong_folder_every_time_fails_the_tier() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    std::fs::create_dir_all(&apps).unwrap();
    let destination = apps.join("SVGPad.app");
    let desktop = tmp.path().join("Desktop");

    let authorizer =
        ScriptedAuthorizer::answering(vec![Some(desktop.clone()), Some(desktop.clone())]);
    let requests = authorizer.requests.clone();
    let services = services(
        Box::new(FlakyOps::failing(1)),
        FailingPrivileged::default(),
        authorizer,
        MemoryBookmarks::default(),
    );
    let mut prefs = Preferences::in_memory();

    let err = Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap_err();

    let failure = match err {
        SvgPadError::Escalation(failure) => failure,
        other => panic!("expected escalation failure, got {other:?}"),
    };
    assert!(matches!(
        failure.last(),
        Some(SvgPadError::Permission {
            tier: InstallTier::ScopedFolder,
            ..
        })
    ));
    assert_eq!(requests.lock().unwrap().len(), 2);
    assert!(!destination.exists());
}

#[test]
fn scoped_retry_does_not_prompt_again() {
    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    std::fs::create_dir_all(&apps).unwrap();
    let destination = apps.join("SVGPad.app");

    let privileged = FailingPrivileged::default();
    let commands = privileged.commands.clone();
    let authorizer = ScriptedAuthorizer::answering(vec![Some(apps.clone()), Some(apps.clone())]);
    let requests = authorizer.requests.clone();
    let services = services(
        Box::new(FlakyOps::failing(u32::MAX)),
        privileged,
        authorizer,
        MemoryBookmarks::default(),
    );
    let mut prefs = Preferences::in_memory();

    let err = Installer::new(&services, &mut prefs, options(None))
        .install(&InstallTarget::new(&source, &destination))
        .unwrap_err();

    let outer = match err {
        SvgPadError::Escalation(outer) => outer,
        other => panic!("expected escalation failure, got {other:?}"),
    };
    let inner = match outer.last() {
        Some(SvgPadError::Escalation(inner)) => inner,
        other => panic!("expected nested escalation, got {other:?}"),
    };
    assert!(matches!(
        inner.last(),
        Some(SvgPadError::Permission {
            tier: InstallTier::ScopedFolder,
            ..
        })
    ));
    assert_eq!(*requests.lock().unwrap(), vec![0]);
    assert_eq!(commands.lock().unwrap().len(), 2);
}

#[test]
fn progress_reports_each_tier_tried() {
    use std::sync::{Arc, Mutex};
    use svgpad::{Progress, ProgressCallback, ProgressEvent};

    let tmp = tempfile::tempdir().unwrap();
    let source = make_bundle(&tmp.path().join("new"), "SVGPad.app", "new");
    let apps = tmp.path().join("Applications");
    std::fs::create_dir_all(&apps).unwrap();
    let destination = apps.join("SVGPad.app");

    let services = services(
        Box::new(FlakyOps::failing(1)),
        FailingPrivileged::default(),
        ScriptedAuthorizer::answering(vec![Some(apps.clone())]),
        MemoryBookmarks::default(),
    );
    let mut prefs = Preferences::in_memory();

    let seen: Arc<Mutex<Vec<Progress>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Box::new(move |event| {
        if let ProgressEvent::InstallProgress(p) = event {
            sink.lock().unwrap().push(p);
        }
    });

    Installer::new(&services, &mut prefs, options(None))
        .with_progress(&callback)
        .install(&InstallTarget::new(&source, &destination))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen[..3],
        [Progress::new(0, 3), Progress::new(1, 3), Progress::new(2, 3)]
    );
}
