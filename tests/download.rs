use group_assets::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

fn store() -> MemoryContentStore {
    let object = AssetObject::from_asset("bg", Texture::new(1, 1, vec![0, 0, 0, 255]));
    MemoryContentStore::new()
        .with_group("common", vec![object.clone()])
        .with_group("level1", vec![object])
        .with_remote_bytes("level1", 500)
}

#[test]
fn test_check_downloaded() {
    let mut manager = AssetManager::new(Arc::new(store()));
    let states = Rc::new(RefCell::new(Vec::new()));

    for group in ["common", "level1", "unknown"] {
        let sink = states.clone();
        manager.check_downloaded(group, move |state| sink.borrow_mut().push(state));
    }
    manager.update();

    let states = states.borrow();
    assert_eq!(
        states[0],
        Ok(DownloadState {
            is_local: true,
            remaining_bytes: 0
        })
    );
    assert_eq!(
        states[1],
        Ok(DownloadState {
            is_local: false,
            remaining_bytes: 500
        })
    );
    assert!(matches!(states[2], Err(AssetError::SizeQueryFailed { .. })));
    // Probing never loads anything.
    assert!(!manager.exists("common"));
}

#[test]
fn test_load_with_download_takes_download_path() {
    let store = store();
    let mut manager = AssetManager::new(Arc::new(store.clone()));
    let progress = Rc::new(RefCell::new(Vec::new()));
    let loaded = Rc::new(Cell::new(None));

    let sink = progress.clone();
    let result = loaded.clone();
    manager.load_with_download(
        "level1",
        move |p| sink.borrow_mut().push(p),
        move |ok| result.set(Some(ok)),
    );
    while loaded.get().is_none() {
        assert!(manager.update() > 0);
    }

    assert_eq!(loaded.get(), Some(true));
    assert_eq!(*progress.borrow(), vec![0.25, 0.5, 0.75, 1.0]);
    assert!(manager.exists("level1"));
    assert_eq!(store.fetch_count("level1"), 1);

    // Now local: no more download progress.
    manager.remove("level1");
    let sink = progress.clone();
    let result = loaded.clone();
    loaded.set(None);
    manager.load_with_download(
        "level1",
        move |p| sink.borrow_mut().push(p),
        move |ok| result.set(Some(ok)),
    );
    while loaded.get().is_none() {
        manager.update();
    }
    assert_eq!(loaded.get(), Some(true));
    assert_eq!(progress.borrow().len(), 4);
}

#[test]
fn test_load_with_download_local_group() {
    let mut manager = AssetManager::new(Arc::new(store()));
    let progress = Rc::new(Cell::new(0));
    let loaded = Rc::new(Cell::new(None));

    let counter = progress.clone();
    let result = loaded.clone();
    manager.load_with_download(
        "common",
        move |_| counter.set(counter.get() + 1),
        move |ok| result.set(Some(ok)),
    );
    while loaded.get().is_none() {
        manager.update();
    }
    assert_eq!(loaded.get(), Some(true));
    assert_eq!(progress.get(), 0);
}

#[test]
fn test_load_with_download_probe_failure() {
    let store = store();
    let mut manager = AssetManager::new(Arc::new(store.clone()));
    let loaded = Rc::new(Cell::new(None));

    let result = loaded.clone();
    manager.load_with_download("unknown", |_| {}, move |ok| result.set(Some(ok)));
    manager.update();
    assert_eq!(loaded.get(), Some(false));
    assert_eq!(store.fetch_count("unknown"), 0);
}

#[test]
fn test_download_failure_skips_load() {
    let store = store();
    let mut manager = AssetManager::new(Arc::new(store.clone()));
    let loaded = Rc::new(Cell::new(None));

    let result = loaded.clone();
    manager.download_then_load("unknown", |_| {}, move |ok| result.set(Some(ok)));
    manager.update();

    assert_eq!(loaded.get(), Some(false));
    assert_eq!(store.fetch_count("unknown"), 0);
    assert!(!manager.has_pending_work());
}

#[test]
fn test_download_group_does_not_load() {
    let store = store();
    let mut manager = AssetManager::new(Arc::new(store.clone()));
    let downloaded = Rc::new(Cell::new(None));

    let result = downloaded.clone();
    manager.download_group("level1", move |ok| result.set(Some(ok)));
    manager.update();

    assert_eq!(downloaded.get(), Some(true));
    assert!(!manager.exists("level1"));
    assert_eq!(store.fetch_count("level1"), 0);

    let state = Rc::new(RefCell::new(None));
    let sink = state.clone();
    manager.check_downloaded("level1", move |s| *sink.borrow_mut() = Some(s));
    manager.update();
    assert_eq!(
        state.borrow_mut().take(),
        Some(Ok(DownloadState::from_remaining(0)))
    );
}
