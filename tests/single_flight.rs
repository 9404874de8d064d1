use group_assets::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

fn sprite(name: &str) -> AssetObject {
    AssetObject::from_asset(name, Sprite::new(Rect::new(0.0, 0.0, 32.0, 32.0)))
}

fn settle(manager: &mut AssetManager) {
    for _ in 0..32 {
        if !manager.has_pending_work() {
            return;
        }
        manager.update();
    }
    panic!("manager still has pending work");
}

#[test]
fn test_concurrent_requests_share_one_fetch() {
    let store = MemoryContentStore::deferred().with_group("common", vec![sprite("x")]);
    let mut manager = AssetManager::new(Arc::new(store.clone()));
    let results = Rc::new(RefCell::new(Vec::new()));

    for i in 0..5 {
        let sink = results.clone();
        manager.ensure_loaded("common", move |ok| sink.borrow_mut().push((i, ok)));
    }
    assert_eq!(store.fetch_count("common"), 1);
    assert!(results.borrow().is_empty());

    store.flush();
    manager.update();

    // Waiters run in registration order.
    assert_eq!(
        *results.borrow(),
        vec![(0, true), (1, true), (2, true), (3, true), (4, true)]
    );
    assert_eq!(store.fetch_count("common"), 1);
}

#[test]
fn test_failed_fetch_notifies_every_waiter() {
    let store = MemoryContentStore::deferred();
    let mut manager = AssetManager::new(Arc::new(store.clone()));
    let results = Rc::new(RefCell::new(Vec::new()));

    for _ in 0..3 {
        let sink = results.clone();
        manager.ensure_loaded("missing", move |ok| sink.borrow_mut().push(ok));
    }
    store.flush();
    manager.update();

    assert_eq!(*results.borrow(), vec![false, false, false]);
    assert!(!manager.exists("missing"));
    assert!(!manager.is_loading("missing"));
}

#[test]
fn test_resident_group_is_not_fetched_again() {
    let store = MemoryContentStore::new().with_group("common", vec![sprite("x")]);
    let mut manager = AssetManager::new(Arc::new(store.clone()));
    manager.ensure_loaded("common", |_| {});
    manager.update();

    let results = Rc::new(RefCell::new(Vec::new()));
    for _ in 0..3 {
        let sink = results.clone();
        manager.ensure_loaded("common", move |ok| sink.borrow_mut().push(ok));
    }
    assert_eq!(*results.borrow(), vec![true, true, true]);
    assert_eq!(store.fetch_count("common"), 1);

    manager.remove("common");
    assert!(manager.find::<Sprite>("common/x").is_none());
    manager.ensure_loaded("common", |_| {});
    manager.update();
    assert_eq!(store.fetch_count("common"), 2);
    assert!(manager.find::<Sprite>("common/x").is_some());
}

#[test]
fn test_find_contract() {
    let store = MemoryContentStore::new().with_group(
        "common",
        vec![
            sprite("x"),
            AssetObject::from_asset("readme", TextAsset::new("notes".to_string())),
        ],
    );
    let mut manager = AssetManager::new(Arc::new(store));

    assert!(manager.find::<Sprite>("common/x").is_none());
    manager.ensure_loaded("common", |_| {});
    manager.update();

    assert!(manager.find::<Sprite>("common/x").is_some());
    assert!(manager.find::<Sprite>("common/readme").is_none());
    assert!(manager.find::<Texture>("common/x").is_none());
    assert!(manager.find::<Sprite>("common/nested/x").is_some());
    assert!(manager.find_in::<TextAsset>("common", "readme").is_some());
    assert_eq!(
        manager.find_object("common/readme").map(|o| o.kind()),
        Some(AssetKind::Text)
    );
}

#[test]
fn test_retry_until_success() {
    let store = MemoryContentStore::new().with_group("common", vec![sprite("x")]);
    store.fail_next_fetches("common", 2, "connection reset");
    let config = AssetConfig::default().with_retry(RetryPolicy::bounded(3, 0));
    let mut manager = AssetManager::with_config(Arc::new(store.clone()), config);
    let results = Rc::new(RefCell::new(Vec::new()));

    let sink = results.clone();
    manager.ensure_loaded("common", move |ok| sink.borrow_mut().push(ok));
    settle(&mut manager);

    assert_eq!(*results.borrow(), vec![true]);
    assert_eq!(store.fetch_count("common"), 3);
    assert!(manager.exists("common"));
}

#[test]
fn test_retry_gives_up_after_max_attempts() {
    let store = MemoryContentStore::new().with_group("common", vec![sprite("x")]);
    store.fail_next_fetches("common", 5, "timeout");
    let config = AssetConfig::default().with_retry(RetryPolicy::bounded(2, 0));
    let mut manager = AssetManager::with_config(Arc::new(store.clone()), config);
    let results = Rc::new(RefCell::new(Vec::new()));

    let sink = results.clone();
    manager.ensure_loaded("common", move |ok| sink.borrow_mut().push(ok));
    settle(&mut manager);

    assert_eq!(*results.borrow(), vec![false]);
    assert_eq!(store.fetch_count("common"), 2);
    assert_eq!(manager.coordinator().fetches_issued(), 2);
}

#[test]
fn test_no_retry_by_default() {
    let store = MemoryContentStore::new().with_group("common", vec![sprite("x")]);
    store.fail_next_fetches("common", 1, "timeout");
    let mut manager = AssetManager::new(Arc::new(store.clone()));
    let results = Rc::new(RefCell::new(Vec::new()));

    let sink = results.clone();
    manager.ensure_loaded("common", move |ok| sink.borrow_mut().push(ok));
    settle(&mut manager);
    assert_eq!(*results.borrow(), vec![false]);

    // A fresh request starts a fresh fetch.
    let sink = results.clone();
    manager.ensure_loaded("common", move |ok| sink.borrow_mut().push(ok));
    settle(&mut manager);
    assert_eq!(*results.borrow(), vec![false, true]);
    assert_eq!(store.fetch_count("common"), 2);
}
