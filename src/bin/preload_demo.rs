//! Refresh the catalog of a content directory and preload its configured groups.
//!
//! Usage: `preload_demo <content-root> [remote-root] [config.json]`

use group_assets::prelude::*;
use group_assets::init_logging;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn pump_until(manager: &mut AssetManager, done: &Rc<Cell<bool>>) {
    while !done.get() {
        manager.update_timeout(Duration::from_millis(50));
    }
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(root) = args.next() else {
        eprintln!("usage: preload_demo <content-root> [remote-root] [config.json]");
        std::process::exit(2);
    };
    let remote = args.next();
    let config = match args.next() {
        Some(path) => AssetConfig::from_path(path)?,
        None => AssetConfig::default(),
    };
    let _log = init_logging(&config.log)?;

    let mut store = DirectoryContentStore::new(&root);
    if let Some(remote) = remote {
        store = store.with_remote(remote);
    }
    let mut manager = AssetManager::with_config(Arc::new(store), config);
    let start = Instant::now();

    let refreshed = Rc::new(Cell::new(false));
    let flag = refreshed.clone();
    manager.refresh_catalog(move || flag.set(true), |status| println!("{status}"));
    pump_until(&mut manager, &refreshed);
    println!("Catalog ready in {:?}", start.elapsed());

    let preloaded = Rc::new(Cell::new(false));
    let flag = preloaded.clone();
    manager.preload_configured(
        |progress| println!("Preloading... {:.0}%", progress * 100.0),
        move || flag.set(true),
    );
    pump_until(&mut manager, &preloaded);

    let stats = manager.stats();
    println!(
        "Preloaded {} groups ({} bytes, {} installs) in {:?}",
        manager.cache().len(),
        manager.cache().memory_usage(),
        stats.installs,
        start.elapsed()
    );
    for group in manager.cache().group_names() {
        let objects = manager.cache().get(group).map_or(0, |record| record.len());
        println!("  {group}: {objects} objects");
    }
    Ok(())
}
