//! Visibility-gated thumbnail rendering.

mod support;

use edgequake_pdf2docx::{ThumbnailCache, ThumbnailConfig, ThumbnailState, VisibilityPort};
use support::{FakeDoc, FakeDocument};
use tokio_test::assert_ok;

fn strip_config() -> ThumbnailConfig {
    ThumbnailConfig {
        scale: 0.3,
        visibility_margin_px: 100.0,
        item_height_px: 100.0,
    }
}

fn loaded_pages(cache: &ThumbnailCache) -> Vec<usize> {
    cache
        .entries()
        .into_iter()
        .filter(|e| matches!(e.state, ThumbnailState::Loaded(_)))
        .map(|e| e.page)
        .collect()
}

#[tokio::test]
async fn only_visible_pages_render() {
    let (document, probe) = FakeDocument::handle(FakeDoc::pages(20));
    let mut cache = assert_ok!(ThumbnailCache::new(document, strip_config()));
    assert_eq!(cache.len(), 20);
    assert!(cache.entries().iter().all(|e| !e.visible));

    let started = cache.update_viewport(0.0, 500.0);
    assert_eq!(started, (1..=6).collect::<Vec<_>>());
    cache.settle().await;

    assert_eq!(loaded_pages(&cache), (1..=6).collect::<Vec<_>>());
    let mut rendered = probe.started_pages();
    rendered.sort_unstable();
    assert_eq!(rendered, (1..=6).collect::<Vec<_>>());
    for page in 7..=20 {
        assert_eq!(cache.entry(page).unwrap().state, ThumbnailState::Unseen);
    }
}

#[tokio::test]
async fn thumbnails_use_fixed_scale() {
    let (document, probe) = FakeDocument::handle(FakeDoc::pages(3));
    let mut cache = assert_ok!(ThumbnailCache::new(document, strip_config()));

    cache.notify_visible(2);
    cache.settle().await;

    assert_eq!(probe.started(), vec![(2, 0.3)]);
    let entry = cache.entry(2).unwrap();
    let raster = entry.raster().expect("loaded");
    assert_eq!((raster.width(), raster.height()), (18, 24));
}

#[tokio::test]
async fn a_thumbnail_renders_at_most_once() {
    let (document, probe) = FakeDocument::handle(FakeDoc::pages(20));
    let mut cache = assert_ok!(ThumbnailCache::new(document, strip_config()));

    cache.update_viewport(0.0, 500.0);
    // Same page reported again while loading, and again after loading.
    assert!(!cache.became_visible(3));
    cache.settle().await;
    assert!(!cache.became_visible(3));
    assert!(cache.update_viewport(0.0, 500.0).is_empty());
    cache.settle().await;

    assert_eq!(probe.started().len(), 6);
}

#[tokio::test]
async fn scrolling_reveals_more_pages() {
    let (document, _probe) = FakeDocument::handle(FakeDoc::pages(20));
    let mut cache = assert_ok!(ThumbnailCache::new(document, strip_config()));
    cache.update_viewport(0.0, 500.0);

    let started = cache.update_viewport(1000.0, 500.0);
    assert_eq!(started, (10..=16).collect::<Vec<_>>());
    cache.settle().await;

    for page in 7..=9 {
        assert_eq!(cache.entry(page).unwrap().state, ThumbnailState::Unseen);
    }
    assert_eq!(cache.requested_pages().len(), 13);
}

#[tokio::test]
async fn selecting_scrolls_the_thumbnail_into_view() {
    let (document, _probe) = FakeDocument::handle(FakeDoc::pages(20));
    let mut cache = assert_ok!(ThumbnailCache::new(document, strip_config()));
    cache.update_viewport(0.0, 500.0);

    assert_eq!(cache.select(3), None);
    assert_eq!(cache.selected(), Some(3));

    // Page 20 sits at 1900..2000: scroll so its bottom meets the viewport's.
    assert_eq!(cache.select(20), Some(1500.0));
    assert_eq!(cache.entry(20).unwrap().state, ThumbnailState::Loading);

    assert_eq!(cache.select(1), Some(0.0));
    assert_eq!(cache.select(0), None);
    assert_eq!(cache.select(21), None);
    assert_eq!(cache.selected(), Some(1));
    cache.settle().await;
}

#[tokio::test]
async fn failed_thumbnail_is_not_retried() {
    let (document, probe) = FakeDocument::handle(FakeDoc::pages(2));
    probe.fail_page(1);
    let mut cache = assert_ok!(ThumbnailCache::new(document, strip_config()));

    cache.notify_visible(1);
    cache.settle().await;
    assert!(matches!(
        cache.entry(1).unwrap().state,
        ThumbnailState::Failed(ref msg) if msg.contains("Page 1")
    ));

    probe.heal_all();
    assert!(!cache.notify_visible(1));
    cache.settle().await;
    assert_eq!(probe.started().len(), 1);
}

#[tokio::test]
async fn out_of_range_pages_are_ignored() {
    let (document, probe) = FakeDocument::handle(FakeDoc::pages(2));
    let mut cache = assert_ok!(ThumbnailCache::new(document, strip_config()));

    assert!(!cache.notify_visible(0));
    assert!(!cache.notify_visible(3));
    cache.settle().await;
    assert!(probe.started().is_empty());
}

#[test]
fn unusable_geometry_is_rejected() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();
    for config in [
        ThumbnailConfig {
            scale: 0.0,
            ..strip_config()
        },
        ThumbnailConfig {
            scale: -1.0,
            ..strip_config()
        },
        ThumbnailConfig {
            item_height_px: 0.0,
            ..strip_config()
        },
    ] {
        let (document, _probe) = FakeDocument::handle(FakeDoc::pages(2));
        let err = ThumbnailCache::new(document, config.clone())
            .err()
            .expect("config rejected");
        assert_eq!(err.kind(), "invalid_config", "{config:?}");
    }
}

#[test]
fn construction_outside_a_runtime_needs_an_explicit_handle() {
    let (document, _probe) = FakeDocument::handle(FakeDoc::pages(2));
    assert!(ThumbnailCache::new(document.clone(), strip_config()).is_err());

    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut cache = assert_ok!(ThumbnailCache::with_runtime(
        document,
        strip_config(),
        rt.handle().clone()
    ));
    // Visibility reported from this plain thread.
    assert!(cache.notify_visible(2));
    rt.block_on(cache.settle());
    assert!(cache.entry(2).unwrap().raster().is_some());
}
