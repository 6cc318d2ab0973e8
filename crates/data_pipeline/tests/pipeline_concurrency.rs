//! Multi-threaded pipeline behaviour: backpressure, reset semantics,
//! cooperative shutdown, and teardown under load.

mod common;
use common::{counting_text_loader, make_locators};

use anyhow::Result;
use data_pipeline::pipeline::PipelineConfigBuilder;
use data_pipeline::{DataItem, DataPipeline, PipelineConfig};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

fn quick_config() -> PipelineConfigBuilder {
    PipelineConfig::builder()
        .loader_threads(3)
        .processor_threads(2)
        .worker_timeout(Duration::from_millis(5))
}

fn drain_texts(pipeline: &DataPipeline) -> Vec<String> {
    let mut texts = Vec::new();
    while let Some(batch) = pipeline.next_batch() {
        for item in batch {
            texts.push(item.as_text().expect("expected text item").to_string());
        }
    }
    texts
}

#[test]
fn test_backpressure_respects_buffer_bound() -> Result<()> {
    let (loader, _) = counting_text_loader();
    let pipeline = DataPipeline::new(
        quick_config()
            .locators(make_locators(12))
            .batch_size(2)
            .buffer_size(1)
            .loader_fn(loader)
            .processor_fn(|item| {
                thread::sleep(Duration::from_millis(5));
                Ok(item)
            })
            .build(),
    )?;

    let mut delivered = 0;
    while let Some(batch) = pipeline.next_batch() {
        let (loaded, processed) = pipeline.queue_depths();
        assert!(loaded <= 1, "loaded queue exceeded bound: {}", loaded);
        assert!(processed <= 1, "processed queue exceeded bound: {}", processed);
        delivered += batch.len();
        // A deliberately slow consumer keeps the upstream stages saturated.
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(delivered, 12);
    Ok(())
}

#[test]
fn test_reset_with_warm_cache_skips_loader() -> Result<()> {
    let (loader, calls) = counting_text_loader();
    let pipeline = DataPipeline::new(
        quick_config()
            .locators(make_locators(6))
            .batch_size(4)
            .cache_capacity(16)
            .loader_fn(loader)
            .build(),
    )?;

    let mut first_pass = drain_texts(&pipeline);
    assert_eq!(first_pass.len(), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(pipeline.cache_size(), 6);

    pipeline.reset()?;

    let mut second_pass = drain_texts(&pipeline);
    assert_eq!(second_pass.len(), 6);
    assert_eq!(
        calls.load(Ordering::SeqCst),
        6,
        "second pass must be served from cache"
    );

    first_pass.sort();
    second_pass.sort();
    assert_eq!(first_pass, second_pass);
    Ok(())
}

#[test]
fn test_reset_without_cache_reloads_everything() -> Result<()> {
    let (loader, calls) = counting_text_loader();
    let pipeline = DataPipeline::new(
        quick_config()
            .locators(make_locators(5))
            .batch_size(2)
            .loader_fn(loader)
            .build(),
    )?;

    assert_eq!(drain_texts(&pipeline).len(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    pipeline.reset()?;

    assert_eq!(drain_texts(&pipeline).len(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    Ok(())
}

#[test]
fn test_cache_survives_clear_only_on_request() -> Result<()> {
    let (loader, _) = counting_text_loader();
    let pipeline = DataPipeline::new(
        quick_config()
            .locators(make_locators(4))
            .batch_size(4)
            .cache_capacity(8)
            .loader_fn(loader)
            .build(),
    )?;

    drain_texts(&pipeline);
    assert_eq!(pipeline.cache_size(), 4);

    pipeline.reset()?;
    assert_eq!(pipeline.cache_size(), 4, "reset must not clear the cache");

    pipeline.clear_cache();
    assert_eq!(pipeline.cache_size(), 0);
    Ok(())
}

#[test]
fn test_stop_then_drain_returns_none() -> Result<()> {
    let pipeline = DataPipeline::new(
        quick_config()
            .locators(make_locators(50))
            .batch_size(5)
            .buffer_size(4)
            .loader_fn(|locator: &str| {
                thread::sleep(Duration::from_millis(1));
                Ok(DataItem::Text(locator.to_string()))
            })
            .build(),
    )?;

    assert!(pipeline.next_batch().is_some());
    pipeline.stop();

    // Already-processed items may still drain, but None must follow.
    let mut drained = 0;
    loop {
        match pipeline.next_batch() {
            Some(batch) => drained += batch.len(),
            None => break,
        }
        assert!(drained <= 50, "more items than locators");
    }
    Ok(())
}

#[test]
fn test_drop_joins_quickly_under_load() -> Result<()> {
    let pipeline = DataPipeline::new(
        quick_config()
            .locators(make_locators(500))
            .batch_size(10)
            .buffer_size(8)
            .loader_fn(|locator: &str| {
                thread::sleep(Duration::from_millis(1));
                Ok(DataItem::Text(locator.to_string()))
            })
            .build(),
    )?;

    assert!(pipeline.next_batch().is_some());
    assert!(pipeline.next_batch().is_some());

    let started = Instant::now();
    drop(pipeline);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "teardown took {:?}",
        started.elapsed()
    );
    Ok(())
}
