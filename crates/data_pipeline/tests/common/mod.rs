use anyhow::Result;
use data_pipeline::DataItem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Synthetic locator names; nothing on disk backs them.
pub fn make_locators(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("item_{:03}.txt", i)).collect()
}

/// Loader that fabricates a text item per locator and counts invocations.
pub fn counting_text_loader() -> (
    impl Fn(&str) -> Result<DataItem> + Send + Sync + Clone + 'static,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = move |locator: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(DataItem::Text(format!("payload:{}", locator)))
    };
    (loader, calls)
}

/// Payloads the counting loader would produce for `make_locators(count)`.
pub fn expected_payloads(count: usize) -> Vec<String> {
    make_locators(count)
        .into_iter()
        .map(|locator| format!("payload:{}", locator))
        .collect()
}
