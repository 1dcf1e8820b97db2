use crate::browser::BrowserSession;
use crate::dom::{SnapshotStage, SnapshotStore};
use crate::errors::Result;

/// Reads the live document into the given stage slot, so diagnostics can
/// run against pages the executor just drove.
pub async fn capture_snapshot<S: BrowserSession>(
    session: &S,
    store: &mut SnapshotStore,
    stage: SnapshotStage,
) -> Result<()> {
    let html = session.page_html().await?;
    store.record(stage, &html);
    Ok(())
}

/// Refreshes the `current` slot, the one resolution targets.
pub async fn capture_current<S: BrowserSession>(
    session: &S,
    store: &mut SnapshotStore,
) -> Result<()> {
    capture_snapshot(session, store, SnapshotStage::Current).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowser;

    #[tokio::test]
    async fn captured_pages_land_in_the_requested_slot() {
        let fake = FakeBrowser::new()
            .with_html("<html><body><div id=\"app\"><h1>Hi</h1></div></body></html>");
        let mut store = SnapshotStore::new("run-7");

        capture_snapshot(&fake, &mut store, SnapshotStage::Before)
            .await
            .unwrap();
        capture_current(&fake, &mut store).await.unwrap();

        let before = store.html(SnapshotStage::Before).unwrap();
        assert!(before.contains("<h1>Hi</h1>"));
        assert!(before.contains("run-7"));
        assert!(store.html(SnapshotStage::Current).is_some());
        assert!(store.html(SnapshotStage::After).is_none());
    }
}
