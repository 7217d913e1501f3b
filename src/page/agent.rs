//! Page-side capture and comparison.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::capture::{ImageCapturer, SelectedRegion, SelectionGesture};
use crate::compare::compare_data_urls;
use crate::config::DEFAULT_SIMILARITY_THRESHOLD;
use crate::error::{Error, Result};
use crate::protocol::{CaptureReply, CheckScreenshotReply, CompareReply, Message};
use crate::storage::StateStore;

use super::environment::{PageEnvironment, RuntimePort};

// ============================================================================
// Constants
// ============================================================================

/// Hosts known to block the rendering engine.
const RESTRICTED_HOSTS: &[&str] = &["youtube.com", "google.com"];

/// Warning sent to the panel from restricted pages.
pub const RESTRICTED_SITE_WARNING: &str = "This site has security restrictions that may limit \
     the extension. Try another site.";

// ============================================================================
// PageAgent
// ============================================================================

/// The agent injected into a monitored page.
///
/// Answers `captureArea`, `compareArea`, `checkScreenshot`,
/// `updateThreshold`, `playNotificationSound` and `startSelection`, and
/// reports `selectionComplete`, `screenshotError` and `changeDetected`
/// through its [`RuntimePort`].
pub struct PageAgent {
    state: StateStore,
    capturer: ImageCapturer,
    env: Arc<dyn PageEnvironment>,
    port: Arc<dyn RuntimePort>,
    threshold: RwLock<f64>,
}

impl fmt::Debug for PageAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAgent")
            .field("capturer", &self.capturer)
            .field("threshold", &*self.threshold.read())
            .finish_non_exhaustive()
    }
}

impl PageAgent {
    /// Creates an agent. The capturer is labelled with the page host.
    #[must_use]
    pub fn new(
        state: StateStore,
        capturer: ImageCapturer,
        env: Arc<dyn PageEnvironment>,
        port: Arc<dyn RuntimePort>,
    ) -> Self {
        let host = env.url().and_then(|url| url.host_str().map(str::to_owned));
        let capturer = match host {
            Some(host) => capturer.with_host(host),
            None => capturer,
        };

        Self {
            state,
            capturer,
            env,
            port,
            threshold: RwLock::new(DEFAULT_SIMILARITY_THRESHOLD),
        }
    }

    /// Threshold currently applied to comparisons.
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f64 {
        *self.threshold.read()
    }

    /// Replaces the comparison threshold.
    pub fn set_threshold(&self, threshold: f64) {
        *self.threshold.write() = threshold;
        info!(threshold, "Threshold updated");
    }

    async fn report(&self, message: Message) {
        let action = message.action();
        if let Err(e) = self.port.send(message).await {
            warn!(action, error = %e, "Could not reach the coordinator");
        }
    }
}

// ============================================================================
// PageAgent - Lifecycle
// ============================================================================

impl PageAgent {
    /// Runs once the document has loaded: picks up the stored threshold and
    /// warns the panel when the page is known to block capture.
    pub async fn on_load(&self) {
        match self.state.similarity_threshold().await {
            Ok(Some(threshold)) => *self.threshold.write() = threshold,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not read stored threshold"),
        }

        if self.capturer.is_available() {
            debug!("Rendering engine available");
            return;
        }

        error!("Rendering engine not available, monitoring may not work");

        if self.is_restricted_site() {
            warn!("Page restricts scripts, capture is likely to fail");
            self.report(Message::show_error(RESTRICTED_SITE_WARNING))
                .await;
        }
    }

    /// Returns `true` on hosts or documents known to block the rendering
    /// engine.
    #[must_use]
    pub fn is_restricted_site(&self) -> bool {
        let restricted_host = self.env.url().is_some_and(|url| {
            url.host_str()
                .is_some_and(|host| RESTRICTED_HOSTS.iter().any(|h| host.contains(h)))
        });

        restricted_host || self.env.has_csp_meta()
    }
}

// ============================================================================
// PageAgent - Messages
// ============================================================================

impl PageAgent {
    /// Handles a message from the coordinator and returns the reply, if the
    /// action has one.
    pub async fn handle(&self, message: Message) -> Option<Value> {
        if !self.env.context_valid() {
            warn!(action = message.action(), "Extension context invalidated, ignoring");
            return None;
        }

        match message {
            Message::CaptureArea => {
                self.capture_selected_area().await;
                reply(&CaptureReply { started: true })
            }

            Message::CompareArea => {
                let similarity = self.compare_selected_area().await;
                reply(&CompareReply {
                    completed: true,
                    similarity,
                })
            }

            Message::CheckScreenshot => reply(&CheckScreenshotReply {
                has_screenshot: self.has_reference().await,
            }),

            Message::UpdateThreshold { threshold } => {
                self.set_threshold(threshold);
                None
            }

            Message::PlayNotificationSound => {
                self.play_notification_sound().await;
                None
            }

            Message::StartSelection => {
                info!("Starting area selection");
                if let Err(e) = self.env.begin_selection().await {
                    warn!(error = %e, "Could not show the selection overlay");
                }
                None
            }

            other => {
                debug!(action = other.action(), "Not a page message");
                None
            }
        }
    }

    /// Finishes a drag. An accepted region is persisted and reported with
    /// `selectionComplete`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRegion`] carrying the message to show in the
    /// overlay when the drag is rejected, or a storage error.
    pub async fn complete_selection(&self, gesture: &SelectionGesture) -> Result<SelectedRegion> {
        let region = gesture.complete().map_err(|rejection| {
            debug!(?gesture, %rejection, "Selection rejected");
            Error::invalid_region(rejection.message())
        })?;

        self.state.set_selected_area(region).await?;
        info!(region = %region, "Area selected");

        self.report(Message::SelectionComplete).await;
        Ok(region)
    }

    /// Captures the stored region as the new reference image. Returns `true`
    /// once the stored reference was read back.
    pub async fn capture_selected_area(&self) -> bool {
        match self.try_capture_reference().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Reference capture failed");
                self.report(Message::ScreenshotError).await;
                false
            }
        }
    }

    async fn try_capture_reference(&self) -> Result<()> {
        let region = self
            .state
            .selected_area()
            .await?
            .ok_or_else(|| Error::invalid_region("no area selected"))?;

        region.ensure_valid()?;

        let image = self
            .capturer
            .capture(region, self.env.scroll_offset())
            .await;

        if image.data_url.is_empty() {
            return Err(Error::capture("no image produced"));
        }

        self.state.set_reference_image(&image.data_url).await?;

        if !self.state.has_reference_image().await? {
            return Err(Error::ReferenceMissing);
        }

        info!(
            len = image.data_url.len(),
            placeholder = image.is_placeholder(),
            "Reference stored"
        );
        Ok(())
    }

    /// Compares the stored region with the reference. Returns the similarity
    /// when a comparison ran.
    ///
    /// Sends `changeDetected` when the score falls below the threshold. A
    /// missing reference is captured again instead of compared.
    pub async fn compare_selected_area(&self) -> Option<f64> {
        let (region, reference) = match self.comparison_inputs().await {
            Ok(inputs) => inputs,
            Err(e) => {
                error!(error = %e, "Could not read comparison inputs");
                return None;
            }
        };

        let Some(region) = region else {
            error!("No selected area stored");
            return None;
        };

        let Some(reference) = reference else {
            warn!("Reference missing, capturing it again");
            self.capture_selected_area().await;
            return None;
        };

        let current = self
            .capturer
            .capture(region, self.env.scroll_offset())
            .await;

        let similarity = match compare_data_urls(&reference, &current.data_url) {
            Ok(similarity) => similarity,
            Err(e) => {
                error!(error = %e, "Comparison failed");
                return None;
            }
        };

        let threshold = self.threshold();
        info!(similarity, threshold, "Region compared");

        if similarity < threshold {
            warn!(similarity, threshold, "Change detected");
            self.report(Message::ChangeDetected).await;
        }

        Some(similarity)
    }

    async fn comparison_inputs(&self) -> Result<(Option<SelectedRegion>, Option<String>)> {
        let region = self.state.selected_area().await?;
        let reference = self.state.reference_image().await?;
        Ok((region, reference))
    }

    /// Returns `true` if a reference image is stored.
    pub async fn has_reference(&self) -> bool {
        self.state.has_reference_image().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not check the reference");
            false
        })
    }

    /// Plays the chime, or a beep if the chime fails.
    pub async fn play_notification_sound(&self) {
        let Err(e) = self.env.play_chime().await else {
            return;
        };

        warn!(error = %e, "Chime failed, playing beep");
        if let Err(e) = self.env.play_beep().await {
            error!(error = %e, "Beep failed");
        }
    }
}

fn reply<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            error!(error = %e, "Could not serialize reply");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use parking_lot::Mutex;
    use url::Url;

    use crate::capture::{Point, RasterRequest, Rasterizer, ScrollOffset};
    use crate::storage::{MemoryStorage, Storage};

    struct PaintRasterizer {
        available: bool,
        color: Mutex<Rgba<u8>>,
    }

    #[async_trait]
    impl Rasterizer for PaintRasterizer {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn rasterize(&self, request: &RasterRequest) -> Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(
                request.region.width,
                request.region.height,
                *self.color.lock(),
            ))
        }
    }

    struct FakePage {
        url: &'static str,
        chime_fails: bool,
        chimes: AtomicUsize,
        beeps: AtomicUsize,
        valid: AtomicBool,
    }

    impl FakePage {
        fn at(url: &'static str) -> Self {
            Self {
                url,
                chime_fails: false,
                chimes: AtomicUsize::new(0),
                beeps: AtomicUsize::new(0),
                valid: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl PageEnvironment for FakePage {
        fn url(&self) -> Option<Url> {
            Url::parse(self.url).ok()
        }

        fn scroll_offset(&self) -> ScrollOffset {
            ScrollOffset::default()
        }

        fn context_valid(&self) -> bool {
            self.valid.load(Ordering::SeqCst)
        }

        async fn play_chime(&self) -> Result<()> {
            self.chimes.fetch_add(1, Ordering::SeqCst);
            if self.chime_fails {
                Err(Error::protocol("audio context blocked"))
            } else {
                Ok(())
            }
        }

        async fn play_beep(&self) -> Result<()> {
            self.beeps.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPort {
        sent: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl RuntimePort for RecordingPort {
        async fn send(&self, message: Message) -> Result<()> {
            self.sent.lock().push(message);
            Ok(())
        }
    }

    struct Harness {
        agent: PageAgent,
        state: StateStore,
        rasterizer: Arc<PaintRasterizer>,
        page: Arc<FakePage>,
        port: Arc<RecordingPort>,
    }

    fn harness_with(page: FakePage, available: bool) -> Harness {
        let state = StateStore::new(Arc::new(MemoryStorage::new()));
        let rasterizer = Arc::new(PaintRasterizer {
            available,
            color: Mutex::new(Rgba([200, 200, 200, 255])),
        });
        let page = Arc::new(page);
        let port = Arc::new(RecordingPort::default());

        let agent = PageAgent::new(
            state.clone(),
            ImageCapturer::new(rasterizer.clone()),
            page.clone(),
            port.clone(),
        );

        Harness {
            agent,
            state,
            rasterizer,
            page,
            port,
        }
    }

    fn harness() -> Harness {
        harness_with(FakePage::at("https://shop.example.com/item"), true)
    }

    fn drag(from: (i32, i32), to: (i32, i32)) -> SelectionGesture {
        SelectionGesture::new(
            Point::new(from.0, from.1),
            Point::new(to.0, to.1),
            Duration::from_millis(400),
        )
    }

    fn sent(h: &Harness) -> Vec<Message> {
        h.port.sent.lock().clone()
    }

    #[tokio::test]
    async fn test_selection_persists_and_reports() {
        let h = harness();

        let region = h.agent.complete_selection(&drag((10, 10), (60, 40))).await.expect("select");
        assert_eq!(region, SelectedRegion::new(10, 10, 50, 30));
        assert_eq!(h.state.selected_area().await.expect("read"), Some(region));
        assert_eq!(sent(&h), vec![Message::SelectionComplete]);
    }

    #[tokio::test]
    async fn test_rejected_selection_reports_reason() {
        let h = harness();

        let err = h
            .agent
            .complete_selection(&drag((10, 10), (10, 10)))
            .await
            .expect_err("rejected");
        assert!(err.to_string().contains("Click and drag"));
        assert!(h.state.selected_area().await.expect("read").is_none());
        assert!(sent(&h).is_empty());
    }

    #[tokio::test]
    async fn test_capture_without_region_reports_error() {
        let h = harness();

        let reply = h.agent.handle(Message::CaptureArea).await;
        assert_eq!(reply, Some(serde_json::json!({"started": true})));
        assert_eq!(sent(&h), vec![Message::ScreenshotError]);
        assert!(!h.agent.has_reference().await);
    }

    #[tokio::test]
    async fn test_capture_with_invalid_region_reports_error() {
        let h = harness();
        h.state
            .set_selected_area(SelectedRegion::new(0, 0, 0, 10))
            .await
            .expect("store");

        assert!(!h.agent.capture_selected_area().await);
        assert_eq!(sent(&h), vec![Message::ScreenshotError]);
    }

    #[tokio::test]
    async fn test_capture_stores_reference() {
        let h = harness();
        h.state
            .set_selected_area(SelectedRegion::new(0, 0, 20, 20))
            .await
            .expect("store");

        assert!(h.agent.capture_selected_area().await);
        assert!(h.agent.has_reference().await);
        assert!(sent(&h).is_empty());

        let reply = h.agent.handle(Message::CheckScreenshot).await;
        assert_eq!(reply, Some(serde_json::json!({"hasScreenshot": true})));
    }

    #[tokio::test]
    async fn test_compare_identical_region() {
        let h = harness();
        h.state
            .set_selected_area(SelectedRegion::new(0, 0, 20, 20))
            .await
            .expect("store");
        h.agent.capture_selected_area().await;

        let reply = h.agent.handle(Message::CompareArea).await.expect("reply");
        let reply: CompareReply = serde_json::from_value(reply).expect("parse");
        assert!(reply.completed);
        assert_eq!(reply.similarity, Some(100.0));
        assert!(sent(&h).is_empty());
    }

    #[tokio::test]
    async fn test_compare_changed_region_reports_change() {
        let h = harness();
        h.state
            .set_selected_area(SelectedRegion::new(0, 0, 20, 20))
            .await
            .expect("store");
        h.agent.capture_selected_area().await;

        *h.rasterizer.color.lock() = Rgba([0, 0, 0, 255]);

        let similarity = h.agent.compare_selected_area().await;
        assert_eq!(similarity, Some(0.0));
        assert_eq!(sent(&h), vec![Message::ChangeDetected]);
    }

    #[tokio::test]
    async fn test_threshold_update_applies_to_next_compare() {
        let h = harness();
        h.state
            .set_selected_area(SelectedRegion::new(0, 0, 20, 20))
            .await
            .expect("store");
        h.agent.capture_selected_area().await;

        *h.rasterizer.color.lock() = Rgba([0, 0, 0, 255]);
        h.agent
            .handle(Message::UpdateThreshold { threshold: 0.0 })
            .await;
        assert_eq!(h.agent.threshold(), 0.0);

        h.agent.compare_selected_area().await;
        assert!(sent(&h).is_empty());
    }

    #[tokio::test]
    async fn test_compare_without_region_is_noop() {
        let h = harness();
        assert_eq!(h.agent.compare_selected_area().await, None);
        assert!(sent(&h).is_empty());
    }

    #[tokio::test]
    async fn test_compare_without_reference_recaptures() {
        let h = harness();
        h.state
            .set_selected_area(SelectedRegion::new(0, 0, 20, 20))
            .await
            .expect("store");

        assert_eq!(h.agent.compare_selected_area().await, None);
        assert!(h.agent.has_reference().await);
    }

    #[tokio::test]
    async fn test_on_load_reads_stored_threshold() {
        let h = harness();
        h.state
            .backend()
            .set(
                [("similarityThreshold".to_string(), serde_json::json!(88.5))]
                    .into_iter()
                    .collect(),
            )
            .await
            .expect("store");

        h.agent.on_load().await;
        assert_eq!(h.agent.threshold(), 88.5);
        assert!(sent(&h).is_empty());
    }

    #[tokio::test]
    async fn test_restricted_site_warning() {
        let h = harness_with(FakePage::at("https://www.youtube.com/watch?v=1"), false);
        assert!(h.agent.is_restricted_site());

        h.agent.on_load().await;
        assert_eq!(sent(&h), vec![Message::show_error(RESTRICTED_SITE_WARNING)]);
    }

    #[tokio::test]
    async fn test_unrestricted_site_without_engine_stays_quiet() {
        let h = harness_with(FakePage::at("https://example.org/"), false);
        assert!(!h.agent.is_restricted_site());

        h.agent.on_load().await;
        assert!(sent(&h).is_empty());
    }

    #[tokio::test]
    async fn test_sound_falls_back_to_beep() {
        let mut page = FakePage::at("https://example.org/");
        page.chime_fails = true;
        let h = harness_with(page, true);

        h.agent.handle(Message::PlayNotificationSound).await;
        assert_eq!(h.page.chimes.load(Ordering::SeqCst), 1);
        assert_eq!(h.page.beeps.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_context_ignores_messages() {
        let h = harness();
        h.page.valid.store(false, Ordering::SeqCst);

        assert_eq!(h.agent.handle(Message::CheckScreenshot).await, None);
    }
}
