use anyhow::{Context, Result};
use keyhint_core::config::{self, ConfigProvider, HintSettings};
use keyhint_core::format::MarkupFormatter;
use keyhint_core::layout::{self, RenderedBlock};
use keyhint_core::mapping::{KeyStroke, MappingEntry};
use keyhint_core::surface::{Anchor, PopupHandle, PopupSurface, Position};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Observable state of the single hint slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintState {
    Idle,
    /// Debounce timer armed, nothing shown yet.
    Pending,
    Visible,
}

impl fmt::Display for HintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Visible => "visible",
        })
    }
}

/// Remaining wait before showing, measured from when the key sequence
/// started rather than from the latest request.
pub fn debounce_delay(base: Duration, started: Instant, now: Instant) -> Duration {
    base.saturating_sub(now.saturating_duration_since(started))
}

/// Owns the one pending-or-visible hint for a session.
pub struct PopupScheduler<S: PopupSurface> {
    surface: Arc<S>,
    options: Arc<dyn ConfigProvider>,
    formatter: MarkupFormatter,
    settings: HintSettings,
    /// Held across every request/dismiss so they never interleave.
    pending: Mutex<Option<JoinHandle<()>>>,
    visible: Arc<Mutex<Option<S::Handle>>>,
}

impl<S: PopupSurface> PopupScheduler<S> {
    pub fn new(surface: S, options: Arc<dyn ConfigProvider>, settings: HintSettings) -> Self {
        Self {
            surface: Arc::new(surface),
            options,
            formatter: MarkupFormatter::new(settings.style.clone()),
            settings,
            pending: Mutex::new(None),
            visible: Arc::new(Mutex::new(None)),
        }
    }

    pub fn settings(&self) -> &HintSettings {
        &self.settings
    }

    /// Replace whatever hint is pending or visible with one for `mappings`.
    ///
    /// An empty `mappings` is a no-op and leaves the current hint alone.
    /// Otherwise the previous timer is cancelled and awaited before this
    /// returns, so a superseded hint can never appear afterwards.
    pub async fn request_popup(
        &self,
        anchor: Anchor,
        typed: &[KeyStroke],
        mappings: &[MappingEntry],
        started: Instant,
    ) {
        if mappings.is_empty() {
            debug!("no nested mappings, leaving current hint untouched");
            return;
        }

        let mut pending = self.pending.lock().await;
        self.retire(&mut pending).await;

        let delay = debounce_delay(self.settings.delay, started, Instant::now());
        let content = layout::layout(
            mappings,
            self.settings.sort,
            typed,
            &self.settings.layout,
            &self.formatter,
        );
        let fade_ms = config::fade_millis(self.options.as_ref());

        debug!(
            delay_ms = delay.as_millis() as u64,
            entries = mappings.len(),
            fade_ms,
            "hint scheduled"
        );

        let surface = Arc::clone(&self.surface);
        let visible = Arc::clone(&self.visible);
        let background = self.settings.background.clone();
        let position = self.settings.position;

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // No await points between taking the slot and storing the handle,
            // so an abort lands before the show or not at all.
            let mut visible = visible.lock().await;
            if let Some(mut stale) = visible.take() {
                debug!("hiding hint left over from a previous cycle");
                stale.hide();
            }
            match show(surface.as_ref(), &content, &background, anchor, position, fade_ms) {
                Ok(handle) => {
                    debug!("hint shown");
                    *visible = Some(handle);
                }
                Err(e) => warn!(error = %e, "failed to show hint, abandoning this cycle"),
            }
        }));
    }

    /// Cancel the pending hint and hide the visible one. Idempotent.
    pub async fn dismiss(&self) {
        let mut pending = self.pending.lock().await;
        self.retire(&mut pending).await;
    }

    pub async fn shutdown(&self) {
        debug!("scheduler shutting down");
        self.dismiss().await;
    }

    pub async fn state(&self) -> HintState {
        let pending = self.pending.lock().await;
        if pending.as_ref().is_some_and(|task| !task.is_finished()) {
            return HintState::Pending;
        }
        if self.visible.lock().await.is_some() {
            HintState::Visible
        } else {
            HintState::Idle
        }
    }

    async fn retire(&self, pending: &mut Option<JoinHandle<()>>) {
        if let Some(task) = pending.take() {
            task.abort();
            match task.await {
                Ok(()) => debug!("pending hint had already fired"),
                Err(e) if e.is_cancelled() => debug!("pending hint cancelled"),
                Err(e) => warn!(error = %e, "hint task panicked"),
            }
        }

        if let Some(mut handle) = self.visible.lock().await.take() {
            handle.hide();
            debug!("hint hidden");
        }
    }
}

impl<S: PopupSurface> Drop for PopupScheduler<S> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
            debug!("pending hint aborted on drop");
        }
        if let Ok(mut visible) = self.visible.try_lock() {
            if let Some(mut handle) = visible.take() {
                handle.hide();
            }
        }
    }
}

fn show<S: PopupSurface>(
    surface: &S,
    content: &RenderedBlock,
    background: &str,
    anchor: Anchor,
    position: Position,
    fade_ms: u64,
) -> Result<S::Handle> {
    let mut handle = surface
        .create(content, background)
        .context("creating popup")?;
    handle
        .show(anchor, position, fade_ms)
        .context("showing popup")?;
    Ok(handle)
}
