use anyhow::Result;
use keyhint_core::ipc::{self, DaemonMsg};
use keyhint_core::layout::RenderedBlock;
use keyhint_core::surface::{Anchor, PopupHandle, PopupSurface, Position};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Channels to connected surface clients.
#[derive(Clone, Default)]
pub struct Subscribers {
    txs: Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>>,
}

impl Subscribers {
    pub fn register(&self, tx: mpsc::UnboundedSender<String>) {
        self.lock().push(tx);
    }

    /// Drop senders whose client went away.
    pub fn prune(&self) {
        self.lock().retain(|tx| !tx.is_closed());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn broadcast(&self, msg: &DaemonMsg) {
        let line = ipc::encode(msg);
        self.lock().retain(|tx| tx.send(line.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<String>>> {
        self.txs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Popup surface that renders by forwarding to registered surface clients.
pub struct IpcSurface {
    subscribers: Subscribers,
    next_id: AtomicU64,
}

impl IpcSurface {
    pub fn new(subscribers: Subscribers) -> Self {
        Self {
            subscribers,
            next_id: AtomicU64::new(1),
        }
    }
}

impl PopupSurface for IpcSurface {
    type Handle = IpcHandle;

    fn create(&self, content: &RenderedBlock, background: &str) -> Result<IpcHandle> {
        if self.subscribers.is_empty() {
            anyhow::bail!("no surface client registered");
        }
        Ok(IpcHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            content: content.clone(),
            background: background.to_string(),
            shown: false,
            subscribers: self.subscribers.clone(),
        })
    }
}

pub struct IpcHandle {
    id: u64,
    content: RenderedBlock,
    background: String,
    shown: bool,
    subscribers: Subscribers,
}

impl PopupHandle for IpcHandle {
    fn show(&mut self, anchor: Anchor, position: Position, fade_ms: u64) -> Result<()> {
        self.subscribers.broadcast(&DaemonMsg::ShowHint {
            id: self.id,
            content: self.content.clone(),
            background: self.background.clone(),
            anchor,
            position,
            fade_ms,
        });
        self.shown = true;
        debug!(id = self.id, "show sent to surfaces");
        Ok(())
    }

    fn hide(&mut self) {
        if std::mem::take(&mut self.shown) {
            self.subscribers.broadcast(&DaemonMsg::HideHint { id: self.id });
            debug!(id = self.id, "hide sent to surfaces");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribed() -> (IpcSurface, mpsc::UnboundedReceiver<String>) {
        let subscribers = Subscribers::default();
        let (tx, rx) = mpsc::unbounded_channel();
        subscribers.register(tx);
        (IpcSurface::new(subscribers), rx)
    }

    #[test]
    fn create_fails_without_surface_clients() {
        let surface = IpcSurface::new(Subscribers::default());
        assert!(surface.create(&RenderedBlock::new("x"), "#000").is_err());
    }

    #[test]
    fn show_then_hide_broadcasts_matching_ids() {
        let (surface, mut rx) = subscribed();
        let mut handle = surface.create(&RenderedBlock::new("<b>g</b>"), "#000").unwrap();
        handle.show(Anchor::new(1, 2), Position::Below, 500).unwrap();
        handle.hide();

        match ipc::decode_daemon(&rx.try_recv().unwrap()).unwrap() {
            DaemonMsg::ShowHint {
                id,
                content,
                anchor,
                fade_ms,
                ..
            } => {
                assert_eq!(id, 1);
                assert_eq!(content.as_str(), "<b>g</b>");
                assert_eq!(anchor, Anchor::new(1, 2));
                assert_eq!(fade_ms, 500);
            }
            other => panic!("expected ShowHint, got {:?}", other),
        }
        assert!(matches!(
            ipc::decode_daemon(&rx.try_recv().unwrap()).unwrap(),
            DaemonMsg::HideHint { id: 1 }
        ));
    }

    #[test]
    fn hide_without_show_sends_nothing() {
        let (surface, mut rx) = subscribed();
        let mut handle = surface.create(&RenderedBlock::new("x"), "#000").unwrap();
        handle.hide();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_clients_are_dropped_on_broadcast() {
        let (surface, rx) = subscribed();
        drop(rx);
        let mut handle = surface.create(&RenderedBlock::new("x"), "#000").unwrap();
        handle.show(Anchor::default(), Position::Above, 0).unwrap();
        assert_eq!(surface.subscribers.len(), 0);
    }
}
