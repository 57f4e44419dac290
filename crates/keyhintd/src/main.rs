mod ipc_surface;
mod scheduler;

use anyhow::{Context, Result};
use ipc_surface::{IpcSurface, Subscribers};
use keyhint_core::config::{self, HintSettings, TableProvider};
use keyhint_core::ipc::{self, ClientMsg, DaemonMsg};
use scheduler::PopupScheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// State shared between IPC handlers.
struct Daemon {
    scheduler: PopupScheduler<IpcSurface>,
    options: Arc<TableProvider>,
    /// Channels to connected surface clients.
    surfaces: Subscribers,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keyhintd=info".parse().unwrap()),
        )
        .init();

    info!("keyhintd starting");

    let options = Arc::new(TableProvider::load().context("loading config")?);
    let settings = HintSettings::resolve(options.as_ref());
    info!(
        delay_ms = settings.delay.as_millis() as u64,
        sort = %settings.sort,
        max_rows = settings.layout.max_rows,
        "settings resolved"
    );

    let surfaces = Subscribers::default();
    let daemon = Arc::new(Daemon {
        scheduler: PopupScheduler::new(
            IpcSurface::new(surfaces.clone()),
            options.clone(),
            settings,
        ),
        options,
        surfaces,
    });

    let socket_path = config::socket_path();
    // Remove stale socket
    let _ = std::fs::remove_file(&socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("binding socket {}", socket_path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600)).ok();
    }
    info!(path = %socket_path.display(), "IPC socket listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(handle_client(stream, Arc::clone(&daemon)));
                }
                Err(e) => warn!(error = %e, "IPC accept error"),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("keyhintd shutting down");
    daemon.scheduler.shutdown().await;
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

async fn handle_client(stream: UnixStream, daemon: Arc<Daemon>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // Channel for sending messages back to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let write_handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut is_surface = false;

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(msg) = ipc::decode_client(&line) else {
            warn!(line = %line.trim(), "ignoring undecodable IPC message");
            continue;
        };

        let reply = match msg {
            ClientMsg::RegisterSurface => {
                is_surface = true;
                daemon.surfaces.register(tx.clone());
                info!(surfaces = daemon.surfaces.len(), "surface client registered");
                ack(true, "surface registered")
            }
            ClientMsg::RequestPopup {
                anchor,
                typed,
                mappings,
                elapsed_ms,
            } => {
                let now = Instant::now();
                let started = now
                    .checked_sub(Duration::from_millis(elapsed_ms))
                    .unwrap_or(now);
                daemon
                    .scheduler
                    .request_popup(anchor, &typed, &mappings, started)
                    .await;
                if mappings.is_empty() {
                    ack(true, "no mappings, nothing scheduled")
                } else {
                    ack(true, format!("scheduled {} entries", mappings.len()))
                }
            }
            ClientMsg::Dismiss => {
                daemon.scheduler.dismiss().await;
                ack(true, "dismissed")
            }
            ClientMsg::SetOption { name, value } => match daemon.options.set(&name, &value) {
                Ok(()) => {
                    info!(name = %name, value = %value, "option set");
                    if name.starts_with("hint.") || name.starts_with("style.") {
                        ack(true, format!("{} set, takes effect after restart", name))
                    } else {
                        ack(true, format!("{} set", name))
                    }
                }
                Err(e) => ack(false, format!("failed to set '{}': {}", name, e)),
            },
            ClientMsg::GetStatus => {
                let settings = daemon.scheduler.settings();
                DaemonMsg::Status {
                    state: daemon.scheduler.state().await.to_string(),
                    sort_order: settings.sort.to_string(),
                    delay_ms: settings.delay.as_millis() as u64,
                    version: env!("CARGO_PKG_VERSION").to_string(),
                }
            }
        };
        let _ = tx.send(ipc::encode(&reply));
    }

    write_handle.abort();
    let _ = write_handle.await;

    // Client gone: its receiver is dropped now, so prune finds the sender closed
    if is_surface {
        daemon.surfaces.prune();
        info!("surface client disconnected");
    }
}

fn ack(ok: bool, message: impl Into<String>) -> DaemonMsg {
    DaemonMsg::Ack {
        ok,
        message: message.into(),
    }
}
