//! NoteBridge Host: headless host that accepts a remote pen device.
//!
//! Opens the most recently edited notebook (or creates one), starts the
//! sync server and the single-writer runtime, autosaves periodically and
//! saves once more on Ctrl-C. Verbosity is controlled with `RUST_LOG`.

mod config;

use log::info;
use tokio::sync::mpsc;

use notebridge_core::{Notebook, PageSize, Template};
use notebridge_sync::coordinator::SyncCoordinator;
use notebridge_sync::runtime::{HostHandle, HostRuntime};
use notebridge_sync::server::SyncServer;
use notebridge_sync::storage::{NotebookStore, StoreError};

use config::HostConfig;

const REQUEST_CAPACITY: usize = 64;

fn open_notebook(store: &NotebookStore) -> Result<Notebook, StoreError> {
    match store.load_most_recent()? {
        Some(notebook) => {
            info!(
                "Opened notebook {} ({} pages)",
                notebook.name,
                notebook.page_count()
            );
            Ok(notebook)
        }
        None => store.create("Untitled", PageSize::default(), Template::default()),
    }
}

async fn save(handle: &HostHandle, store: &NotebookStore) {
    let mut notebook = match handle.snapshot().await {
        Ok(notebook) => notebook,
        Err(e) => {
            log::error!("Snapshot failed: {e}");
            return;
        }
    };
    if let Err(e) = store.save(&mut notebook) {
        log::error!("Save failed: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let config = HostConfig::from_env();
    info!("Starting NoteBridge Host on {}...", config.bind_addr);

    let store = NotebookStore::open(&config.data_dir)?;
    let notebook = open_notebook(&store)?;

    let server_config = config.server_config();
    let (events_tx, events_rx) = mpsc::channel(server_config.event_capacity);
    let server = SyncServer::new(server_config, events_tx);

    let (runtime, handle) = HostRuntime::new(
        SyncCoordinator::new(notebook),
        events_rx,
        server.peer_slot(),
        REQUEST_CAPACITY,
    );
    let runtime_task = tokio::spawn(runtime.run());
    let mut server_task = tokio::spawn(async move { server.run().await });

    let mut autosave = tokio::time::interval(config.autosave_interval);
    autosave.tick().await;
    loop {
        tokio::select! {
            _ = autosave.tick() => save(&handle, &store).await,
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log::error!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Shutting down");
                break;
            }
            result = &mut server_task => {
                match result {
                    Ok(Ok(())) => log::warn!("Server stopped"),
                    Ok(Err(e)) => log::error!("Server error: {e}"),
                    Err(e) => log::error!("Server task failed: {e}"),
                }
                break;
            }
        }
    }

    handle.shutdown().await?;
    let mut coordinator = runtime_task.await?;
    let mut notebook = coordinator.snapshot();
    store.save(&mut notebook)?;
    info!("Saved notebook {} to {}", notebook.name, store.dir().display());
    Ok(())
}
