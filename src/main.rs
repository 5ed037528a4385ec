//! ShopCollab - Collaborative Shop Directory Editor
//!
//! A real-time multi-user editor client for the shop directory, using:
//! - Per-row optimistic locking over a persistent WebSocket channel
//! - Live single-field update broadcasts applied to a local cache
//! - REST fallback for mutations while the channel is down
//! - Pure table projection consumed by the rendering surface
//!
//! The editor is gated behind authenticated-admin status; anything else
//! aborts initialization with a notification.

use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::info;

mod api;
mod editor;
mod sync;
#[cfg(test)]
mod testutil;

use api::{ApiClient, ApiConfig};
use editor::{CommitOutcome, EditController, EditableField, Notifier, RowView};
use sync::{connection, derive_channel_url, ChannelConfig, RowLock, RECONNECT_DELAY};

/// How often expired flash highlights are swept
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shop_collab=info".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let api_config = ApiConfig::from_env();
    let channel_url = std::env::var("SHOP_WS_URL")
        .unwrap_or_else(|_| derive_channel_url(&api_config.base_url));
    let reconnect_delay = std::env::var("RECONNECT_DELAY_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(RECONNECT_DELAY);

    info!("🍜 ShopCollab editor v{} starting", env!("CARGO_PKG_VERSION"));
    info!("   API base: {}", api_config.base_url);
    info!("   Channel:  {}", channel_url);

    let notifier = Notifier::new();
    let api = ApiClient::new(api_config.clone())?;

    // Authentication gate: authenticated administrators only.
    let identity = match api.ensure_admin().await {
        Ok(identity) => identity,
        Err(e) => {
            notifier.error(format!("Shop editor unavailable: {}", e));
            anyhow::bail!("authentication gate failed: {}", e);
        }
    };
    info!("Editing as {} ({})", identity.username, identity.user_id);

    // Initial bulk load.
    let shops = api.list_shops(api_config.page_limit, 0).await?;
    info!("Loaded {} shops", shops.len());

    // Open the collaboration channel.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let channel_config = ChannelConfig::new(channel_url).with_reconnect_delay(reconnect_delay);
    let conn = connection::connect(channel_config, events_tx);
    let mut channel_state = conn.state();

    let mut controller = EditController::new(shops, identity, conn, api, notifier);
    let mut filter = String::new();

    // ========================================================================
    // EVENT LOOP
    // ========================================================================
    //
    // Everything is event-driven: inbound protocol events mutate the editor
    // state, stdin lines drive the edit machinery, connection transitions
    // update the status indicator, ctrl-c shuts down.

    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut maintenance = tokio::time::interval(MAINTENANCE_INTERVAL);

    println!("commands: rows | search <text> | edit <id> <field> | commit <text> | cancel | history <id> | reload");

    loop {
        tokio::select! {
            Some(event) = events_rx.recv() => {
                controller.apply_server_event(event);
                let rows = controller.render(&filter);
                info!("{} rows ({} locked)", rows.len(), controller.state().locks.len());
            }
            Ok(Some(line)) = stdin.next_line() => {
                handle_command(&mut controller, &mut filter, &line).await;
            }
            changed = channel_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let connected = channel_state.borrow().is_connected();
                info!(
                    "Channel {}",
                    if connected { "connected" } else { "disconnected, retrying" }
                );
            }
            _ = maintenance.tick() => {
                controller.maintain();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                controller.connection().close();
                break;
            }
        }
    }

    Ok(())
}

/// Dispatch one line-command against the editor.
async fn handle_command(controller: &mut EditController, filter: &mut String, line: &str) {
    let line = line.trim();
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

    match command {
        "" => {}
        "rows" => print_rows(&controller.render(filter)),
        "search" => {
            *filter = rest.trim().to_string();
            print_rows(&controller.render(filter));
        }
        "edit" => {
            let mut args = rest.split_whitespace();
            let (Some(id), Some(key)) = (args.next(), args.next()) else {
                println!("usage: edit <id> <field>");
                return;
            };
            let Ok(shop_id) = id.parse() else {
                println!("invalid shop id: {}", id);
                return;
            };
            let Some(field) = EditableField::from_key(key) else {
                println!("not an editable field: {}", key);
                return;
            };
            match controller.begin_edit(shop_id, field) {
                Ok(prefill) => println!("editing shop {} {} [{}]", shop_id, key, prefill),
                Err(e) => println!("cannot edit: {}", e),
            }
        }
        "commit" => match controller.commit(rest).await {
            Ok(CommitOutcome::AppliedViaRest) => {
                controller.notifier().success("Change saved over REST");
            }
            Ok(_) => {}
            Err(e) => println!("invalid input, still editing: {}", e),
        },
        "cancel" => match controller.cancel() {
            Ok(original) => println!("restored: {}", original),
            Err(e) => println!("{}", e),
        },
        "history" => {
            let Ok(shop_id) = rest.trim().parse() else {
                println!("usage: history <id>");
                return;
            };
            if controller.open_history(shop_id).await.is_ok() {
                if let Some(view) = controller.history_view() {
                    for entry in &view.entries {
                        println!(
                            "{}  {}: {} -> {}  ({})",
                            entry.changed_at, entry.field, entry.old_value, entry.new_value,
                            entry.changed_by
                        );
                    }
                }
                controller.close_history();
            }
        }
        "reload" => match controller.reload().await {
            Ok(count) => println!("reloaded {} shops", count),
            Err(e) => println!("reload failed: {}", e),
        },
        _ => println!(
            "commands: rows | search <text> | edit <id> <field> | commit <text> | cancel | history <id> | reload"
        ),
    }
}

fn print_rows(rows: &[RowView]) {
    for row in rows {
        let marker = match &row.lock {
            RowLock::SelfLocked => "*",
            RowLock::OtherLocked(_) => "x",
            RowLock::Unlocked => " ",
        };
        let holder = row.lock_tooltip.as_deref().unwrap_or("");
        println!(
            "{:>4} {} {:<24} {:<20} wait:{:<6} {} {}",
            row.shop_id, marker, row.name, row.address, row.wait_time, row.updated_by, holder
        );
    }
}
