use anyhow::Result;

use nutrilog_core::session::Session;
use nutrilog_core::sync::SyncStatus;

pub(crate) async fn cmd_sync(session: &Session, json: bool) -> Result<()> {
    let status = session.sync_now().await?;

    if json {
        println!("{}", serde_json::json!({ "status": status }));
    } else if status == SyncStatus::Error {
        eprintln!("Sync failed. Changes are kept locally; run `nutrilog sync` to retry");
    } else {
        println!("Synced {} day(s)", session.history().len());
    }
    Ok(())
}
