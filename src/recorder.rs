// ===============================
// src/recorder.rs
// ===============================
//
// JSONL event recorder, append-only:
// - one line per pipeline event (tick / accepted order / fill)
// - BufWriter to keep syscalls down, flushed every second
// - parent directory created on demand; a failed write reopens the file once
//
// Diagnostics only: nothing ever reads the file back into the pipeline.
// Enable with `--record-file /path/to/events.jsonl`.

use std::path::Path;

use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::Event;

async fn open_writer(path: &str) -> BufWriter<tokio::fs::File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent).await {
                error!(?e, %path, "recorder: create_dir_all failed");
            }
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .unwrap_or_else(|e| panic!("recorder: open {} failed: {}", path, e));

    BufWriter::new(file)
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: String) {
    info!(%path, "recorder: started");
    let mut writer = open_writer(&path).await;

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                match maybe_ev {
                    Some(ev) => {
                        let mut line = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                error!(?e, "recorder: serialize error, skip event");
                                continue;
                            }
                        };
                        line.push('\n');
                        if let Err(e) = writer.write_all(line.as_bytes()).await {
                            error!(?e, "recorder: write failed, reopening");
                            writer = open_writer(&path).await;
                            if let Err(e2) = writer.write_all(line.as_bytes()).await {
                                error!(?e2, "recorder: write failed again, drop event");
                            }
                        }
                    }
                    None => {
                        let _ = writer.flush().await;
                        info!("recorder: channel closed, stopped");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
            }
        }
    }
}
