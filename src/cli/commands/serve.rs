//! dpe serve - Consume a round feed and emit predictions
//!
//! Frames are read line by line from stdin or a file. Each decoded event is
//! handed to the engine on the blocking pool and awaited before the next line
//! is read, so rounds are learned strictly in feed order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::app::AppContext;
use crate::dashboard::{Dashboard, JsonLinesDashboard};
use crate::engine::Engine;
use crate::error::Result;
use crate::feed::{self, FeedEvent, FeedFormat};

const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Read frames from this file instead of stdin
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Frame format: packet or json (defaults to feed.format)
    #[arg(long)]
    pub format: Option<FeedFormat>,

    /// Keep statistics in memory only
    #[arg(long)]
    pub memory: bool,
}

/// Counters for one serve run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServeReport {
    pub rounds: u64,
    pub predictions: u64,
    pub ignored: u64,
    pub rejected: u64,
    pub session_expired: u64,
}

pub fn run(ctx: &AppContext, args: &ServeArgs) -> Result<()> {
    let format = args.format.unwrap_or(ctx.config.feed.format);
    let store = ctx.open_store(args.memory)?;
    let engine = Arc::new(Engine::new(store, ctx.config.engine));
    let dashboard: Arc<dyn Dashboard> = Arc::new(JsonLinesDashboard::stdout());
    let keepalive = Duration::from_secs(ctx.config.store.keepalive_seconds);

    info!(
        format = %format,
        memory = args.memory,
        store = %ctx.store_path().display(),
        "serve starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let report = runtime.block_on(async {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
            Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };
        serve_feed(engine, dashboard, reader, format, keepalive).await
    });
    // a pending stdin read sits on a blocking thread that never returns;
    // dropping the runtime would wait on it forever
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    let report = report?;

    info!(
        rounds = report.rounds,
        predictions = report.predictions,
        ignored = report.ignored,
        rejected = report.rejected,
        "serve finished"
    );
    Ok(())
}

/// Drive the engine from `reader` until EOF or Ctrl-C.
///
/// Undecodable frames and dashboard failures are logged and skipped; only a
/// read error on the input ends the loop with an error.
pub async fn serve_feed<R>(
    engine: Arc<Engine>,
    dashboard: Arc<dyn Dashboard>,
    reader: R,
    format: FeedFormat,
    keepalive: Duration,
) -> Result<ServeReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut report = ServeReport::default();

    let mut keepalive = tokio::time::interval(keepalive);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately once; the store was just opened
    keepalive.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut signal_armed = true;

    loop {
        // polled first so the handler is installed before any line is served
        tokio::select! {
            biased;
            signal = &mut shutdown, if signal_armed => {
                match signal {
                    Ok(()) => {
                        info!("interrupt received, stopping feed");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "ctrl-c handler unavailable");
                        signal_armed = false;
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("feed reached end of input");
                    break;
                };
                handle_line(&engine, dashboard.as_ref(), format, &line, &mut report).await;
            }
            _ = keepalive.tick() => {
                ping_store(&engine).await;
            }
        }
    }

    Ok(report)
}

async fn handle_line(
    engine: &Arc<Engine>,
    dashboard: &dyn Dashboard,
    format: FeedFormat,
    line: &str,
    report: &mut ServeReport,
) {
    let event = match feed::decode(format, line) {
        Ok(Some(event)) => event,
        Ok(None) => {
            report.ignored += 1;
            return;
        }
        Err(err) => {
            report.rejected += 1;
            warn!(error = %err, "skipping undecodable frame");
            return;
        }
    };

    match event {
        FeedEvent::Round(dice) => {
            let engine = Arc::clone(engine);
            match tokio::task::spawn_blocking(move || engine.record_round(dice)).await {
                Ok(summary) => {
                    report.rounds += 1;
                    if let Err(err) = dashboard.round(&summary) {
                        warn!(
                            sequence_id = summary.sequence_id,
                            error = %err,
                            "dashboard emit failed"
                        );
                    }
                }
                Err(err) => error!(error = %err, "round task failed"),
            }
        }
        FeedEvent::Predict => {
            let engine = Arc::clone(engine);
            match tokio::task::spawn_blocking(move || engine.predict()).await {
                Ok(prediction) => {
                    report.predictions += 1;
                    if let Err(err) = dashboard.prediction(&prediction) {
                        warn!(mode = %prediction.mode, error = %err, "dashboard emit failed");
                    }
                }
                Err(err) => error!(error = %err, "predict task failed"),
            }
        }
        FeedEvent::SessionExpired => {
            report.session_expired += 1;
            warn!("upstream session expired; feed must re-authenticate");
        }
    }
}

async fn ping_store(engine: &Arc<Engine>) {
    let store = Arc::clone(engine.store());
    match tokio::task::spawn_blocking(move || store.ping()).await {
        Ok(Ok(())) => debug!("store keepalive ok"),
        Ok(Err(err)) => warn!(error = %err, "store keepalive failed"),
        Err(err) => error!(error = %err, "keepalive task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, Mode, Outcome, Pick};
    use crate::storage::MemoryStore;
    use crate::test_utils::fixtures::RecordingDashboard;

    fn engine() -> Arc<Engine> {
        Arc::new(Engine::new(Arc::new(MemoryStore::new()), EngineConfig::default()))
    }

    #[tokio::test]
    async fn json_feed_drives_engine_in_order() {
        let input = concat!(
            "{\"type\": \"predict\"}\n",
            "{\"type\": \"round\", \"d1\": 6, \"d2\": 5, \"d3\": 4}\n",
            "not json\n",
            "{\"type\": \"round\", \"d1\": 1, \"d2\": 1, \"d3\": 1}\n",
            "\n",
        );
        let recorder = Arc::new(RecordingDashboard::default());
        let engine = engine();
        let report = serve_feed(
            Arc::clone(&engine),
            recorder.clone(),
            input.as_bytes(),
            FeedFormat::Json,
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            ServeReport {
                rounds: 2,
                predictions: 1,
                ignored: 1,
                rejected: 1,
                session_expired: 0,
            }
        );

        let predictions = recorder.predictions();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].pick, Pick::Small);
        assert_eq!(predictions[0].mode, Mode::Cold);

        let rounds = recorder.rounds();
        assert_eq!(rounds.len(), 2);
        assert_eq!((rounds[0].sequence_id, rounds[0].sum), (1, 15));
        assert_eq!(rounds[0].outcome, Outcome::Big);
        assert_eq!((rounds[1].sequence_id, rounds[1].sum), (2, 3));
        assert_eq!(engine.snapshot().last_sum, 3);
    }

    #[tokio::test]
    async fn packet_feed_counts_session_expiry() {
        let input = concat!(
            "[1, false, 100]\n",
            "[5, {\"cmd\": 1015, \"d\": {\"cmd\": 6006, \"d1\": 2, \"d2\": 3, \"d3\": 4}}]\n",
            "[5, {\"cmd\": 6005}]\n",
        );
        let recorder = Arc::new(RecordingDashboard::default());
        let report = serve_feed(
            engine(),
            recorder.clone(),
            input.as_bytes(),
            FeedFormat::Packet,
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        assert_eq!(report.session_expired, 1);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.predictions, 1);
        assert_eq!(recorder.rounds()[0].sum, 9);
    }
}
