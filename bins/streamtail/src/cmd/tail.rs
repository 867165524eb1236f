use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use streamtail_api::Envelope;
use streamtail_engine::{
    ConsoleSink, CursorStore, FileCursorStore, MemoryCursorStore, TailError, TailLoop,
};
use streamtail_redis::{server_url, RedisStreamReader};
use streamtail_schema::{ApiRequest, DeviceEvent, FrameLog, FrameMeta};

use crate::config::{Effective, Schema, TailJob};
use crate::error::CliError;

/// Spawn one loop per tail, stop them all on Ctrl+C or on the first fatal
/// error, and report that error.
pub async fn run(eff: Effective) -> Result<(), CliError> {
    tracing::info!(server = %server_url(&eff.server), tails = eff.tails.len(), "streamtail starting");

    let token = CancellationToken::new();

    let mut handles: Vec<(String, JoinHandle<Result<(), TailError>>)> = Vec::new();
    for job in &eff.tails {
        let spawned = match job.schema {
            Schema::Event => spawn_tail::<DeviceEvent>(job, &eff.server, token.clone()),
            Schema::Frame => spawn_tail::<FrameLog>(job, &eff.server, token.clone()),
            Schema::Meta => spawn_tail::<FrameMeta>(job, &eff.server, token.clone()),
            Schema::Request => spawn_tail::<ApiRequest>(job, &eff.server, token.clone()),
        };
        match spawned {
            Ok(handle) => handles.push((job.name.clone(), handle)),
            Err(e) => {
                token.cancel();
                for (_, handle) in handles {
                    let _ = handle.await;
                }
                return Err(e);
            }
        }
    }

    let signal_token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                match res {
                    Ok(()) => tracing::info!("ctrl-c received, shutting down"),
                    Err(e) => tracing::error!(error = %e, "signal handler failed, shutting down"),
                }
                signal_token.cancel();
            }
            _ = signal_token.cancelled() => {}
        }
    });

    let mut first_err: Option<CliError> = None;
    for (name, handle) in handles {
        let err = match handle.await {
            Ok(Ok(())) => continue,
            Ok(Err(source)) => CliError::Tail { name, source },
            Err(e) => {
                token.cancel();
                CliError::Join { name, detail: e.to_string() }
            }
        };
        first_err.get_or_insert(err);
    }
    token.cancel();

    match first_err {
        Some(e) => Err(e),
        None => {
            tracing::info!("shutdown complete");
            Ok(())
        }
    }
}

fn spawn_tail<E: Envelope>(
    job: &TailJob,
    server: &str,
    token: CancellationToken,
) -> Result<JoinHandle<Result<(), TailError>>, CliError> {
    let reader = RedisStreamReader::open(server)?;
    let sink = ConsoleSink::stdout(job.output);
    let store: Box<dyn CursorStore> = match &job.cursor_file {
        Some(path) => Box::new(FileCursorStore::new(path)),
        None => Box::new(MemoryCursorStore::new()),
    };

    let mut tail = TailLoop::<E, _, _>::new(job.settings.clone(), reader, sink, store)
        .map_err(|source| CliError::Tail { name: job.name.clone(), source })?;

    tracing::info!(
        tail = %job.name,
        schema = %job.schema,
        stream = %job.settings.stream,
        output = %job.output,
        "spawned tail"
    );

    Ok(tokio::spawn(async move {
        let result = tail.run(token.clone()).await;
        if result.is_err() {
            // One failed tail takes the others down with it.
            token.cancel();
        }
        result
    }))
}
