use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use popq_core::PopEngine;
use popq_model::ClaimPolicy;
use popq_observe::{LoggerConfig, init_logger};
use popq_store::MemoryListStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1) Logger
    let cfg = LoggerConfig::default().with_level("debug");
    init_logger(&cfg)?;
    info!("logger initialized");

    // 2) Engine over an in-memory store
    let engine = PopEngine::new(Arc::new(MemoryListStore::new()));

    // 3) A drain-everything consumer and a bounded-batch consumer compete
    //    on the same key; a 2s timeout tells them the stream is over.
    let drainer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            loop {
                match engine.pop_all("jobs", 2_000, CancellationToken::new()).await {
                    Ok(Some(batch)) => info!("drainer claimed {} job(s)", batch.len()),
                    Ok(None) => {
                        info!("drainer timed out, stopping");
                        break;
                    }
                    Err(e) => {
                        error!("drainer failed: {e}");
                        break;
                    }
                }
            }
        })
    };

    let nibbler = {
        let engine = engine.clone();
        tokio::spawn(async move {
            loop {
                match engine
                    .pop_batch("jobs", 3, 2_000, CancellationToken::new())
                    .await
                {
                    Ok(Some(batch)) => info!("nibbler claimed {} job(s)", batch.len()),
                    Ok(None) => {
                        info!("nibbler timed out, stopping");
                        break;
                    }
                    Err(e) => {
                        error!("nibbler failed: {e}");
                        break;
                    }
                }
            }
        })
    };

    // 4) Produce a few bursts
    for burst in 0..5u32 {
        let values = (0..4u32)
            .map(|j| format!("job-{burst}-{j}").into_bytes())
            .collect();
        let remaining = engine.push("jobs", values).await?;
        info!("pushed 4 job(s), {remaining} left after claims");
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    drainer.await?;
    nibbler.await?;

    // 5) Anything the consumers left behind
    if let Some(rest) = engine.try_pop("jobs", ClaimPolicy::All).await? {
        info!("{} job(s) were never claimed", rest.len());
    } else {
        info!("every job was claimed");
    }

    Ok(())
}
