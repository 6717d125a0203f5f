//! Long-lived reaper task.
//!
//! Started once at boot; every tick runs one batch of
//! `process_expired_reservations`. A tick that fails only logs: the
//! transaction has rolled back and the same rows are picked up next tick.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::services::stock_release::StockReleaseService;

pub struct StockReleaseWorker {
    service: StockReleaseService,
    batch_size: u64,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl StockReleaseWorker {
    pub fn new(
        service: StockReleaseService,
        batch_size: u64,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            service,
            batch_size,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!(
            batch_size = self.batch_size,
            interval_secs = self.interval.as_secs(),
            "starting stock release worker"
        );

        let mut ticker = tokio::time::interval(self.interval);
        // The first tick of a tokio interval fires immediately; consume it
        // so the first pass happens one interval after boot.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("stock release worker stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.process_once().await;
                }
            }
        }
    }

    async fn process_once(&self) {
        let started = Instant::now();
        match self
            .service
            .process_expired_reservations(self.batch_size)
            .await
        {
            Ok(outcome) if outcome.released > 0 => {
                info!(
                    released = outcome.released,
                    orders_expired = outcome.orders_expired,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "released expired reservations"
                );
            }
            Ok(_) => {
                debug!("no expired reservations to release");
            }
            Err(e) => {
                error!(error = %e, "failed to process expired reservations");
            }
        }
    }
}
