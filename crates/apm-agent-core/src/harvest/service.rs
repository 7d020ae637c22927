// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::HarvestConfig;
use crate::errors::HarvestError;
use crate::harvest::event::HarvestTrace;
use crate::harvest::traces::HarvestTraces;
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

pub type DataResponse = Result<Option<Vec<u8>>, HarvestError>;

#[derive(Debug)]
pub enum HarvestCommand {
    Witness(Box<HarvestTrace>),
    Data {
        run_id: String,
        harvest_start: SystemTime,
        response_tx: oneshot::Sender<DataResponse>,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct HarvestHandle {
    tx: mpsc::UnboundedSender<HarvestCommand>,
}

impl HarvestHandle {
    pub fn witness(&self, trace: HarvestTrace) -> Result<(), HarvestError> {
        self.tx
            .send(HarvestCommand::Witness(Box::new(trace)))
            .map_err(|e| {
                HarvestError::ServiceUnavailable(format!("Failed to send witness command: {e}"))
            })
    }

    pub async fn data(
        &self,
        run_id: impl Into<String>,
        harvest_start: SystemTime,
    ) -> DataResponse {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(HarvestCommand::Data {
                run_id: run_id.into(),
                harvest_start,
                response_tx,
            })
            .map_err(|e| {
                HarvestError::ServiceUnavailable(format!("Failed to send data command: {e}"))
            })?;

        response_rx.await.map_err(|e| {
            HarvestError::ServiceUnavailable(format!("Failed to receive data response: {e}"))
        })?
    }

    pub fn shutdown(&self) -> Result<(), HarvestError> {
        self.tx.send(HarvestCommand::Shutdown).map_err(|e| {
            HarvestError::ServiceUnavailable(format!("Failed to send shutdown command: {e}"))
        })
    }
}

/// Owns the harvest selector on a single task; transactions reach it
/// through cloned [`HarvestHandle`]s.
pub struct HarvestService {
    traces: HarvestTraces,
    rx: mpsc::UnboundedReceiver<HarvestCommand>,
}

impl HarvestService {
    pub fn new(config: HarvestConfig) -> (Self, HarvestHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            traces: HarvestTraces::new(config),
            rx,
        };
        (service, HarvestHandle { tx })
    }

    pub async fn run(mut self) {
        debug!("Harvest service started");

        while let Some(command) = self.rx.recv().await {
            match command {
                HarvestCommand::Witness(trace) => self.traces.witness(*trace),

                HarvestCommand::Data {
                    run_id,
                    harvest_start,
                    response_tx,
                } => {
                    let response = self.traces.data(&run_id, harvest_start);
                    if response_tx.send(response).is_err() {
                        error!("Failed to send data response - receiver dropped");
                    }
                }

                HarvestCommand::Shutdown => {
                    debug!("Harvest service shutting down");
                    break;
                }
            }
        }

        debug!("Harvest service stopped");
    }
}
