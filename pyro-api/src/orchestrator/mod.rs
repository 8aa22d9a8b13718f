//! Analysis orchestration
//!
//! One orchestrator run drives one analysis end to end: fan out to the
//! three observation providers concurrently, record each outcome as it
//! lands, fuse once all slots resolve, file the incident ticket when risk
//! clears the threshold, then mark the record terminal and close the
//! progress channel.
//!
//! The orchestrator is the sole writer of its record. A watchdog bounds
//! the whole run: budget expiry or a user cancel abandons in-flight
//! adapters and finishes as `timed_out`, keeping whatever observations
//! resolved before the deadline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pyro_common::events::AnalysisEvent;
use pyro_common::model::{AnalysisStatus, ProviderObservation};

use crate::fusion::{self, RiskPolicy};
use crate::providers::ProviderSet;
use crate::registry::AnalysisRegistry;

/// Drives submitted analyses through the pipeline
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    registry: AnalysisRegistry,
    providers: Arc<ProviderSet>,
    policy: RiskPolicy,
    budget: Duration,
}

impl AnalysisOrchestrator {
    pub fn new(
        registry: AnalysisRegistry,
        providers: Arc<ProviderSet>,
        policy: RiskPolicy,
        budget: Duration,
    ) -> Self {
        Self {
            registry,
            providers,
            policy,
            budget,
        }
    }

    /// Execute the analysis registered under `analysis_id`.
    ///
    /// The record must already be in the registry; the API layer inserts
    /// it before spawning this run.
    pub async fn run(&self, analysis_id: Uuid, cancel_token: CancellationToken) {
        let Some(record) = self.registry.snapshot(analysis_id).await else {
            tracing::error!(%analysis_id, "orchestrator started for unregistered analysis");
            return;
        };
        let request = record.request.clone();

        tracing::info!(
            %analysis_id,
            latitude = request.latitude,
            longitude = request.longitude,
            demo_mode = request.demo_mode,
            "analysis started"
        );

        // Fan out: all three provider fetches run concurrently. Each task
        // returns its normalized outcome; nothing mutates shared state.
        let mut fetches: JoinSet<ProviderObservation> = JoinSet::new();
        {
            let provider = Arc::clone(&self.providers.vegetation);
            let request = request.clone();
            fetches.spawn(async move {
                ProviderObservation::Vegetation(provider.fetch(&request).await)
            });
        }
        {
            let provider = Arc::clone(&self.providers.weather);
            let request = request.clone();
            fetches
                .spawn(async move { ProviderObservation::Weather(provider.fetch(&request).await) });
        }
        {
            let provider = Arc::clone(&self.providers.infrastructure);
            let request = request.clone();
            fetches.spawn(async move {
                ProviderObservation::Infrastructure(provider.fetch(&request).await)
            });
        }

        // Collect outcomes under the watchdog
        let deadline = tokio::time::sleep(self.budget);
        tokio::pin!(deadline);
        let mut timeout_message: Option<&str> = None;

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    timeout_message = Some("overall analysis budget exceeded");
                    break;
                }
                _ = cancel_token.cancelled() => {
                    timeout_message = Some("analysis cancelled");
                    break;
                }
                joined = fetches.join_next() => match joined {
                    Some(Ok(observation)) => {
                        let kind = observation.kind();
                        tracing::info!(
                            %analysis_id,
                            provider = %kind,
                            success = observation.is_success(),
                            "observation resolved"
                        );

                        let updated = self
                            .registry
                            .update(analysis_id, |record| {
                                record.observations.record(observation.clone());
                            })
                            .await;
                        if updated.is_err() {
                            self.fail(analysis_id, "analysis record lost mid-run").await;
                            return;
                        }

                        self.registry
                            .publish(
                                analysis_id,
                                AnalysisEvent::ObservationUpdated {
                                    analysis_id,
                                    kind,
                                    observation,
                                    timestamp: Utc::now(),
                                },
                            )
                            .await;
                    }
                    Some(Err(join_error)) => {
                        self.fail(
                            analysis_id,
                            &format!("provider task aborted: {}", join_error),
                        )
                        .await;
                        return;
                    }
                    None => break,
                },
            }
        }

        if let Some(message) = timeout_message {
            // Abandon whatever is still in flight; their eventual results
            // are discarded. Partial observations stay on the record.
            fetches.abort_all();
            tracing::warn!(%analysis_id, message, "analysis timed out");
            self.finish(analysis_id, AnalysisStatus::TimedOut, Some(message.to_string()))
                .await;
            return;
        }

        // Fuse: all three slots resolved (successes or failure markers)
        let fused = self
            .registry
            .update(analysis_id, |record| {
                debug_assert!(record.observations.is_complete());
                if record.risk_assessment.is_none() {
                    record.risk_assessment = Some(fusion::fuse(
                        record.request.coordinates(),
                        &record.observations,
                        &self.policy,
                    ));
                }
            })
            .await;

        let snapshot = match fused {
            Ok(snapshot) => snapshot,
            Err(_) => {
                self.fail(analysis_id, "analysis record lost before fusion").await;
                return;
            }
        };
        let assessment = snapshot
            .risk_assessment
            .clone()
            .expect("fusion just populated the assessment");

        tracing::info!(
            %analysis_id,
            risk_level = assessment.risk_level,
            severity = %assessment.severity,
            confidence = assessment.confidence,
            "risk assessment computed"
        );

        self.registry
            .publish(
                analysis_id,
                AnalysisEvent::RiskComputed {
                    analysis_id,
                    assessment: assessment.clone(),
                    timestamp: Utc::now(),
                },
            )
            .await;

        // Ticket step is best-effort and only above the policy threshold
        if assessment.risk_level >= self.policy.ticket_threshold {
            match self.providers.ticketing.create_ticket(&snapshot).await {
                Ok(ticket_url) => {
                    tracing::info!(%analysis_id, ticket_url, "incident ticket created");
                    let updated = self
                        .registry
                        .update(analysis_id, |record| {
                            record.ticket_url = Some(ticket_url.clone());
                        })
                        .await;
                    if updated.is_ok() {
                        self.registry
                            .publish(
                                analysis_id,
                                AnalysisEvent::TicketCreated {
                                    analysis_id,
                                    ticket_url,
                                    timestamp: Utc::now(),
                                },
                            )
                            .await;
                    }
                }
                Err(reason) => {
                    tracing::warn!(%analysis_id, %reason, "ticket creation failed, continuing");
                }
            }
        } else {
            tracing::info!(
                %analysis_id,
                risk_level = assessment.risk_level,
                threshold = self.policy.ticket_threshold,
                "risk below threshold, no incident ticket"
            );
        }

        self.finish(analysis_id, AnalysisStatus::Completed, None).await;
    }

    /// Terminal bookkeeping: status transition, final event, channel close
    async fn finish(
        &self,
        analysis_id: Uuid,
        status: AnalysisStatus,
        error_message: Option<String>,
    ) {
        let updated = self
            .registry
            .update(analysis_id, |record| {
                record.transition_to(status);
                if record.error_message.is_none() {
                    record.error_message = error_message.clone();
                }
            })
            .await;

        let processing_time_seconds = updated
            .map(|record| record.processing_time_seconds())
            .unwrap_or(0.0);

        self.registry
            .publish(
                analysis_id,
                AnalysisEvent::Completed {
                    analysis_id,
                    status,
                    processing_time_seconds,
                    timestamp: Utc::now(),
                },
            )
            .await;
        self.registry.close(analysis_id).await;

        tracing::info!(
            %analysis_id,
            %status,
            elapsed_seconds = processing_time_seconds,
            "analysis finished"
        );
    }

    /// Internal-fault path: surface the message, then terminate as failed
    async fn fail(&self, analysis_id: Uuid, message: &str) {
        tracing::error!(%analysis_id, message, "analysis failed");
        self.registry
            .publish(
                analysis_id,
                AnalysisEvent::Errored {
                    analysis_id,
                    message: message.to_string(),
                    timestamp: Utc::now(),
                },
            )
            .await;
        self.finish(
            analysis_id,
            AnalysisStatus::Failed,
            Some(message.to_string()),
        )
        .await;
    }
}
