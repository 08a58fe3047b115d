use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, info_span, Instrument};

use crate::config::{Config, RateProvider};
use crate::currency::{CurrencyNormalizer, HttpRateOracle, RateOracle, StaticRateOracle};
use crate::delivery::{
    delivery_id, DeliveryDispatcher, DeliveryOutcome, DeliveryTransport, LogTransport,
    WebhookTransport,
};
use crate::error::{ConfigError, OfferIngestError};
use crate::extract::{
    AttachmentFetcher, OpenAiExtractor, SourceAggregator, SourceKind, SourceOutcome, SourceReport,
};
use crate::gate::{GateDecision, ValidationGate};
use crate::model::IngestRequest;
use crate::normalize::{NormalizeContext, Normalizer};
use crate::secrets::SecretError;

use super::context::{PipelineEvent, RecordOutcome, RunContext, TaggedCandidate};
use super::error::{PipelineError, PipelineWarning};

fn secret_error(name: &str) -> impl FnOnce(SecretError) -> ConfigError + '_ {
    move |source| ConfigError::Secret {
        name: name.to_string(),
        source,
    }
}

pub struct Pipeline {
    aggregator: SourceAggregator,
    normalizer: Normalizer,
    rates: Arc<dyn RateOracle>,
    dispatcher: DeliveryDispatcher,
    merge_text_context: bool,
}

impl Pipeline {
    /// Production constructor: resolves credentials and builds every oracle
    /// and transport from config.
    pub fn from_config(config: &Config) -> Result<Self, OfferIngestError> {
        let api_key = config
            .extraction
            .api_key_source()
            .resolve()
            .map_err(secret_error("extraction.api_key"))?;
        let oracle = Arc::new(OpenAiExtractor::new(&config.extraction, api_key)?);

        let download_token = config
            .attachments
            .auth_token_source()
            .resolve_optional()
            .map_err(secret_error("attachments.auth_token"))?;
        let fetcher = AttachmentFetcher::from_config(&config.attachments, download_token)?;

        // A source may spend its whole budget downloading and then extracting.
        let source_timeout = config.extraction.timeout()
            + Duration::from_secs(config.attachments.download_timeout_secs);
        let aggregator = SourceAggregator::new(
            oracle,
            fetcher,
            source_timeout,
            config.extraction.max_concurrent_sources,
        );

        let rates: Arc<dyn RateOracle> = match config.rates.provider {
            RateProvider::Http => Arc::new(HttpRateOracle::new(
                config.rates.api_base.clone(),
                Duration::from_secs(config.rates.timeout_secs),
            )?),
            RateProvider::Static => {
                Arc::new(StaticRateOracle::new(config.rates.static_rates.clone()))
            }
        };

        let delivery_timeout = Duration::from_secs(config.delivery.timeout_secs);
        let transport: Arc<dyn DeliveryTransport> = match &config.delivery.webhook_url {
            Some(url) => {
                let token = config
                    .delivery
                    .token_source()
                    .resolve_optional()
                    .map_err(secret_error("delivery.token"))?;
                Arc::new(WebhookTransport::new(url.clone(), token, delivery_timeout)?)
            }
            None => Arc::new(LogTransport),
        };

        Ok(Self::new(
            aggregator,
            Normalizer::from_settings(&config.pipeline),
            rates,
            DeliveryDispatcher::new(transport, delivery_timeout),
            config.pipeline.merge_text_context,
        ))
    }

    /// Assembles a pipeline from already-built parts.
    pub fn new(
        aggregator: SourceAggregator,
        normalizer: Normalizer,
        rates: Arc<dyn RateOracle>,
        dispatcher: DeliveryDispatcher,
        merge_text_context: bool,
    ) -> Self {
        Self {
            aggregator,
            normalizer,
            rates,
            dispatcher,
            merge_text_context,
        }
    }

    pub fn oracle_name(&self) -> &'static str {
        self.aggregator.oracle_name()
    }

    pub fn rate_oracle_name(&self) -> &'static str {
        self.rates.name()
    }

    pub fn transport_name(&self) -> &'static str {
        self.dispatcher.transport_name()
    }

    /// Runs one job. Progress is streamed as [`PipelineEvent`]s so the
    /// caller keeps everything produced before a fatal error or a panic.
    pub async fn run(
        &self,
        ctx: &RunContext,
        request: &IngestRequest,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<(), PipelineError> {
        let span = info_span!(
            "pipeline",
            job_id = %ctx.job_id,
            channel = %request.source_channel,
        );

        async {
            let reports = self
                .aggregator
                .extract_all(request)
                .instrument(info_span!("extract_sources"))
                .await;

            let candidates = self.step_collect(reports, &events).await?;

            self.step_process(candidates, ctx, request, &events)
                .instrument(info_span!("process_candidates"))
                .await;
            Ok::<(), PipelineError>(())
        }
        .instrument(span)
        .await
    }

    /// Flattens source reports into the job's ordered candidate list.
    async fn step_collect(
        &self,
        reports: Vec<SourceReport>,
        events: &mpsc::Sender<PipelineEvent>,
    ) -> Result<Vec<TaggedCandidate>, PipelineError> {
        let total = reports.len();
        let mut failed = 0;
        let mut first_error = None;
        let mut record_failures = 0;
        let mut candidates = Vec::new();

        for report in reports {
            let label = report
                .filename
                .clone()
                .unwrap_or_else(|| report.kind.to_string());

            match report.outcome {
                SourceOutcome::Failed(error) => {
                    failed += 1;
                    first_error.get_or_insert_with(|| error.clone());
                    emit(
                        events,
                        PipelineEvent::Warning(PipelineWarning::SourceFailed {
                            source: label,
                            error,
                        }),
                    )
                    .await;
                }
                SourceOutcome::Extracted(parsed) => {
                    record_failures += parsed.failures.len();
                    for reason in parsed.failures {
                        emit(
                            events,
                            PipelineEvent::Warning(PipelineWarning::RecordFailed {
                                source: label.clone(),
                                reason,
                            }),
                        )
                        .await;
                    }
                    candidates.extend(parsed.candidates.into_iter().map(|raw| TaggedCandidate {
                        raw,
                        kind: report.kind,
                        source_filename: report.filename.clone(),
                    }));
                }
            }
        }

        info!(
            sources = total,
            failed_sources = failed,
            candidates = candidates.len(),
            record_failures,
            "Sources extracted"
        );
        emit(
            events,
            PipelineEvent::SourcesExtracted {
                candidates: candidates.len(),
                record_failures,
                source_failures: failed,
            },
        )
        .await;

        if total > 0 && failed == total {
            return Err(PipelineError::AllSourcesFailed {
                count: total,
                first: first_error.unwrap_or_default(),
            });
        }

        if self.merge_text_context {
            Ok(merge_text_context(candidates))
        } else {
            Ok(candidates)
        }
    }

    /// Normalize, convert, gate and deliver each candidate in order.
    async fn step_process(
        &self,
        candidates: Vec<TaggedCandidate>,
        ctx: &RunContext,
        request: &IngestRequest,
        events: &mpsc::Sender<PipelineEvent>,
    ) {
        let mut currency = CurrencyNormalizer::new(self.rates.clone(), ctx.received_at.date_naive());
        let mut gate = ValidationGate::new();
        let mut sequence = 0;

        for (index, tagged) in candidates.into_iter().enumerate() {
            let normalize_ctx = NormalizeContext {
                job_id: &ctx.job_id,
                index,
                request,
                source_filename: tagged.source_filename.as_deref(),
                received_at: ctx.received_at,
            };
            let offer = self.normalizer.normalize(&tagged.raw, &normalize_ctx);
            let offer = currency.to_eur(offer).await;

            let outcome = match gate.accept(&offer) {
                GateDecision::Accepted => {
                    sequence += 1;
                    let id = delivery_id(&ctx.job_id, sequence);
                    let delivery = self.dispatcher.deliver(&ctx.job_id, &offer, &id).await;
                    if let DeliveryOutcome::Failed(error) = &delivery {
                        emit(
                            events,
                            PipelineEvent::Warning(PipelineWarning::DeliveryFailed {
                                delivery_id: id,
                                error: error.clone(),
                            }),
                        )
                        .await;
                    }
                    RecordOutcome::Accepted {
                        offer: Box::new(offer),
                        delivery,
                    }
                }
                GateDecision::Rejected(reason) => {
                    debug!(index, reason = %reason, "Candidate rejected");
                    RecordOutcome::Rejected(reason)
                }
                GateDecision::Duplicate { product_key } => {
                    debug!(index, product_key = %product_key, "Duplicate candidate dropped");
                    RecordOutcome::Duplicate { product_key }
                }
            };
            emit(events, PipelineEvent::Record(outcome)).await;
        }

        info!(
            accepted = gate.accepted(),
            rejected = gate.rejected(),
            duplicates = gate.duplicates(),
            rate_lookups = currency.lookups(),
            "Candidates processed"
        );
    }
}

/// A closed receiver means nobody is folding results any more; the run
/// finishes regardless.
async fn emit(events: &mpsc::Sender<PipelineEvent>, event: PipelineEvent) {
    let _ = events.send(event).await;
}

/// When the text body yields exactly one candidate and attachments yield
/// candidates too, the body carries offer-wide terms: they fill the gaps
/// of every attachment candidate. The text candidate itself is kept.
pub fn merge_text_context(candidates: Vec<TaggedCandidate>) -> Vec<TaggedCandidate> {
    let mut texts = candidates.iter().filter(|c| c.kind == SourceKind::Text);
    let context = match (texts.next(), texts.next()) {
        (Some(only), None) => only.raw.offer_context(),
        _ => return candidates,
    };
    if context.is_empty() || !candidates.iter().any(|c| c.kind == SourceKind::Attachment) {
        return candidates;
    }

    candidates
        .into_iter()
        .map(|mut candidate| {
            if candidate.kind == SourceKind::Attachment {
                candidate.raw.fill_from(&context);
            }
            candidate
        })
        .collect()
}
