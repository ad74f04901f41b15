//! Concurrent evaluation of many (venue, instrument, window) requests
//!
//! Analytics are synchronous, so each evaluation runs on a blocking worker.
//! A semaphore sized to `worker_threads` bounds how many run at once, and each
//! one gets a soft deadline (stages checked between) plus a hard timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use super::generator::{evaluate_with_deadline, EvaluationContext};
use super::util::with_timeout;
use super::MMReport;
use crate::error::AnalyticsError;
use crate::orderbook::types::EvaluationWindow;

/// Extra time a worker gets past its deadline before it is abandoned
const HARD_TIMEOUT_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub venue: String,
    pub instrument: String,
    pub window: EvaluationWindow,
}

impl EvaluationRequest {
    pub fn new(venue: &str, instrument: &str, window: EvaluationWindow) -> Self {
        Self {
            venue: venue.to_string(),
            instrument: instrument.to_string(),
            window,
        }
    }
}

/// Result of one request in a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub request: EvaluationRequest,
    pub result: Result<MMReport, AnalyticsError>,
}

/// Evaluate every request, returning outcomes in request order
///
/// An `Input` error fails only its own request. Evaluations that overrun
/// their budget, or whose worker panics, yield a degraded empty report.
pub async fn evaluate_batch(
    ctx: Arc<EvaluationContext>,
    requests: Vec<EvaluationRequest>,
) -> Vec<BatchOutcome> {
    let semaphore = Arc::new(Semaphore::new(ctx.config().worker_threads));
    let budget = ctx.config().evaluation_timeout();

    tracing::info!(
        requests = requests.len(),
        workers = ctx.config().worker_threads,
        budget_ms = budget.as_millis() as u64,
        "Starting batch evaluation"
    );

    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            let task_request = request.clone();
            let handle = tokio::spawn(async move {
                evaluate_one(ctx, semaphore, &task_request, budget).await
            });
            (request, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (request, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    venue = %request.venue,
                    instrument = %request.instrument,
                    error = %e,
                    "Evaluation task failed"
                );
                Ok(MMReport::degraded(
                    &request.venue,
                    &request.instrument,
                    request.window,
                ))
            }
        };
        outcomes.push(BatchOutcome { request, result });
    }

    outcomes
}

async fn evaluate_one(
    ctx: Arc<EvaluationContext>,
    semaphore: Arc<Semaphore>,
    request: &EvaluationRequest,
    budget: Duration,
) -> Result<MMReport, AnalyticsError> {
    // Reject bad requests before they queue for a worker
    let (venue, instrument) =
        ctx.validate_request(&request.venue, &request.instrument, &request.window)?;
    let window = request.window;

    let permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            tracing::error!(venue = %venue, instrument = %instrument, error = %e, "Worker pool closed");
            return Ok(MMReport::degraded(&venue, &instrument, window));
        }
    };

    let deadline = Instant::now() + budget;
    let worker = {
        let (venue, instrument) = (venue.clone(), instrument.clone());
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            evaluate_with_deadline(&ctx, &venue, &instrument, window, Some(deadline))
        })
    };

    match with_timeout(worker, budget + HARD_TIMEOUT_GRACE, &venue, &instrument).await {
        Ok(result) => result,
        Err(_) => Ok(MMReport::degraded(&venue, &instrument, window)),
    }
}
