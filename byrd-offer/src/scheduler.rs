//! Lifecycle sweeps.
//!
//! Three independent jobs run on a fixed interval:
//!
//! * **Activate** flips offers whose start date fell inside the lookback window to `active`.
//!   `activated_at` is written once, which makes re-runs harmless.
//! * **Expire** moves active offers past their end date to `expired`.
//! * **Extend** looks at offers ending within the hour and either pushes their end date out
//!   (auto-extend, target not met) or warns the merchant about a shortfall.
//!
//! A per-offer failure is logged and the batch carries on. A failure to load the batch aborts
//! the sweep without advancing its checkpoint, so the next run covers the missed window.

use std::sync::Arc;

use byrd_core::repository::{OfferRepository, SchedulerStateRepository, TransitionSink};
use byrd_core::{CoreError, CoreResult, Offer, OfferPatch, OfferStatus, SweepJob};
use byrd_notify::NotificationDispatcher;
use byrd_shared::models::events::OfferTransitionEvent;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const SWEEP_INTERVAL_SECS: u64 = 15 * 60;

/// Lookback used when no checkpoint exists yet.
pub const FIRST_RUN_LOOKBACK_MINUTES: i64 = 24 * 60;

pub const EXPIRING_WINDOW_HOURS: i64 = 1;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub job: SweepJob,
    pub matched: usize,
    pub processed: usize,
    pub failed: usize,
}

impl SweepReport {
    fn new(job: SweepJob, matched: usize) -> Self {
        Self { job, matched, processed: 0, failed: 0 }
    }
}

/// What the Extend sweep decided for one offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendAction {
    Extend { new_end: DateTime<Utc> },
    TargetMet,
    AlreadyExtended,
    Shortfall,
    Skip,
}

/// Extend-sweep decision for an offer already known to be expiring soon.
pub fn extend_action(offer: &Offer, now: DateTime<Utc>) -> ExtendAction {
    let (Some(met), Some(end)) = (offer.target_met(), offer.end_date) else {
        return ExtendAction::Skip;
    };

    if offer.auto_extend {
        if met {
            return ExtendAction::TargetMet;
        }
        let guard = now - Duration::hours(EXPIRING_WINDOW_HOURS);
        if offer.last_auto_extended_at.is_some_and(|at| at > guard) {
            return ExtendAction::AlreadyExtended;
        }
        return ExtendAction::Extend {
            new_end: end + Duration::days(i64::from(offer.extension_days)),
        };
    }

    if offer.notify_on_shortfall && !met {
        return ExtendAction::Shortfall;
    }
    ExtendAction::Skip
}

/// Lookback in whole minutes since `last_run`, rounded up.
pub fn lookback_minutes(last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match last_run {
        None => FIRST_RUN_LOOKBACK_MINUTES,
        Some(last) => {
            let seconds = (now - last).num_seconds().max(0);
            ((seconds + 59) / 60).max(1)
        }
    }
}

pub struct LifecycleScheduler {
    offers: Arc<dyn OfferRepository>,
    state: Arc<dyn SchedulerStateRepository>,
    notifier: Arc<NotificationDispatcher>,
    transitions: Option<Arc<dyn TransitionSink>>,
}

impl LifecycleScheduler {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        state: Arc<dyn SchedulerStateRepository>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            offers,
            state,
            notifier,
            transitions: None,
        }
    }

    pub fn with_transition_sink(mut self, sink: Arc<dyn TransitionSink>) -> Self {
        self.transitions = Some(sink);
        self
    }

    pub async fn run(&self, job: SweepJob, now: DateTime<Utc>) -> CoreResult<SweepReport> {
        match job {
            SweepJob::Activate => self.activate_sweep(now).await,
            SweepJob::Expire => self.expire_sweep(now).await,
            SweepJob::Extend => self.extend_sweep(now).await,
        }
    }

    pub async fn activate_sweep(&self, now: DateTime<Utc>) -> CoreResult<SweepReport> {
        let last_run = self.state.last_successful_run(SweepJob::Activate).await?;
        let lookback = lookback_minutes(last_run, now);
        tracing::info!(lookback_minutes = lookback, "Activate sweep starting");

        let offers = self.offers.get_offers_to_activate(now, lookback).await?;
        let mut report = SweepReport::new(SweepJob::Activate, offers.len());

        for offer in &offers {
            let patch = OfferPatch {
                status: Some(OfferStatus::Active),
                activated_at: Some(now),
                ..Default::default()
            };
            match self.apply(offer, patch, SweepJob::Activate, now).await {
                Ok(updated) => {
                    report.processed += 1;
                    if let Err(e) = self
                        .notifier
                        .notify_offer_activated(updated.merchant_id, updated.id, &updated.title, now)
                        .await
                    {
                        tracing::warn!(offer_id = %offer.id, "Activation notification failed: {}", e);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(offer_id = %offer.id, title = %offer.title, "Failed to activate offer: {}", e);
                }
            }
        }

        self.checkpoint(SweepJob::Activate, now).await?;
        tracing::info!(matched = report.matched, processed = report.processed, failed = report.failed, "Activate sweep finished");
        Ok(report)
    }

    pub async fn expire_sweep(&self, now: DateTime<Utc>) -> CoreResult<SweepReport> {
        tracing::info!("Expire sweep starting");
        let offers = self.offers.get_offers_to_expire(now).await?;
        let mut report = SweepReport::new(SweepJob::Expire, offers.len());

        for offer in &offers {
            let patch = OfferPatch {
                status: Some(OfferStatus::Expired),
                ..Default::default()
            };
            match self.apply(offer, patch, SweepJob::Expire, now).await {
                Ok(updated) => {
                    report.processed += 1;
                    if let Err(e) = self
                        .notifier
                        .notify_offer_expired(updated.merchant_id, updated.id, &updated.title, now)
                        .await
                    {
                        tracing::warn!(offer_id = %offer.id, "Expiry notification failed: {}", e);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(offer_id = %offer.id, title = %offer.title, "Failed to expire offer: {}", e);
                }
            }
        }

        self.checkpoint(SweepJob::Expire, now).await?;
        tracing::info!(matched = report.matched, processed = report.processed, failed = report.failed, "Expire sweep finished");
        Ok(report)
    }

    pub async fn extend_sweep(&self, now: DateTime<Utc>) -> CoreResult<SweepReport> {
        tracing::info!("Extend sweep starting");
        let offers = self.offers.get_expiring_offers(now, EXPIRING_WINDOW_HOURS).await?;
        let mut report = SweepReport::new(SweepJob::Extend, offers.len());

        for offer in &offers {
            match self.extend_one(offer, now).await {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(offer_id = %offer.id, title = %offer.title, "Failed to process expiring offer: {}", e);
                }
            }
        }

        self.checkpoint(SweepJob::Extend, now).await?;
        tracing::info!(matched = report.matched, processed = report.processed, failed = report.failed, "Extend sweep finished");
        Ok(report)
    }

    async fn extend_one(&self, offer: &Offer, now: DateTime<Utc>) -> CoreResult<()> {
        match extend_action(offer, now) {
            ExtendAction::Extend { new_end } => {
                let patch = OfferPatch {
                    end_date: Some(new_end),
                    last_auto_extended_at: Some(now),
                    ..Default::default()
                };
                let updated = self.apply(offer, patch, SweepJob::Extend, now).await?;
                let target = updated.target_units.unwrap_or_default();
                if let Err(e) = self
                    .notifier
                    .notify_auto_extend(updated.merchant_id, updated.id, &updated.title, updated.units_sold, target, new_end, now)
                    .await
                {
                    tracing::warn!(offer_id = %offer.id, "Auto-extend notification failed: {}", e);
                }
            }
            ExtendAction::TargetMet => {
                tracing::info!(offer_id = %offer.id, "Target met, letting offer expire");
            }
            ExtendAction::AlreadyExtended => {
                tracing::debug!(offer_id = %offer.id, "Extended within the current window, skipping");
            }
            ExtendAction::Shortfall => {
                let target = offer.target_units.unwrap_or_default();
                self.notifier
                    .notify_shortfall_warning(offer.merchant_id, offer.id, &offer.title, offer.units_sold, target, now)
                    .await?;
            }
            ExtendAction::Skip => {}
        }
        Ok(())
    }

    async fn apply(&self, offer: &Offer, patch: OfferPatch, job: SweepJob, now: DateTime<Utc>) -> CoreResult<Offer> {
        let updated = self
            .offers
            .update_offer(offer.id, offer.merchant_id, patch)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("offer {}", offer.id)))?;

        if let Some(sink) = &self.transitions {
            let event = OfferTransitionEvent {
                offer_id: updated.id,
                merchant_id: updated.merchant_id,
                job: job.as_str().to_string(),
                from_status: offer.status.to_string(),
                to_status: updated.status.to_string(),
                end_date: updated.end_date,
                timestamp: now.timestamp(),
            };
            if let Err(e) = sink.publish_transition(&event).await {
                tracing::warn!(offer_id = %offer.id, "Failed to publish transition: {}", e);
            }
        }
        Ok(updated)
    }

    async fn checkpoint(&self, job: SweepJob, now: DateTime<Utc>) -> CoreResult<()> {
        self.state.record_successful_run(job, now).await?;
        Ok(())
    }
}
