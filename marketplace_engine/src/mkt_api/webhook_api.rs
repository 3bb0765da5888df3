use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{PaymentStatus, Store, SubOrderStatus, TransferStatus},
    events::{EventProducers, PaymentReconciledEvent},
    helpers::EventVerifier,
    mkt_api::{
        errors::MarketplaceError,
        gateway_events::{
            payout_state_from_account,
            payout_state_from_capabilities,
            PayoutCapability,
            PayoutState,
            ReconcileAction,
            TransferRef,
        },
    },
    traits::{PaymentOutcome, PaymentReconciliation, PayoutStateUpdate, TransferSettlement},
};

/// A payout state write that keeps losing to concurrent deliveries is abandoned after this many attempts.
const MAX_PAYOUT_WRITE_ATTEMPTS: usize = 5;

/// What happened to a verified gateway event. Every variant is a success as far as the gateway is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookOutcome {
    /// The event changed marketplace state
    Applied,
    /// The event, or a later one that supersedes it, has been applied before
    AlreadyApplied,
    /// The payment, store or transfer the event refers to is not ours
    EntityNotFound,
    /// The event type is of no interest to the marketplace
    Ignored,
}

/// `WebhookApi` reconciles payment gateway events with marketplace state.
///
/// The gateway delivers events at least once, so every handler is idempotent: each checks whether its change has
/// already been made, and the backend refuses to apply a change if the record moved on in the meantime.
/// The gateway is the source of truth for payment outcomes, so sub-orders are moved directly rather than through
/// the transition table.
pub struct WebhookApi<B, V> {
    db: B,
    verifier: V,
    producers: EventProducers,
}

impl<B, V> Debug for WebhookApi<B, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B, V> WebhookApi<B, V> {
    pub fn new(db: B, verifier: V, producers: EventProducers) -> Self {
        Self { db, verifier, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, V> WebhookApi<B, V>
where
    B: PaymentReconciliation,
    V: EventVerifier,
{
    /// Verifies the delivery and applies the event it carries.
    ///
    /// A delivery that fails verification is rejected with `Unauthenticated` before anything is read from storage.
    /// Storage failures are returned as errors so that the gateway retries the delivery later.
    pub async fn handle_event(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, MarketplaceError> {
        let event = self.verifier.verify_and_parse(payload, signature_header).map_err(|e| {
            warn!("📨️ Rejecting webhook delivery. {e}");
            MarketplaceError::from(e)
        })?;
        debug!("📨️ Received gateway event {} ({})", event.id, event.event_type);
        let outcome = match event.classify() {
            ReconcileAction::PaymentSucceeded { payment_intent_id } => {
                self.payment_succeeded(&payment_intent_id).await?
            },
            ReconcileAction::PaymentFailed { payment_intent_id, failure_message } => {
                self.payment_failed(&payment_intent_id, failure_message).await?
            },
            ReconcileAction::PaymentRefunded { payment_intent_id } => self.payment_refunded(&payment_intent_id).await?,
            ReconcileAction::AccountUpdated { account_id, charges_enabled, payouts_enabled, currently_due } => {
                let state = payout_state_from_account(charges_enabled, payouts_enabled, &currently_due);
                self.account_updated(&account_id, state).await?
            },
            ReconcileAction::CapabilityUpdated { account_id, capability, status } => {
                self.capability_updated(&account_id, capability, status).await?
            },
            ReconcileAction::AccountDeauthorized { account_id } => self.account_deauthorized(&account_id).await?,
            ReconcileAction::TransferCreated(transfer) => {
                self.settle_transfer(transfer, TransferStatus::Completed, None).await?
            },
            ReconcileAction::TransferReversed(transfer) => {
                let reason = Some(format!("Transfer reversed ({})", event.id));
                self.settle_transfer(transfer, TransferStatus::Failed, reason).await?
            },
            ReconcileAction::Ignore(reason) => {
                info!("📨️ Ignoring event {}. {reason}", event.id);
                WebhookOutcome::Ignored
            },
        };
        debug!("📨️ Event {} ({}) handled: {outcome:?}", event.id, event.event_type);
        Ok(outcome)
    }

    async fn apply_payment_outcome(&self, outcome: PaymentOutcome) -> Result<WebhookOutcome, MarketplaceError> {
        let payment_id = outcome.payment_id;
        match self.db.apply_payment_outcome(outcome).await? {
            Some(applied) => {
                let event = PaymentReconciledEvent::new(applied.payment, applied.sub_orders);
                self.producers.publish_payment_reconciled(event).await;
                Ok(WebhookOutcome::Applied)
            },
            None => {
                info!("📨️ Payment #{payment_id} was updated by a concurrent delivery. Nothing more to do.");
                Ok(WebhookOutcome::AlreadyApplied)
            },
        }
    }

    /// Marks the payment as paid, confirms the pending sub-orders and queues the store payouts.
    async fn payment_succeeded(&self, payment_intent_id: &str) -> Result<WebhookOutcome, MarketplaceError> {
        let Some(payment) = self.db.fetch_payment_by_intent_id(payment_intent_id).await? else {
            info!("📨️ No payment for intent {payment_intent_id}. Dropping the success event.");
            return Ok(WebhookOutcome::EntityNotFound);
        };
        // A refunded payment succeeded at some point; this is a replay of that.
        if matches!(payment.status, PaymentStatus::Succeeded | PaymentStatus::Refunded) {
            debug!("📨️ Payment #{} is already {}", payment.id, payment.status);
            return Ok(WebhookOutcome::AlreadyApplied);
        }
        let outcome = PaymentOutcome {
            payment_id: payment.id,
            expected_status: payment.status,
            new_status: PaymentStatus::Succeeded,
            failure_message: None,
            affected_sub_orders: vec![SubOrderStatus::Pending],
            sub_order_status: SubOrderStatus::Confirmed,
            notes: "Payment received".into(),
            create_transfers: true,
            fail_pending_transfers: false,
        };
        self.apply_payment_outcome(outcome).await
    }

    /// Marks the payment as failed, and fails every sub-order that has not started fulfilment.
    async fn payment_failed(
        &self,
        payment_intent_id: &str,
        failure_message: Option<String>,
    ) -> Result<WebhookOutcome, MarketplaceError> {
        let Some(payment) = self.db.fetch_payment_by_intent_id(payment_intent_id).await? else {
            info!("📨️ No payment for intent {payment_intent_id}. Dropping the failure event.");
            return Ok(WebhookOutcome::EntityNotFound);
        };
        if matches!(payment.status, PaymentStatus::Failed | PaymentStatus::Refunded) {
            debug!("📨️ Payment #{} is already {}", payment.id, payment.status);
            return Ok(WebhookOutcome::AlreadyApplied);
        }
        let message = failure_message.unwrap_or_else(|| "Payment failed".to_string());
        let outcome = PaymentOutcome {
            payment_id: payment.id,
            expected_status: payment.status,
            new_status: PaymentStatus::Failed,
            notes: format!("Payment failed: {message}"),
            failure_message: Some(message),
            affected_sub_orders: vec![SubOrderStatus::Pending, SubOrderStatus::Confirmed],
            sub_order_status: SubOrderStatus::Failed,
            create_transfers: false,
            fail_pending_transfers: true,
        };
        self.apply_payment_outcome(outcome).await
    }

    /// Marks a paid payment as refunded, along with every sub-order that is still live.
    async fn payment_refunded(&self, payment_intent_id: &str) -> Result<WebhookOutcome, MarketplaceError> {
        let Some(payment) = self.db.fetch_payment_by_intent_id(payment_intent_id).await? else {
            info!("📨️ No payment for intent {payment_intent_id}. Dropping the refund event.");
            return Ok(WebhookOutcome::EntityNotFound);
        };
        match payment.status {
            PaymentStatus::Refunded => return Ok(WebhookOutcome::AlreadyApplied),
            PaymentStatus::Succeeded => {},
            status => {
                warn!("📨️ Payment #{} is {status}, so it cannot be refunded. Ignoring the refund.", payment.id);
                return Ok(WebhookOutcome::Ignored);
            },
        }
        let outcome = PaymentOutcome {
            payment_id: payment.id,
            expected_status: PaymentStatus::Succeeded,
            new_status: PaymentStatus::Refunded,
            failure_message: None,
            affected_sub_orders: vec![
                SubOrderStatus::Pending,
                SubOrderStatus::Confirmed,
                SubOrderStatus::Processing,
                SubOrderStatus::Delivering,
                SubOrderStatus::Shipped,
                SubOrderStatus::Completed,
            ],
            sub_order_status: SubOrderStatus::Refunded,
            notes: "Payment refunded".into(),
            create_transfers: false,
            fail_pending_transfers: true,
        };
        self.apply_payment_outcome(outcome).await
    }

    /// Derives the store's new payout state from its current row, and writes it if anything changed.
    ///
    /// Capability events for the same account tend to arrive together, and each one only knows about one column. If
    /// another delivery changes the row between the read and the write, the write is refused, and the state is
    /// derived again from the fresh row.
    async fn reconcile_payout_state<F>(&self, account_id: &str, derive: F) -> Result<WebhookOutcome, MarketplaceError>
    where F: Fn(&Store) -> PayoutStateUpdate {
        for attempt in 1..=MAX_PAYOUT_WRITE_ATTEMPTS {
            let Some(store) = self.db.fetch_store_by_account_id(account_id).await? else {
                info!("📨️ No store is connected to account {account_id}");
                return Ok(WebhookOutcome::EntityNotFound);
            };
            let update = derive(&store);
            let unchanged = store.payout_enabled == update.payout_enabled &&
                store.payout_account_status == Some(update.status) &&
                store.card_payments_capability == update.card_payments_capability &&
                store.transfers_capability == update.transfers_capability;
            if unchanged {
                debug!("📨️ Payout state for store #{} is unchanged", store.id);
                return Ok(WebhookOutcome::AlreadyApplied);
            }
            if let Some(updated) = self.db.update_store_payout_state(&store, update).await? {
                info!(
                    "📨️ Store #{} payout account is now {:?} (payouts enabled: {})",
                    updated.id, updated.payout_account_status, updated.payout_enabled
                );
                return Ok(WebhookOutcome::Applied);
            }
            debug!("📨️ Store #{} changed while its payout state was being updated (attempt {attempt})", store.id);
        }
        warn!("📨️ Gave up updating the payout state for account {account_id}. The gateway will retry.");
        Err(MarketplaceError::Conflict(format!("The payout state for account {account_id} keeps changing")))
    }

    async fn account_updated(&self, account_id: &str, state: PayoutState) -> Result<WebhookOutcome, MarketplaceError> {
        self.reconcile_payout_state(account_id, |store| PayoutStateUpdate {
            payout_enabled: state.payout_enabled,
            status: state.status,
            card_payments_capability: store.card_payments_capability.clone(),
            transfers_capability: store.transfers_capability.clone(),
        })
        .await
    }

    async fn capability_updated(
        &self,
        account_id: &str,
        capability: PayoutCapability,
        status: String,
    ) -> Result<WebhookOutcome, MarketplaceError> {
        self.reconcile_payout_state(account_id, |store| {
            let (card_payments, transfers) = match capability {
                PayoutCapability::CardPayments => (Some(status.clone()), store.transfers_capability.clone()),
                PayoutCapability::Transfers => (store.card_payments_capability.clone(), Some(status.clone())),
            };
            let other = match capability {
                PayoutCapability::CardPayments => transfers.as_deref(),
                PayoutCapability::Transfers => card_payments.as_deref(),
            };
            let state = payout_state_from_capabilities(&status, other);
            PayoutStateUpdate {
                payout_enabled: state.payout_enabled,
                status: state.status,
                card_payments_capability: card_payments,
                transfers_capability: transfers,
            }
        })
        .await
    }

    async fn account_deauthorized(&self, account_id: &str) -> Result<WebhookOutcome, MarketplaceError> {
        let Some(store) = self.db.fetch_store_by_account_id(account_id).await? else {
            info!("📨️ No store is connected to account {account_id}. It may have been disconnected already.");
            return Ok(WebhookOutcome::EntityNotFound);
        };
        match self.db.disconnect_store_account(store.id).await? {
            Some(_) => {
                info!("📨️ Store #{} has been disconnected from account {account_id}", store.id);
                Ok(WebhookOutcome::Applied)
            },
            None => Ok(WebhookOutcome::AlreadyApplied),
        }
    }

    /// Records the gateway's verdict on a store transfer. Created transfers only settle from `Pending`; reversals
    /// apply to any transfer that has not already failed.
    async fn settle_transfer(
        &self,
        transfer: TransferRef,
        new_status: TransferStatus,
        failure_message: Option<String>,
    ) -> Result<WebhookOutcome, MarketplaceError> {
        let TransferRef { transfer_id, payment_intent_id, destination } = transfer;
        let Some(existing) = self.db.fetch_store_transfer(&payment_intent_id, &destination).await? else {
            info!("📨️ No store transfer for intent {payment_intent_id} to {destination}");
            return Ok(WebhookOutcome::EntityNotFound);
        };
        let applicable = match new_status {
            TransferStatus::Completed => existing.status == TransferStatus::Pending,
            _ => existing.status != new_status,
        };
        if !applicable {
            debug!("📨️ Store transfer #{} is already {}", existing.id, existing.status);
            return Ok(WebhookOutcome::AlreadyApplied);
        }
        let settlement = TransferSettlement {
            transfer_id: existing.id,
            expected_status: existing.status,
            new_status,
            external_transfer_id: transfer_id,
            failure_message,
        };
        match self.db.settle_store_transfer(settlement).await? {
            Some(t) => {
                info!("📨️ Store transfer #{} to store #{} is now {}", t.id, t.store_id, t.status);
                Ok(WebhookOutcome::Applied)
            },
            None => Ok(WebhookOutcome::AlreadyApplied),
        }
    }
}
