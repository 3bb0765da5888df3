//! Payment gateway event envelopes, and the reconciliation actions they map to.
//!
//! The gateway's event type strings are an open set. Only the handful listed in [`GatewayEvent::classify`] affect
//! marketplace state; everything else is acknowledged and ignored.
use log::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::PayoutAccountStatus;

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";
pub const CHARGE_REFUNDED: &str = "charge.refunded";
pub const ACCOUNT_UPDATED: &str = "account.updated";
pub const CAPABILITY_UPDATED: &str = "capability.updated";
pub const ACCOUNT_DEAUTHORIZED: &str = "account.application.deauthorized";
pub const TRANSFER_CREATED: &str = "transfer.created";
pub const TRANSFER_REVERSED: &str = "transfer.reversed";

pub const CAPABILITY_ACTIVE: &str = "active";
pub const CAPABILITY_PENDING: &str = "pending";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// The connected account the event relates to, if any
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

//--------------------------------------  Event data objects  ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
struct PaymentIntentObject {
    id: String,
    #[serde(default)]
    last_payment_error: Option<PaymentErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
struct PaymentErrorObject {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChargeObject {
    #[serde(default)]
    payment_intent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AccountObject {
    id: String,
    #[serde(default)]
    charges_enabled: bool,
    #[serde(default)]
    payouts_enabled: bool,
    #[serde(default)]
    requirements: Option<RequirementsObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RequirementsObject {
    #[serde(default)]
    currently_due: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CapabilityObject {
    id: String,
    account: String,
    status: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TransferObject {
    id: String,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    transfer_group: Option<String>,
}

//--------------------------------------  ReconcileAction     ---------------------------------------------------------
/// The two capabilities that determine whether a store can be paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutCapability {
    CardPayments,
    Transfers,
}

impl PayoutCapability {
    pub fn from_capability_id(id: &str) -> Option<Self> {
        match id {
            "card_payments" => Some(Self::CardPayments),
            "transfers" => Some(Self::Transfers),
            _ => None,
        }
    }
}

/// Identifies a store transfer at the gateway: the transfer group is the payment intent id, and the destination is
/// the store's connected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRef {
    pub transfer_id: String,
    pub payment_intent_id: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileAction {
    PaymentSucceeded { payment_intent_id: String },
    PaymentFailed { payment_intent_id: String, failure_message: Option<String> },
    PaymentRefunded { payment_intent_id: String },
    AccountUpdated { account_id: String, charges_enabled: bool, payouts_enabled: bool, currently_due: Vec<String> },
    CapabilityUpdated { account_id: String, capability: PayoutCapability, status: String },
    AccountDeauthorized { account_id: String },
    TransferCreated(TransferRef),
    TransferReversed(TransferRef),
    Ignore(String),
}

impl GatewayEvent {
    fn object<T: DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| format!("{} event {} has an unexpected data object. {e}", self.event_type, self.id))
    }

    /// Maps the event to the marketplace state change it calls for.
    pub fn classify(&self) -> ReconcileAction {
        match self.try_classify() {
            Ok(action) => action,
            Err(reason) => {
                warn!("📨️ {reason}");
                ReconcileAction::Ignore(reason)
            },
        }
    }

    fn try_classify(&self) -> Result<ReconcileAction, String> {
        let action = match self.event_type.as_str() {
            PAYMENT_INTENT_SUCCEEDED => {
                let intent = self.object::<PaymentIntentObject>()?;
                ReconcileAction::PaymentSucceeded { payment_intent_id: intent.id }
            },
            PAYMENT_INTENT_FAILED => {
                let intent = self.object::<PaymentIntentObject>()?;
                let failure_message = intent.last_payment_error.and_then(|e| e.message);
                ReconcileAction::PaymentFailed { payment_intent_id: intent.id, failure_message }
            },
            CHARGE_REFUNDED => {
                let charge = self.object::<ChargeObject>()?;
                let payment_intent_id =
                    charge.payment_intent.ok_or_else(|| format!("Charge in event {} has no payment intent", self.id))?;
                ReconcileAction::PaymentRefunded { payment_intent_id }
            },
            ACCOUNT_UPDATED => {
                let account = self.object::<AccountObject>()?;
                ReconcileAction::AccountUpdated {
                    account_id: account.id,
                    charges_enabled: account.charges_enabled,
                    payouts_enabled: account.payouts_enabled,
                    currently_due: account.requirements.unwrap_or_default().currently_due,
                }
            },
            CAPABILITY_UPDATED => {
                let cap = self.object::<CapabilityObject>()?;
                match PayoutCapability::from_capability_id(&cap.id) {
                    Some(capability) => {
                        ReconcileAction::CapabilityUpdated { account_id: cap.account, capability, status: cap.status }
                    },
                    None => ReconcileAction::Ignore(format!("Capability {} does not affect payouts", cap.id)),
                }
            },
            ACCOUNT_DEAUTHORIZED => {
                let account_id =
                    self.account.clone().ok_or_else(|| format!("Deauthorization {} has no account", self.id))?;
                ReconcileAction::AccountDeauthorized { account_id }
            },
            TRANSFER_CREATED | TRANSFER_REVERSED => {
                let transfer = self.object::<TransferObject>()?;
                let (Some(payment_intent_id), Some(destination)) = (transfer.transfer_group, transfer.destination)
                else {
                    return Err(format!("Transfer {} is missing its transfer group or destination", transfer.id));
                };
                let transfer = TransferRef { transfer_id: transfer.id, payment_intent_id, destination };
                if self.event_type == TRANSFER_CREATED {
                    ReconcileAction::TransferCreated(transfer)
                } else {
                    ReconcileAction::TransferReversed(transfer)
                }
            },
            other => ReconcileAction::Ignore(format!("Unhandled event type {other}")),
        };
        Ok(action)
    }
}

//--------------------------------------  Payout derivation   ---------------------------------------------------------
/// What a store's payout columns should read after an account or capability update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutState {
    pub payout_enabled: bool,
    pub status: PayoutAccountStatus,
}

/// `complete` iff both charges and payouts are enabled; otherwise `pending` while there are outstanding
/// requirements, and `restricted` when there are none left to satisfy.
pub fn payout_state_from_account(charges_enabled: bool, payouts_enabled: bool, currently_due: &[String]) -> PayoutState {
    if charges_enabled && payouts_enabled {
        PayoutState { payout_enabled: true, status: PayoutAccountStatus::Complete }
    } else if !currently_due.is_empty() {
        PayoutState { payout_enabled: false, status: PayoutAccountStatus::Pending }
    } else {
        PayoutState { payout_enabled: false, status: PayoutAccountStatus::Restricted }
    }
}

/// Derives the payout state after one capability reports `reported`, given the last known status of the other one.
///
/// Both active means the store can be paid. Otherwise payouts are off, and the account is `pending` if the reported
/// capability is pending, or if it is active but the other one has not caught up yet. Anything else is `restricted`.
pub fn payout_state_from_capabilities(reported: &str, other: Option<&str>) -> PayoutState {
    let other_active = other == Some(CAPABILITY_ACTIVE);
    match reported {
        CAPABILITY_ACTIVE if other_active => PayoutState { payout_enabled: true, status: PayoutAccountStatus::Complete },
        CAPABILITY_ACTIVE | CAPABILITY_PENDING => {
            PayoutState { payout_enabled: false, status: PayoutAccountStatus::Pending }
        },
        _ => PayoutState { payout_enabled: false, status: PayoutAccountStatus::Restricted },
    }
}
