use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, ActorRole, NewOrder},
    events::{EventProducers, SubOrderStatusChangedEvent},
    mkt_api::{
        errors::MarketplaceError,
        order_objects::{PlacedOrder, StatusChangeRequest, SubOrderDetails},
        transitions::{check_transition, is_visible_to, Transition},
    },
    traits::{OrderManagement, StatusChange},
};

/// `OrderStatusApi` moves sub-orders through their fulfilment lifecycle on behalf of customers and stores.
///
/// Who may do what is decided by the transition table in [`crate::transitions`]. The payment gateway does not go
/// through this API; see [`crate::WebhookApi`].
pub struct OrderStatusApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderStatusApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderStatusApi")
    }
}

impl<B> OrderStatusApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// Checks that `actor` may see the sub-order at all.
///
/// Customers may only see sub-orders of their own orders. Stores may only see their own sub-orders, and only once
/// they have been paid for.
pub fn authorize(actor: &Actor, details: &SubOrderDetails) -> Result<(), MarketplaceError> {
    let sub_order = &details.sub_order;
    match actor.role {
        ActorRole::Customer if details.customer_id != actor.owner_id => {
            Err(MarketplaceError::Forbidden(format!("Sub-order {} does not belong to you", sub_order.id)))
        },
        ActorRole::Store if sub_order.store_id != actor.owner_id => {
            Err(MarketplaceError::Forbidden(format!("Sub-order {} does not belong to your store", sub_order.id)))
        },
        role if !is_visible_to(role, sub_order.status) => Err(MarketplaceError::Forbidden(format!(
            "Sub-order {} is not available until payment has been confirmed",
            sub_order.id
        ))),
        _ => Ok(()),
    }
}

impl<B> OrderStatusApi<B>
where B: OrderManagement
{
    /// Records a checked-out cart. Every sub-order starts out `Pending`, waiting for the payment to clear.
    pub async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, MarketplaceError> {
        if order.sub_orders.is_empty() {
            return Err(MarketplaceError::BadRequest("An order must contain at least one sub-order".into()));
        }
        if order.payment_intent_id.trim().is_empty() {
            return Err(MarketplaceError::BadRequest("An order must have a payment intent".into()));
        }
        for sub_order in &order.sub_orders {
            if sub_order.items.is_empty() {
                return Err(MarketplaceError::BadRequest(format!(
                    "The sub-order for store {} has no items",
                    sub_order.store_id
                )));
            }
            if sub_order.items.iter().any(|i| i.quantity <= 0 || i.unit_price.value() < 0) {
                return Err(MarketplaceError::BadRequest("Quantities must be positive and prices non-negative".into()));
            }
            if self.db.fetch_store(sub_order.store_id).await?.is_none() {
                return Err(MarketplaceError::NotFound(format!("Store {} does not exist", sub_order.store_id)));
            }
        }
        let placed = self.db.place_order(order).await?;
        info!(
            "🔄️📦️ Order #{} placed by customer #{} across {} stores",
            placed.order.id,
            placed.order.customer_id,
            placed.sub_orders.len()
        );
        Ok(placed)
    }

    /// Fetches a sub-order, after checking that `actor` is allowed to see it.
    pub async fn sub_order_details(&self, actor: &Actor, sub_order_id: i64) -> Result<SubOrderDetails, MarketplaceError> {
        let details = self
            .db
            .fetch_sub_order_details(sub_order_id)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("Sub-order {sub_order_id} does not exist")))?;
        authorize(actor, &details)?;
        Ok(details)
    }

    /// Moves a sub-order to the requested status on behalf of `actor`.
    ///
    /// The checks run in this order, and the first failure is returned:
    /// 1. The sub-order must exist (`NotFound`).
    /// 2. It must belong to the actor, and stores cannot see it before payment has been confirmed (`Forbidden`).
    /// 3. The move must be allowed by the transition table (`InvalidTransition`).
    ///
    /// A store re-submitting the current status succeeds without writing anything. Otherwise the status is changed,
    /// a history entry is recorded, and subscribers are notified. `completed_at` is set if the sub-order is now
    /// `Completed`. Carrier and tracking details are only taken from stores.
    ///
    /// If someone else changes the sub-order between the checks and the write, nothing is written and `Conflict` is
    /// returned. The caller may simply retry.
    ///
    /// Returns the sub-order as it stands after the call.
    pub async fn request_transition(
        &self,
        actor: &Actor,
        sub_order_id: i64,
        request: StatusChangeRequest,
    ) -> Result<SubOrderDetails, MarketplaceError> {
        trace!("🔄️ {actor} requests {:?} for sub-order #{sub_order_id}", request.status);
        let details = self.sub_order_details(actor, sub_order_id).await?;
        let to = request.status.ok_or_else(|| MarketplaceError::BadRequest("A status is required".into()))?;
        let from = details.status();
        let transition = check_transition(actor.role, from, to).map_err(|e| {
            warn!("🔄️ Rejected status change for sub-order #{sub_order_id}. {e}");
            MarketplaceError::from(e)
        })?;
        if transition == Transition::Unchanged {
            debug!("🔄️ Sub-order #{sub_order_id} is already {to}. Nothing to do.");
            return Ok(details);
        }
        let (carrier, tracking_number) = match actor.role {
            ActorRole::Store => (request.carrier, request.tracking_number),
            ActorRole::Customer => (None, None),
        };
        let change = StatusChange {
            sub_order_id,
            from,
            to,
            notes: request.notes,
            changed_by: Some(actor.user_id),
            carrier,
            tracking_number,
        };
        let sub_order = self.db.apply_status_change(change).await.map_err(|e| {
            warn!("🔄️ Could not move sub-order #{sub_order_id} from {from} to {to}. {e}");
            MarketplaceError::from(e)
        })?;
        info!("🔄️ Sub-order #{sub_order_id} moved from {from} to {to} by {actor}");
        let event = SubOrderStatusChangedEvent::new(sub_order, from, Some((actor.role, actor.user_id)));
        self.producers.publish_status_changed(event).await;
        self.db
            .fetch_sub_order_details(sub_order_id)
            .await?
            .ok_or_else(|| MarketplaceError::NotFound(format!("Sub-order {sub_order_id} does not exist")))
    }
}
