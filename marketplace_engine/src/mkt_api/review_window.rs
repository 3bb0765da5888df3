use chrono::{DateTime, Duration, Utc};

use crate::{
    db_types::SubOrderStatus,
    order_objects::{ItemReviewStatus, ReviewStatus, SubOrderDetails},
};

pub const DEFAULT_REVIEW_WINDOW_DAYS: i64 = 7;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// How long after completion a customer may review the items in a sub-order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewWindow {
    length: Duration,
}

impl Default for ReviewWindow {
    fn default() -> Self {
        Self::days(DEFAULT_REVIEW_WINDOW_DAYS)
    }
}

impl ReviewWindow {
    pub fn days(days: i64) -> Self {
        Self { length: Duration::days(days) }
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    fn elapsed(completed_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (now - completed_at).max(Duration::zero())
    }

    /// The window is open for completed sub-orders up to and including `length` after completion.
    pub fn is_open(&self, status: SubOrderStatus, completed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match completed_at {
            Some(t) if status == SubOrderStatus::Completed => Self::elapsed(t, now) <= self.length,
            _ => false,
        }
    }

    /// Whole days left in the window, rounded up. Zero once the window has closed.
    pub fn days_remaining(&self, completed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
        let Some(t) = completed_at else {
            return 0;
        };
        let remaining = (self.length - Self::elapsed(t, now)).num_milliseconds();
        if remaining <= 0 {
            0
        } else {
            (remaining + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
        }
    }

    pub fn evaluate(&self, details: &SubOrderDetails, now: DateTime<Utc>) -> ReviewStatus {
        let sub_order = &details.sub_order;
        let is_within_window = self.is_open(sub_order.status, sub_order.completed_at, now);
        let items = details
            .items
            .iter()
            .map(|i| ItemReviewStatus {
                order_item_id: i.item.id,
                product_name: i.item.product_name.clone(),
                reviewed: i.reviewed,
            })
            .collect::<Vec<_>>();
        let can_leave_review = is_within_window && items.iter().any(|i| !i.reviewed);
        ReviewStatus {
            sub_order_id: sub_order.id,
            is_within_window,
            days_remaining: self.days_remaining(sub_order.completed_at, now),
            can_leave_review,
            completed_at: sub_order.completed_at,
            items,
        }
    }
}
