use sea_orm::{
    sea_query::Expr, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait,
    QuerySelect,
};
use serde::Serialize;

use crate::entities::{
    order::{self, Status},
    product, user,
};
use crate::error::ApiError;

/// Per-status order counts, serialized as `pendingOrders`, `confirmedOrders`
/// and so on.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    #[serde(rename = "pendingOrders")]
    pub pending: u64,
    #[serde(rename = "confirmedOrders")]
    pub confirmed: u64,
    #[serde(rename = "shippedOrders")]
    pub shipped: u64,
    #[serde(rename = "deliveredOrders")]
    pub delivered: u64,
    #[serde(rename = "cancelledOrders")]
    pub cancelled: u64,
}

impl StatusCounts {
    fn slot(&mut self, status: Status) -> &mut u64 {
        match status {
            Status::Pending => &mut self.pending,
            Status::Confirmed => &mut self.confirmed,
            Status::Shipped => &mut self.shipped,
            Status::Delivered => &mut self.delivered,
            Status::Cancelled => &mut self.cancelled,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_users: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub total_revenue: f64,
    pub orders_by_status: StatusCounts,
}

#[derive(FromQueryResult)]
struct StatusRow {
    status: Status,
    orders: i64,
    revenue: Option<f64>,
}

/// Store-wide totals. Revenue counts every order except cancelled ones.
pub async fn dashboard(db: &DatabaseConnection) -> Result<Dashboard, ApiError> {
    let total_users = user::Entity::find().count(db).await?;
    let total_products = product::Entity::find().count(db).await?;

    let rows = order::Entity::find()
        .select_only()
        .column(order::Column::Status)
        .column_as(Expr::col(order::Column::Id).count(), "orders")
        .column_as(Expr::col(order::Column::TotalPrice).sum(), "revenue")
        .group_by(order::Column::Status)
        .into_model::<StatusRow>()
        .all(db)
        .await?;

    let mut counts = StatusCounts::default();
    let mut total_orders = 0;
    let mut total_revenue = 0.0;
    for row in rows {
        let orders = u64::try_from(row.orders).unwrap_or_default();
        *counts.slot(row.status) += orders;
        total_orders += orders;
        if row.status != Status::Cancelled {
            total_revenue += row.revenue.unwrap_or_default();
        }
    }

    Ok(Dashboard {
        total_users,
        total_products,
        total_orders,
        total_revenue,
        orders_by_status: counts,
    })
}
