//! Admin analytics and monthly revenue targets.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{with_retry, Services};
use crate::domain::aggregates::{Order, OrderStatus, Product, ProductStatus, Role, SalesTarget, User};
use crate::domain::value_objects::MoneyError;
use crate::store::{Scope, Versioned};
use crate::Result;

/// Products at or below this stock level are reported as low.
pub const LOW_STOCK_THRESHOLD: u32 = 5;
const TOP_PRODUCTS: usize = 5;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: Decimal,
    pub total_orders: usize,
    pub orders_by_status: BTreeMap<&'static str, usize>,
    pub average_order_value: Decimal,
    pub total_customers: usize,
    pub active_products: usize,
    pub low_stock: Vec<ProductSummary>,
    pub top_products: Vec<ProductSummary>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub stock: u32,
    pub units_sold: u32,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self { id: p.id(), name: p.name().to_string(), sku: p.sku().to_string(), stock: p.total_stock(), units_sold: p.units_sold() }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue { pub month: u32, pub revenue: Decimal, pub orders: usize }

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProgress {
    pub year: i32,
    pub month: u32,
    pub revenue_target: Option<Decimal>,
    pub achieved: Decimal,
    pub progress: Option<Decimal>,
}

impl Services {
    pub async fn dashboard_stats(&self, now: DateTime<Utc>) -> Result<DashboardStats> {
        let orders: Vec<Order> = self.repo.scan::<Order>(&Scope::all()).await?.into_iter().map(Versioned::into_inner).collect();
        let products: Vec<Product> = self.repo.scan::<Product>(&Scope::all()).await?.into_iter().map(Versioned::into_inner).collect();
        let total_customers = self.repo.scan::<User>(&Scope::tag(Role::User.as_str())).await?.len();

        let mut orders_by_status: BTreeMap<&'static str, usize> = OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for order in &orders {
            *orders_by_status.entry(order.status().as_str()).or_default() += 1;
        }

        let revenue_orders: Vec<&Order> = orders.iter().filter(|o| o.is_revenue()).collect();
        let total_revenue = revenue(revenue_orders.iter().copied())?;
        let average_order_value = if revenue_orders.is_empty() {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(revenue_orders.len())).round_dp(2)
        };

        let monthly_revenue = (1..=12)
            .map(|month| -> Result<MonthlyRevenue> {
                let in_month: Vec<&Order> = revenue_orders.iter()
                    .copied()
                    .filter(|o| o.created_at().year() == now.year() && o.created_at().month() == month)
                    .collect();
                Ok(MonthlyRevenue { month, revenue: revenue(in_month.iter().copied())?, orders: in_month.len() })
            })
            .collect::<Result<Vec<_>>>()?;

        let active: Vec<&Product> = products.iter().filter(|p| p.status() == ProductStatus::Active).collect();
        let mut low_stock: Vec<ProductSummary> = active.iter()
            .filter(|p| p.total_stock() <= LOW_STOCK_THRESHOLD)
            .map(|p| ProductSummary::from(*p))
            .collect();
        low_stock.sort_by_key(|p| p.stock);
        let mut top_products: Vec<ProductSummary> = products.iter().filter(|p| p.units_sold() > 0).map(ProductSummary::from).collect();
        top_products.sort_by(|a, b| b.units_sold.cmp(&a.units_sold).then_with(|| a.name.cmp(&b.name)));
        top_products.truncate(TOP_PRODUCTS);

        Ok(DashboardStats {
            total_revenue,
            total_orders: orders.len(),
            orders_by_status,
            average_order_value,
            total_customers,
            active_products: active.len(),
            low_stock,
            top_products,
            monthly_revenue,
        })
    }

    pub async fn sales_target(&self, year: i32, month: u32) -> Result<TargetProgress> {
        SalesTarget::check_period(year, month)?;
        let target = self.repo.get::<SalesTarget>(&SalesTarget::period_key(year, month)).await?;
        self.target_progress(year, month, target.map(Versioned::into_inner)).await
    }

    /// Creates or replaces the target for the month.
    pub async fn set_sales_target(&self, year: i32, month: u32, revenue_target: Decimal) -> Result<TargetProgress> {
        let target = with_retry("set_sales_target", move || async move {
            let target = match self.repo.get::<SalesTarget>(&SalesTarget::period_key(year, month)).await? {
                Some(mut existing) => { existing.set_revenue_target(revenue_target)?; existing }
                None => Versioned::new(SalesTarget::new(year, month, revenue_target)?),
            };
            let mut uow = self.repo.unit_of_work();
            uow.put(&target)?;
            uow.commit().await?;
            Ok(target.into_inner())
        })
        .await?;
        self.target_progress(year, month, Some(target)).await
    }

    async fn target_progress(&self, year: i32, month: u32, target: Option<SalesTarget>) -> Result<TargetProgress> {
        let orders = self.repo.scan::<Order>(&Scope::all()).await?;
        let achieved = revenue(
            orders.iter()
                .map(|o| &**o)
                .filter(|o| o.is_revenue() && o.created_at().year() == year && o.created_at().month() == month),
        )?;
        Ok(TargetProgress {
            year,
            month,
            revenue_target: target.as_ref().map(SalesTarget::revenue_target),
            progress: target.as_ref().map(|t| t.progress(achieved)).transpose()?,
            achieved,
        })
    }
}

/// Sum of the order totals.
fn revenue<'a>(mut orders: impl Iterator<Item = &'a Order>) -> Result<Decimal> {
    let total = orders.try_fold(Decimal::ZERO, |sum, o| sum.checked_add(o.total().amount()));
    Ok(total.ok_or(MoneyError::Overflow)?)
}
