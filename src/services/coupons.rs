use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{with_retry, Services};
use crate::domain::aggregates::{Coupon, CouponTerms, Discount};
use crate::domain::pricing::Quote;
use crate::store::documents::COUPON_CODE;
use crate::store::{Scope, Versioned};
use crate::{EcommerceError, Result};

/// Public view of a coupon. Usage counters stay private.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponOffer {
    pub code: String,
    pub description: String,
    pub discount: Discount,
    pub min_order_amount: Decimal,
    pub ends_at: DateTime<Utc>,
}

impl From<&Coupon> for CouponOffer {
    fn from(c: &Coupon) -> Self {
        Self {
            code: c.code().to_string(), description: c.description().to_string(), discount: c.discount().clone(),
            min_order_amount: c.min_order_amount(), ends_at: c.ends_at(),
        }
    }
}

impl Services {
    pub async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        let mut coupons: Vec<Coupon> = self.repo.scan::<Coupon>(&Scope::all()).await?.into_iter().map(Versioned::into_inner).collect();
        coupons.sort_by_key(|c| std::cmp::Reverse(c.id()));
        Ok(coupons)
    }

    pub async fn coupon(&self, id: Uuid) -> Result<Coupon> {
        Ok(self.load_coupon(id).await?.into_inner())
    }

    pub async fn create_coupon(&self, terms: CouponTerms) -> Result<Coupon> {
        let coupon = Versioned::new(Coupon::create(terms)?);
        let mut uow = self.repo.unit_of_work();
        uow.put(&coupon)?;
        uow.commit().await?;
        info!(coupon_id = %coupon.id(), code = coupon.code(), "coupon created");
        Ok(coupon.into_inner())
    }

    pub async fn update_coupon(&self, id: Uuid, terms: CouponTerms) -> Result<Coupon> {
        with_retry("update_coupon", || {
            let terms = terms.clone();
            async move {
                let mut coupon = self.load_coupon(id).await?;
                coupon.update(terms)?;
                let mut uow = self.repo.unit_of_work();
                uow.put(&coupon)?;
                uow.commit().await?;
                Ok(coupon.into_inner())
            }
        })
        .await
    }

    /// Orders that used a deleted coupon keep their discount; cancelling
    /// them no longer gives a use back.
    pub async fn delete_coupon(&self, id: Uuid) -> Result<()> {
        with_retry("delete_coupon", move || async move {
            let coupon = self.load_coupon(id).await?;
            let mut uow = self.repo.unit_of_work();
            uow.delete(&coupon);
            uow.commit().await?;
            info!(coupon_id = %id, "coupon deleted");
            Ok(())
        })
        .await
    }

    /// Coupons the user could still redeem, ignoring cart contents.
    pub async fn available_coupons(&self, user_id: Uuid) -> Result<Vec<CouponOffer>> {
        let now = Utc::now();
        let registered_at = self.user(user_id).await?.created_at();
        let prior_orders = self.prior_orders(user_id).await?;
        let mut offers: Vec<CouponOffer> = self.repo.scan::<Coupon>(&Scope::all()).await?
            .iter()
            .filter(|c| c.is_offered_to(user_id, registered_at, prior_orders, now))
            .map(|c| CouponOffer::from(&**c))
            .collect();
        offers.sort_by(|a, b| a.ends_at.cmp(&b.ends_at));
        Ok(offers)
    }

    /// Quotes the cart with the coupon applied. Nothing is recorded.
    pub async fn apply_coupon(&self, user_id: Uuid, code: &str) -> Result<Quote> {
        self.checkout_summary(user_id, Some(code)).await
    }

    pub(crate) async fn coupon_by_code(&self, code: &str) -> Result<Versioned<Coupon>> {
        self.repo.find::<Coupon>(COUPON_CODE, &code.trim().to_uppercase()).await?.ok_or(EcommerceError::CouponNotFound)
    }

    async fn load_coupon(&self, id: Uuid) -> Result<Versioned<Coupon>> {
        self.repo.get::<Coupon>(&id.to_string()).await?.ok_or(EcommerceError::CouponNotFound)
    }
}
