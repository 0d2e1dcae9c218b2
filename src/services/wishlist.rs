use uuid::Uuid;

use super::cart::{ensure_available, CartView};
use super::{with_retry, Services};
use crate::domain::aggregates::{Product, Wishlist};
use crate::store::Versioned;
use crate::{EcommerceError, Result};

impl Services {
    /// Wishlisted products that still exist, most recently added first.
    pub async fn wishlist(&self, user_id: Uuid) -> Result<Vec<Product>> {
        let wishlist = self.load_wishlist(user_id).await?;
        let ids: Vec<Uuid> = wishlist.product_ids().iter().rev().copied().collect();
        let mut products = self.load_products(&ids).await?;
        Ok(ids.iter().filter_map(|id| products.remove(id)).map(Versioned::into_inner).collect())
    }

    pub async fn add_to_wishlist(&self, user_id: Uuid, product_id: Uuid) -> Result<Vec<Product>> {
        with_retry("add_to_wishlist", move || async move {
            if self.repo.get::<Product>(&product_id.to_string()).await?.is_none() {
                return Err(EcommerceError::ProductNotFound);
            }
            let mut wishlist = self.load_wishlist(user_id).await?;
            if wishlist.add(product_id) {
                let mut uow = self.repo.unit_of_work();
                uow.put(&wishlist)?;
                uow.commit().await?;
            }
            Ok(())
        })
        .await?;
        self.wishlist(user_id).await
    }

    pub async fn remove_from_wishlist(&self, user_id: Uuid, product_id: Uuid) -> Result<Vec<Product>> {
        with_retry("remove_from_wishlist", move || async move {
            let mut wishlist = self.load_wishlist(user_id).await?;
            if wishlist.remove(product_id) {
                let mut uow = self.repo.unit_of_work();
                uow.put(&wishlist)?;
                uow.commit().await?;
            }
            Ok(())
        })
        .await?;
        self.wishlist(user_id).await
    }

    /// Puts one unit in the cart and drops the product from the wishlist,
    /// both or neither.
    pub async fn move_to_cart(&self, user_id: Uuid, product_id: Uuid, variant_id: Option<&str>) -> Result<CartView> {
        with_retry("move_to_cart", move || async move {
            let product = self.repo.get::<Product>(&product_id.to_string()).await?.ok_or(EcommerceError::ProductNotFound)?;
            let mut wishlist = self.load_wishlist(user_id).await?;
            if !wishlist.remove(product_id) { return Err(EcommerceError::ProductNotFound); }
            let mut cart = self.load_cart(user_id).await?;
            let next = cart.add_item(product_id, variant_id.map(str::to_string), 1)?;
            ensure_available(&product, variant_id, next)?;
            let mut uow = self.repo.unit_of_work();
            uow.put(&wishlist)?.put(&cart)?;
            uow.commit().await?;
            Ok(())
        })
        .await?;
        self.cart(user_id).await
    }

    async fn load_wishlist(&self, user_id: Uuid) -> Result<Versioned<Wishlist>> {
        Ok(self.repo.get::<Wishlist>(&user_id.to_string()).await?.unwrap_or_else(|| Versioned::new(Wishlist::new(user_id))))
    }
}
