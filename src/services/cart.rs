use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::{with_retry, Services};
use crate::domain::aggregates::{Cart, Product, ProductError};
use crate::domain::pricing::{self, PricedLine};
use crate::domain::value_objects::Money;
use crate::store::Versioned;
use crate::{EcommerceError, Result};

/// The cart priced against the live catalog.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<PricedLine>,
    pub item_count: u32,
    pub subtotal: Money,
    /// False when any line is flagged.
    pub purchasable: bool,
}

impl Services {
    pub async fn cart(&self, user_id: Uuid) -> Result<CartView> {
        let cart = self.load_cart(user_id).await?;
        self.view_cart(&cart).await
    }

    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, variant_id: Option<&str>, quantity: u32) -> Result<CartView> {
        let cart = with_retry("add_to_cart", move || async move {
            let product = self.repo.get::<Product>(&product_id.to_string()).await?.ok_or(EcommerceError::ProductNotFound)?;
            let mut cart = self.load_cart(user_id).await?;
            let next = cart.add_item(product_id, variant_id.map(str::to_string), quantity)?;
            ensure_available(&product, variant_id, next)?;
            let mut uow = self.repo.unit_of_work();
            uow.put(&cart)?;
            uow.commit().await?;
            Ok(cart)
        })
        .await?;
        self.view_cart(&cart).await
    }

    pub async fn update_cart_item(&self, user_id: Uuid, product_id: Uuid, variant_id: Option<&str>, quantity: u32) -> Result<CartView> {
        let cart = with_retry("update_cart_item", move || async move {
            let mut cart = self.load_cart(user_id).await?;
            cart.update_quantity(product_id, variant_id, quantity)?;
            if quantity > 0 {
                let product = self.repo.get::<Product>(&product_id.to_string()).await?.ok_or(EcommerceError::ProductNotFound)?;
                ensure_available(&product, variant_id, quantity)?;
            }
            let mut uow = self.repo.unit_of_work();
            uow.put(&cart)?;
            uow.commit().await?;
            Ok(cart)
        })
        .await?;
        self.view_cart(&cart).await
    }

    pub async fn remove_from_cart(&self, user_id: Uuid, product_id: Uuid, variant_id: Option<&str>) -> Result<CartView> {
        let cart = with_retry("remove_from_cart", move || async move {
            let mut cart = self.load_cart(user_id).await?;
            cart.remove_item(product_id, variant_id)?;
            let mut uow = self.repo.unit_of_work();
            uow.put(&cart)?;
            uow.commit().await?;
            Ok(cart)
        })
        .await?;
        self.view_cart(&cart).await
    }

    pub async fn clear_cart(&self, user_id: Uuid) -> Result<()> {
        with_retry("clear_cart", move || async move {
            let mut cart = self.load_cart(user_id).await?;
            if cart.is_empty() { return Ok(()); }
            cart.clear();
            let mut uow = self.repo.unit_of_work();
            uow.put(&cart)?;
            uow.commit().await?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn load_cart(&self, user_id: Uuid) -> Result<Versioned<Cart>> {
        Ok(self.repo.get::<Cart>(&user_id.to_string()).await?.unwrap_or_else(|| Versioned::new(Cart::new(user_id))))
    }

    /// Current catalog entries for every product in the cart.
    pub(crate) async fn cart_catalog(&self, cart: &Cart) -> Result<HashMap<Uuid, Versioned<Product>>> {
        let ids: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
        self.load_products(&ids).await
    }

    async fn view_cart(&self, cart: &Cart) -> Result<CartView> {
        let catalog: HashMap<Uuid, Product> = self.cart_catalog(cart).await?.into_iter().map(|(id, p)| (id, p.into_inner())).collect();
        let items = pricing::price_items(cart.items(), &catalog);
        let subtotal = pricing::subtotal(&items, &self.settings.currency)?;
        Ok(CartView {
            purchasable: !items.is_empty() && items.iter().all(PricedLine::is_purchasable),
            item_count: cart.item_count(),
            subtotal,
            items,
        })
    }
}

/// Checks that `quantity` units can currently be bought.
pub(crate) fn ensure_available(product: &Product, variant_id: Option<&str>, quantity: u32) -> Result<()> {
    if !product.is_active() { return Err(ProductError::NotAvailable.into()); }
    let available = product.available(variant_id)?;
    if available < quantity {
        return Err(ProductError::InsufficientStock { available, requested: quantity }.into());
    }
    Ok(())
}
