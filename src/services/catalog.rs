use tracing::info;
use uuid::Uuid;

use super::{with_retry, Page, Services};
use crate::domain::aggregates::{Product, ProductDetails, ProductStatus};
use crate::domain::value_objects::Sku;
use crate::store::{Scope, Versioned};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, Default)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
    /// Drafts and archived products too. Admin only.
    pub include_hidden: bool,
}

impl Services {
    pub async fn list_products(&self, q: &ProductQuery) -> Result<Page<Product>> {
        let scope = if q.include_hidden { Scope::all() } else { Scope::tag(ProductStatus::Active.as_str()) };
        let mut products: Vec<Product> = self.repo.scan::<Product>(&scope).await?
            .into_iter()
            .map(Versioned::into_inner)
            .filter(|p| q.category.as_deref().map_or(true, |c| p.category().is_some_and(|pc| pc.eq_ignore_ascii_case(c))))
            .filter(|p| q.search.as_deref().map_or(true, |s| p.matches(s)))
            .collect();
        // v7 ids sort by creation time
        products.sort_by_key(|p| std::cmp::Reverse(p.id()));
        Ok(Page::slice(products, q.page, q.per_page))
    }

    pub async fn product(&self, id: Uuid, include_hidden: bool) -> Result<Product> {
        let product = self.repo.get::<Product>(&id.to_string()).await?.ok_or(EcommerceError::ProductNotFound)?;
        if !include_hidden && !product.is_active() { return Err(EcommerceError::ProductNotFound); }
        Ok(product.into_inner())
    }

    pub async fn create_product(&self, sku: &str, details: ProductDetails, publish: bool) -> Result<Product> {
        let mut product = Product::create(Sku::new(sku)?, details)?;
        if publish { product.publish()?; }
        let mut product = Versioned::new(product);
        let mut uow = self.repo.unit_of_work();
        uow.put(&product)?;
        uow.commit().await?;
        info!(product_id = %product.id(), sku = %product.sku(), "product created");
        self.publish(product.take_events()).await;
        Ok(product.into_inner())
    }

    pub async fn update_product(&self, id: Uuid, details: ProductDetails, status: Option<ProductStatus>) -> Result<Product> {
        with_retry("update_product", || {
            let details = details.clone();
            async move {
                let mut product = self.repo.get::<Product>(&id.to_string()).await?.ok_or(EcommerceError::ProductNotFound)?;
                product.update(details)?;
                match status {
                    Some(ProductStatus::Active) if !product.is_active() => product.publish()?,
                    Some(ProductStatus::Archived) if product.status() != ProductStatus::Archived => product.archive(),
                    Some(ProductStatus::Draft) if product.status() != ProductStatus::Draft => {
                        return Err(EcommerceError::Validation("a published product cannot return to draft".into()));
                    }
                    _ => {}
                }
                let mut uow = self.repo.unit_of_work();
                uow.put(&product)?;
                uow.commit().await?;
                self.publish(product.take_events()).await;
                Ok(product.into_inner())
            }
        })
        .await
    }

    /// Archived products stay readable by orders that reference them.
    pub async fn archive_product(&self, id: Uuid) -> Result<()> {
        with_retry("archive_product", move || async move {
            let mut product = self.repo.get::<Product>(&id.to_string()).await?.ok_or(EcommerceError::ProductNotFound)?;
            if product.status() == ProductStatus::Archived { return Ok(()); }
            product.archive();
            let mut uow = self.repo.unit_of_work();
            uow.put(&product)?;
            uow.commit().await?;
            info!(product_id = %id, "product archived");
            self.publish(product.take_events()).await;
            Ok(())
        })
        .await
    }
}
