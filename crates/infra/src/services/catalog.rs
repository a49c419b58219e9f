use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use stockledger_core::{LocationId, ProductId, WarehouseId};
use stockledger_inventory::{
    Location, NewLocation, NewProduct, NewWarehouse, Product, ProductSummary, Warehouse,
};

use crate::error::{InventoryError, InventoryResult};
use crate::store::{CatalogStore, DeleteOutcome, Page, Pagination, ProductFilter};

/// Locations, products and warehouses. Entries are created and deleted, never
/// edited.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_location(&self, input: NewLocation) -> InventoryResult<Location> {
        let location = Location::create(LocationId::new(), input, Utc::now())?;
        self.catalog.insert_location(&location).await?;
        info!(location_id = %location.id, "location created");
        Ok(location)
    }

    pub async fn get_location(&self, id: LocationId) -> InventoryResult<Location> {
        self.catalog
            .get_location(id)
            .await?
            .ok_or_else(|| InventoryError::not_found("location", id))
    }

    pub async fn list_locations(&self, pagination: Pagination) -> InventoryResult<Page<Location>> {
        Ok(self.catalog.list_locations(pagination).await?)
    }

    #[instrument(skip(self), fields(location_id = %id))]
    pub async fn delete_location(&self, id: LocationId) -> InventoryResult<()> {
        match self.catalog.delete_location(id).await? {
            DeleteOutcome::Deleted => Ok(()),
            DeleteOutcome::NotFound => Err(InventoryError::not_found("location", id)),
            DeleteOutcome::InUse => Err(InventoryError::InvalidState(format!(
                "location {id} still has warehouses"
            ))),
        }
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, input: NewProduct) -> InventoryResult<Product> {
        let product = Product::create(ProductId::new(), input, Utc::now())?;
        self.catalog.insert_product(&product).await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> InventoryResult<Product> {
        self.catalog
            .get_product(id)
            .await?
            .ok_or_else(|| InventoryError::not_found("product", id))
    }

    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> InventoryResult<Page<ProductSummary>> {
        Ok(self.catalog.list_products(filter, pagination).await?)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> InventoryResult<()> {
        match self.catalog.delete_product(id).await? {
            DeleteOutcome::Deleted => Ok(()),
            DeleteOutcome::NotFound => Err(InventoryError::not_found("product", id)),
            DeleteOutcome::InUse => Err(InventoryError::InvalidState(format!(
                "product {id} is referenced by transactions or holds stock"
            ))),
        }
    }

    #[instrument(skip(self, input), fields(short_code = %input.short_code))]
    pub async fn create_warehouse(&self, input: NewWarehouse) -> InventoryResult<Warehouse> {
        let warehouse = Warehouse::create(WarehouseId::new(), input, Utc::now())?;
        if let Some(location_id) = warehouse.location_id {
            self.get_location(location_id).await?;
        }
        self.catalog.insert_warehouse(&warehouse).await?;
        info!(warehouse_id = %warehouse.id, "warehouse created");
        Ok(warehouse)
    }

    pub async fn get_warehouse(&self, id: WarehouseId) -> InventoryResult<Warehouse> {
        self.catalog
            .get_warehouse(id)
            .await?
            .ok_or_else(|| InventoryError::not_found("warehouse", id))
    }

    pub async fn list_warehouses(&self, pagination: Pagination) -> InventoryResult<Page<Warehouse>> {
        Ok(self.catalog.list_warehouses(pagination).await?)
    }

    #[instrument(skip(self), fields(warehouse_id = %id))]
    pub async fn delete_warehouse(&self, id: WarehouseId) -> InventoryResult<()> {
        match self.catalog.delete_warehouse(id).await? {
            DeleteOutcome::Deleted => Ok(()),
            DeleteOutcome::NotFound => Err(InventoryError::not_found("warehouse", id)),
            DeleteOutcome::InUse => Err(InventoryError::InvalidState(format!(
                "warehouse {id} is referenced by transactions or holds stock"
            ))),
        }
    }
}
