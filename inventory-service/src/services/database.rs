//! Database service for inventory-service.

use crate::models::{
    Branch, Category, CreateBranch, CreateCategory, CreateProduct, CreateProvider, CreateUnit,
    ListInvoicesFilter, ListProductsFilter, PriceHistory, Product, Provider, PurchaseInvoice,
    PurchaseInvoiceItem, Unit, UpdateBranch, UpdateCategory, UpdateProduct, UpdateProvider,
    DEFAULT_UNIT_ABBREVIATION, DEFAULT_UNIT_NAME,
};
use crate::services::metrics::{
    DB_QUERY_DURATION, INVOICE_AMOUNT_TOTAL, PRICE_CHANGES_TOTAL, PRODUCTS_CREATED_TOTAL,
    PURCHASE_INVOICES_TOTAL, STOCK_DECREMENTS_SKIPPED_TOTAL,
};
use crate::services::reconciliation::{
    price_change_note, prices_differ, validate_line_items, ReconcileInvoice,
    PRICE_CHANGE_REASON_INVOICE,
};
use backoffice_core::error::AppError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "inventory-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Category Operations
    // -------------------------------------------------------------------------

    /// Create a new category.
    #[instrument(skip(self, input))]
    pub async fn create_category(&self, input: &CreateCategory) -> Result<Category, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_category"])
            .start_timer();

        let category_id = Uuid::new_v4();
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (category_id, name, description, active)
            VALUES ($1, $2, $3, TRUE)
            RETURNING category_id, name, description, active, created_utc
            "#,
        )
        .bind(category_id)
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Category '{}' already exists", input.name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create category: {}", e)),
        })?;

        timer.observe_duration();

        info!(category_id = %category.category_id, name = %category.name, "Category created");

        Ok(category)
    }

    /// Get a category by ID.
    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_category"])
            .start_timer();

        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT category_id, name, description, active, created_utc
            FROM categories
            WHERE category_id = $1
            "#,
        )
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get category: {}", e)))?;

        timer.observe_duration();

        Ok(category)
    }

    /// List categories.
    #[instrument(skip(self))]
    pub async fn list_categories(
        &self,
        active_only: bool,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<Category>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_categories"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT category_id, name, description, active, created_utc
            FROM categories
            WHERE ($1::bool = FALSE OR active = TRUE)
              AND ($2::uuid IS NULL OR category_id > $2)
            ORDER BY category_id
            LIMIT $3
            "#,
        )
        .bind(active_only)
        .bind(page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list categories: {}", e)))?;

        timer.observe_duration();

        Ok(categories)
    }

    /// Update a category.
    #[instrument(skip(self, input), fields(category_id = %category_id))]
    pub async fn update_category(
        &self,
        category_id: Uuid,
        input: &UpdateCategory,
    ) -> Result<Option<Category>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_category"])
            .start_timer();

        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                active = COALESCE($4, active)
            WHERE category_id = $1
            RETURNING category_id, name, description, active, created_utc
            "#,
        )
        .bind(category_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update category: {}", e)))?;

        timer.observe_duration();

        Ok(category)
    }

    /// Delete a category. Products keep their rows with category unset.
    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn delete_category(&self, category_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_category"])
            .start_timer();

        let result = sqlx::query("DELETE FROM categories WHERE category_id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete category: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(category_id = %category_id, "Category deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Provider Operations
    // -------------------------------------------------------------------------

    /// Create a new provider.
    #[instrument(skip(self, input))]
    pub async fn create_provider(&self, input: &CreateProvider) -> Result<Provider, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_provider"])
            .start_timer();

        let provider_id = Uuid::new_v4();
        let provider = sqlx::query_as::<_, Provider>(
            r#"
            INSERT INTO providers (provider_id, name, contact_name, phone, email, address, active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            RETURNING provider_id, name, contact_name, phone, email, address, active, created_utc
            "#,
        )
        .bind(provider_id)
        .bind(&input.name)
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create provider: {}", e)))?;

        timer.observe_duration();

        info!(provider_id = %provider.provider_id, name = %provider.name, "Provider created");

        Ok(provider)
    }

    /// Get a provider by ID.
    #[instrument(skip(self), fields(provider_id = %provider_id))]
    pub async fn get_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_provider"])
            .start_timer();

        let provider = sqlx::query_as::<_, Provider>(
            r#"
            SELECT provider_id, name, contact_name, phone, email, address, active, created_utc
            FROM providers
            WHERE provider_id = $1
            "#,
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get provider: {}", e)))?;

        timer.observe_duration();

        Ok(provider)
    }

    /// List providers.
    #[instrument(skip(self))]
    pub async fn list_providers(
        &self,
        active_only: bool,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<Provider>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_providers"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let providers = sqlx::query_as::<_, Provider>(
            r#"
            SELECT provider_id, name, contact_name, phone, email, address, active, created_utc
            FROM providers
            WHERE ($1::bool = FALSE OR active = TRUE)
              AND ($2::uuid IS NULL OR provider_id > $2)
            ORDER BY provider_id
            LIMIT $3
            "#,
        )
        .bind(active_only)
        .bind(page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list providers: {}", e)))?;

        timer.observe_duration();

        Ok(providers)
    }

    /// Update a provider.
    #[instrument(skip(self, input), fields(provider_id = %provider_id))]
    pub async fn update_provider(
        &self,
        provider_id: Uuid,
        input: &UpdateProvider,
    ) -> Result<Option<Provider>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_provider"])
            .start_timer();

        let provider = sqlx::query_as::<_, Provider>(
            r#"
            UPDATE providers
            SET name = COALESCE($2, name),
                contact_name = COALESCE($3, contact_name),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                address = COALESCE($6, address),
                active = COALESCE($7, active)
            WHERE provider_id = $1
            RETURNING provider_id, name, contact_name, phone, email, address, active, created_utc
            "#,
        )
        .bind(provider_id)
        .bind(&input.name)
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update provider: {}", e)))?;

        timer.observe_duration();

        Ok(provider)
    }

    /// Delete a provider. Fails with a conflict while invoices reference it.
    #[instrument(skip(self), fields(provider_id = %provider_id))]
    pub async fn delete_provider(&self, provider_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_provider"])
            .start_timer();

        let result = sqlx::query("DELETE FROM providers WHERE provider_id = $1")
            .bind(provider_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Provider is referenced by purchase invoices"
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete provider: {}", e)),
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(provider_id = %provider_id, "Provider deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Branch Operations
    // -------------------------------------------------------------------------

    /// Create a new branch.
    #[instrument(skip(self, input))]
    pub async fn create_branch(&self, input: &CreateBranch) -> Result<Branch, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_branch"])
            .start_timer();

        let branch_id = Uuid::new_v4();
        let branch = sqlx::query_as::<_, Branch>(
            r#"
            INSERT INTO branches (branch_id, name, address, active)
            VALUES ($1, $2, $3, TRUE)
            RETURNING branch_id, name, address, active, created_utc
            "#,
        )
        .bind(branch_id)
        .bind(&input.name)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create branch: {}", e)))?;

        timer.observe_duration();

        info!(branch_id = %branch.branch_id, name = %branch.name, "Branch created");

        Ok(branch)
    }

    /// Get a branch by ID.
    #[instrument(skip(self), fields(branch_id = %branch_id))]
    pub async fn get_branch(&self, branch_id: Uuid) -> Result<Option<Branch>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_branch"])
            .start_timer();

        let branch = sqlx::query_as::<_, Branch>(
            r#"
            SELECT branch_id, name, address, active, created_utc
            FROM branches
            WHERE branch_id = $1
            "#,
        )
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get branch: {}", e)))?;

        timer.observe_duration();

        Ok(branch)
    }

    /// List branches.
    #[instrument(skip(self))]
    pub async fn list_branches(
        &self,
        active_only: bool,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<Branch>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_branches"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let branches = sqlx::query_as::<_, Branch>(
            r#"
            SELECT branch_id, name, address, active, created_utc
            FROM branches
            WHERE ($1::bool = FALSE OR active = TRUE)
              AND ($2::uuid IS NULL OR branch_id > $2)
            ORDER BY branch_id
            LIMIT $3
            "#,
        )
        .bind(active_only)
        .bind(page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list branches: {}", e)))?;

        timer.observe_duration();

        Ok(branches)
    }

    /// Update a branch.
    #[instrument(skip(self, input), fields(branch_id = %branch_id))]
    pub async fn update_branch(
        &self,
        branch_id: Uuid,
        input: &UpdateBranch,
    ) -> Result<Option<Branch>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_branch"])
            .start_timer();

        let branch = sqlx::query_as::<_, Branch>(
            r#"
            UPDATE branches
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                active = COALESCE($4, active)
            WHERE branch_id = $1
            RETURNING branch_id, name, address, active, created_utc
            "#,
        )
        .bind(branch_id)
        .bind(&input.name)
        .bind(&input.address)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update branch: {}", e)))?;

        timer.observe_duration();

        Ok(branch)
    }

    // -------------------------------------------------------------------------
    // Unit Operations
    // -------------------------------------------------------------------------

    /// Create a new unit of measure.
    #[instrument(skip(self, input))]
    pub async fn create_unit(&self, input: &CreateUnit) -> Result<Unit, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_unit"])
            .start_timer();

        let unit_id = Uuid::new_v4();
        let unit = sqlx::query_as::<_, Unit>(
            r#"
            INSERT INTO units (unit_id, name, abbreviation)
            VALUES ($1, $2, $3)
            RETURNING unit_id, name, abbreviation, created_utc
            "#,
        )
        .bind(unit_id)
        .bind(&input.name)
        .bind(&input.abbreviation)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Unit '{}' already exists", input.name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create unit: {}", e)),
        })?;

        timer.observe_duration();

        info!(unit_id = %unit.unit_id, name = %unit.name, "Unit created");

        Ok(unit)
    }

    /// List units.
    #[instrument(skip(self))]
    pub async fn list_units(&self) -> Result<Vec<Unit>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_units"])
            .start_timer();

        let units = sqlx::query_as::<_, Unit>(
            r#"
            SELECT unit_id, name, abbreviation, created_utc
            FROM units
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list units: {}", e)))?;

        timer.observe_duration();

        Ok(units)
    }

    /// Ensure the default unit exists and return it. Product creators call
    /// this explicitly when no unit was supplied.
    #[instrument(skip(self))]
    pub async fn ensure_default_unit(&self) -> Result<Unit, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["ensure_default_unit"])
            .start_timer();

        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        let unit_id = Self::ensure_default_unit_on(&mut conn).await?;

        let unit = sqlx::query_as::<_, Unit>(
            r#"
            SELECT unit_id, name, abbreviation, created_utc
            FROM units
            WHERE unit_id = $1
            "#,
        )
        .bind(unit_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load default unit: {}", e)))?;

        timer.observe_duration();

        Ok(unit)
    }

    /// Upsert the default unit on the given connection and return its id.
    async fn ensure_default_unit_on(conn: &mut PgConnection) -> Result<Uuid, AppError> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO units (unit_id, name, abbreviation)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET abbreviation = EXCLUDED.abbreviation
            RETURNING unit_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(DEFAULT_UNIT_NAME)
        .bind(DEFAULT_UNIT_ABBREVIATION)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to ensure default unit: {}", e))
        })
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a new product.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product_id = Uuid::new_v4();
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                product_id, category_id, provider_id, unit_id, name, barcode,
                purchase_price, sell_price, stock, low_stock_threshold, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE)
            RETURNING product_id, category_id, provider_id, unit_id, name, barcode,
                purchase_price, sell_price, stock, low_stock_threshold, active,
                created_utc, updated_utc
            "#,
        )
        .bind(product_id)
        .bind(input.category_id)
        .bind(input.provider_id)
        .bind(input.unit_id)
        .bind(&input.name)
        .bind(&input.barcode)
        .bind(input.purchase_price)
        .bind(input.sell_price)
        .bind(input.stock)
        .bind(input.low_stock_threshold)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)))?;

        timer.observe_duration();

        PRODUCTS_CREATED_TOTAL.with_label_values(&["api"]).inc();
        info!(product_id = %product.product_id, name = %product.name, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, category_id, provider_id, unit_id, name, barcode,
                purchase_price, sell_price, stock, low_stock_threshold, active,
                created_utc, updated_utc
            FROM products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// List products with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_products(
        &self,
        filter: &ListProductsFilter,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, category_id, provider_id, unit_id, name, barcode,
                purchase_price, sell_price, stock, low_stock_threshold, active,
                created_utc, updated_utc
            FROM products
            WHERE ($1::uuid IS NULL OR category_id = $1)
              AND ($2::uuid IS NULL OR provider_id = $2)
              AND ($3::varchar IS NULL OR barcode = $3)
              AND ($4::bool = FALSE OR active = TRUE)
              AND ($5::uuid IS NULL OR product_id > $5)
            ORDER BY product_id
            LIMIT $6
            "#,
        )
        .bind(filter.category_id)
        .bind(filter.provider_id)
        .bind(&filter.barcode)
        .bind(filter.active_only)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Update a product.
    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET category_id = COALESCE($2, category_id),
                provider_id = COALESCE($3, provider_id),
                unit_id = COALESCE($4, unit_id),
                name = COALESCE($5, name),
                barcode = COALESCE($6, barcode),
                purchase_price = COALESCE($7, purchase_price),
                sell_price = COALESCE($8, sell_price),
                low_stock_threshold = COALESCE($9, low_stock_threshold),
                active = COALESCE($10, active),
                updated_utc = NOW()
            WHERE product_id = $1
            RETURNING product_id, category_id, provider_id, unit_id, name, barcode,
                purchase_price, sell_price, stock, low_stock_threshold, active,
                created_utc, updated_utc
            "#,
        )
        .bind(product_id)
        .bind(input.category_id)
        .bind(input.provider_id)
        .bind(input.unit_id)
        .bind(&input.name)
        .bind(&input.barcode)
        .bind(input.purchase_price)
        .bind(input.sell_price)
        .bind(input.low_stock_threshold)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// Hard-delete a product. Invoice items keep their rows with the product
    /// reference nulled out.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete product: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(product_id = %product_id, "Product deleted");
        }

        Ok(deleted)
    }

    /// List the price history of a product, newest first.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn list_price_history(
        &self,
        product_id: Uuid,
        page_size: i32,
    ) -> Result<Vec<PriceHistory>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_price_history"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let history = sqlx::query_as::<_, PriceHistory>(
            r#"
            SELECT history_id, product_id, old_purchase_price, old_sell_price,
                new_purchase_price, new_sell_price, change_reason, note, changed_utc
            FROM price_history
            WHERE product_id = $1
            ORDER BY changed_utc DESC
            LIMIT $2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list price history: {}", e))
        })?;

        timer.observe_duration();

        Ok(history)
    }

    // -------------------------------------------------------------------------
    // Purchase Invoice Operations
    // -------------------------------------------------------------------------

    /// Reconcile a submitted purchase invoice: create the invoice, resolve or
    /// create a product per line, record price changes, persist the items,
    /// adjust stock, and write the final total. One transaction; any failure
    /// rolls back every write.
    #[instrument(skip(self, input), fields(invoice_number = %input.invoice_number, item_count = input.items.len()))]
    pub async fn reconcile_purchase_invoice(
        &self,
        input: &ReconcileInvoice,
    ) -> Result<(PurchaseInvoice, Vec<PurchaseInvoiceItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reconcile_purchase_invoice"])
            .start_timer();

        validate_line_items(&input.items)?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let provider_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM providers WHERE provider_id = $1)")
                .bind(input.provider_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check provider: {}", e))
                })?;
        if !provider_exists {
            return Err(AppError::NotFound(anyhow::anyhow!("Provider not found")));
        }

        let branch_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM branches WHERE branch_id = $1)")
                .bind(input.branch_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check branch: {}", e))
                })?;
        if !branch_exists {
            return Err(AppError::NotFound(anyhow::anyhow!("Branch not found")));
        }

        // Invoice header first, with a zero total; the real total is written
        // once after every item has been processed.
        let invoice_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO purchase_invoices (
                invoice_id, provider_id, branch_id, invoice_number, invoice_date,
                total_amount, notes, image_path
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7)
            "#,
        )
        .bind(invoice_id)
        .bind(input.provider_id)
        .bind(input.branch_id)
        .bind(&input.invoice_number)
        .bind(input.invoice_date)
        .bind(&input.notes)
        .bind(&input.image_path)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        let mut items = Vec::with_capacity(input.items.len());
        let mut total = Decimal::ZERO;
        let mut price_changes = 0u64;
        let mut created_products = 0u64;

        for (position, item) in input.items.iter().enumerate() {
            // Resolve by id, then by barcode; anything else is a creation.
            let existing = match item.product_id {
                Some(product_id) => Some(
                    Self::lock_product(&mut *tx, product_id).await?.ok_or_else(|| {
                        AppError::BadRequest(anyhow::anyhow!(
                            "Line {}: unknown product {}",
                            position + 1,
                            product_id
                        ))
                    })?,
                ),
                None => match item.barcode() {
                    Some(barcode) => Self::lock_product_by_barcode(&mut *tx, barcode).await?,
                    None => None,
                },
            };

            let product_id = match existing {
                Some(product) => {
                    if item.unit_price == Decimal::ZERO {
                        return Err(AppError::BadRequest(anyhow::anyhow!(
                            "Line {}: zero purchase price for existing product '{}'",
                            position + 1,
                            product.name
                        )));
                    }

                    if prices_differ(&product, item) {
                        sqlx::query(
                            r#"
                            UPDATE products
                            SET purchase_price = $2, sell_price = $3, updated_utc = NOW()
                            WHERE product_id = $1
                            "#,
                        )
                        .bind(product.product_id)
                        .bind(item.unit_price)
                        .bind(item.sell_price)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| {
                            AppError::DatabaseError(anyhow::anyhow!(
                                "Failed to update product prices: {}",
                                e
                            ))
                        })?;

                        sqlx::query(
                            r#"
                            INSERT INTO price_history (
                                history_id, product_id, old_purchase_price, old_sell_price,
                                new_purchase_price, new_sell_price, change_reason, note
                            )
                            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                            "#,
                        )
                        .bind(Uuid::new_v4())
                        .bind(product.product_id)
                        .bind(product.purchase_price)
                        .bind(product.sell_price)
                        .bind(item.unit_price)
                        .bind(item.sell_price)
                        .bind(PRICE_CHANGE_REASON_INVOICE)
                        .bind(price_change_note(&input.invoice_number))
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| {
                            AppError::DatabaseError(anyhow::anyhow!(
                                "Failed to record price change: {}",
                                e
                            ))
                        })?;

                        price_changes += 1;
                    }

                    product.product_id
                }
                None => {
                    let name = item.product_name().ok_or_else(|| {
                        AppError::BadRequest(anyhow::anyhow!(
                            "Line {}: no product name for new product",
                            position + 1
                        ))
                    })?;

                    // New products take the invoice's provider and the default
                    // unit; they are not linked to the invoice's branch.
                    let unit_id = Self::ensure_default_unit_on(&mut *tx).await?;
                    let product_id = Uuid::new_v4();

                    sqlx::query(
                        r#"
                        INSERT INTO products (
                            product_id, category_id, provider_id, unit_id, name, barcode,
                            purchase_price, sell_price, stock, low_stock_threshold, active
                        )
                        VALUES ($1, NULL, $2, $3, $4, $5, $6, $7, 0,
                                $8, TRUE)
                        "#,
                    )
                    .bind(product_id)
                    .bind(input.provider_id)
                    .bind(unit_id)
                    .bind(name)
                    .bind(item.barcode())
                    .bind(item.unit_price)
                    .bind(item.sell_price)
                    .bind(crate::models::DEFAULT_LOW_STOCK_THRESHOLD)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e))
                    })?;

                    created_products += 1;
                    product_id
                }
            };

            let item_row = sqlx::query_as::<_, PurchaseInvoiceItem>(
                r#"
                INSERT INTO purchase_invoice_items (
                    item_id, invoice_id, product_id, quantity, purchase_price, sell_price, is_bonus
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING item_id, invoice_id, product_id, quantity, purchase_price, sell_price,
                    is_bonus, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.sell_price)
            .bind(item.is_bonus)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice item: {}", e))
            })?;

            // Bonus items still add physical stock.
            sqlx::query(
                "UPDATE products SET stock = stock + $2, updated_utc = NOW() WHERE product_id = $1",
            )
            .bind(product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to increment stock: {}", e))
            })?;

            total += item.line_total();
            items.push(item_row);
        }

        let invoice = sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            UPDATE purchase_invoices
            SET total_amount = $2
            WHERE invoice_id = $1
            RETURNING invoice_id, provider_id, branch_id, invoice_number, invoice_date,
                total_amount, notes, image_path, created_utc
            "#,
        )
        .bind(invoice_id)
        .bind(total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to write invoice total: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        PURCHASE_INVOICES_TOTAL.inc();
        INVOICE_AMOUNT_TOTAL.inc_by(total.to_f64().unwrap_or(0.0));
        PRICE_CHANGES_TOTAL.inc_by(price_changes);
        PRODUCTS_CREATED_TOTAL
            .with_label_values(&["reconciliation"])
            .inc_by(created_products);

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            item_count = items.len(),
            created_products = created_products,
            price_changes = price_changes,
            total_amount = %invoice.total_amount,
            "Purchase invoice reconciled"
        );

        Ok((invoice, items))
    }

    /// Get a purchase invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_purchase_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<PurchaseInvoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_purchase_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            SELECT invoice_id, provider_id, branch_id, invoice_number, invoice_date,
                total_amount, notes, image_path, created_utc
            FROM purchase_invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get the items of a purchase invoice, in creation order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_items(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<PurchaseInvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, PurchaseInvoiceItem>(
            r#"
            SELECT item_id, invoice_id, product_id, quantity, purchase_price, sell_price,
                is_bonus, created_utc
            FROM purchase_invoice_items
            WHERE invoice_id = $1
            ORDER BY created_utc, item_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e))
        })?;

        timer.observe_duration();

        Ok(items)
    }

    /// List purchase invoices with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_purchase_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<PurchaseInvoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_purchase_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let invoices = sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            SELECT invoice_id, provider_id, branch_id, invoice_number, invoice_date,
                total_amount, notes, image_path, created_utc
            FROM purchase_invoices
            WHERE ($1::uuid IS NULL OR provider_id = $1)
              AND ($2::uuid IS NULL OR branch_id = $2)
              AND ($3::date IS NULL OR invoice_date >= $3)
              AND ($4::date IS NULL OR invoice_date <= $4)
              AND ($5::uuid IS NULL OR invoice_id > $5)
            ORDER BY invoice_id
            LIMIT $6
            "#,
        )
        .bind(filter.provider_id)
        .bind(filter.branch_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Delete one invoice item and give back its stock. A missing product is
    /// skipped: the decrement has nothing left to apply to.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, item_id = %item_id))]
    pub async fn delete_invoice_item(
        &self,
        invoice_id: Uuid,
        item_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let item = sqlx::query_as::<_, PurchaseInvoiceItem>(
            r#"
            SELECT item_id, invoice_id, product_id, quantity, purchase_price, sell_price,
                is_bonus, created_utc
            FROM purchase_invoice_items
            WHERE invoice_id = $1 AND item_id = $2
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load item: {}", e)))?;

        let Some(item) = item else {
            return Ok(false);
        };

        Self::decrement_stock_for_item(&mut *tx, &item).await?;

        sqlx::query("DELETE FROM purchase_invoice_items WHERE item_id = $1")
            .bind(item.item_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete item: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(item_id = %item_id, quantity = item.quantity, "Invoice item deleted");

        Ok(true)
    }

    /// Delete a purchase invoice. Every item gives back its stock first, then
    /// the invoice row goes and the items cascade with it.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_purchase_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_purchase_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let items = sqlx::query_as::<_, PurchaseInvoiceItem>(
            r#"
            SELECT item_id, invoice_id, product_id, quantity, purchase_price, sell_price,
                is_bonus, created_utc
            FROM purchase_invoice_items
            WHERE invoice_id = $1
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load items: {}", e)))?;

        for item in &items {
            Self::decrement_stock_for_item(&mut *tx, item).await?;
        }

        let result = sqlx::query("DELETE FROM purchase_invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, item_count = items.len(), "Purchase invoice deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Load a product by id with a row lock, serializing concurrent
    /// reconciliations against the same product.
    async fn lock_product(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, category_id, provider_id, unit_id, name, barcode,
                purchase_price, sell_price, stock, low_stock_threshold, active,
                created_utc, updated_utc
            FROM products
            WHERE product_id = $1
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock product: {}", e)))
    }

    /// Load the first product carrying this barcode, with a row lock. The
    /// barcode is treated as effectively unique; creation order breaks ties.
    async fn lock_product_by_barcode(
        conn: &mut PgConnection,
        barcode: &str,
    ) -> Result<Option<Product>, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, category_id, provider_id, unit_id, name, barcode,
                purchase_price, sell_price, stock, low_stock_threshold, active,
                created_utc, updated_utc
            FROM products
            WHERE barcode = $1
            ORDER BY created_utc, product_id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(barcode)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to look up barcode: {}", e))
        })
    }

    /// Inverse of the reconciliation stock increment. The product may have
    /// been deleted since the item was recorded; that decrement is skipped.
    async fn decrement_stock_for_item(
        conn: &mut PgConnection,
        item: &PurchaseInvoiceItem,
    ) -> Result<(), AppError> {
        let Some(product_id) = item.product_id else {
            STOCK_DECREMENTS_SKIPPED_TOTAL.inc();
            warn!(item_id = %item.item_id, "Item has no product; stock decrement skipped");
            return Ok(());
        };

        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_utc = NOW() WHERE product_id = $1",
        )
        .bind(product_id)
        .bind(item.quantity)
        .execute(conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to decrement stock: {}", e))
        })?;

        if result.rows_affected() == 0 {
            STOCK_DECREMENTS_SKIPPED_TOTAL.inc();
            warn!(
                item_id = %item.item_id,
                product_id = %product_id,
                "Product missing at item deletion; stock decrement skipped"
            );
        }

        Ok(())
    }
}
