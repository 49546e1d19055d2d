//! Product catalog repository.
//!
//! Listing queries are assembled with [`sqlx::QueryBuilder`] from a
//! [`ProductFilter`]; inactive products are excluded from everything except
//! the admin lookups.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use insightshop_core::ProductId;

use super::RepositoryError;
use crate::models::product::{NewProduct, Product, ProductFilter, ProductSort, ProductUpdate};

const PRODUCT_COLUMNS: &str = "id, name, description, price, original_price, category, \
    clothing_type, color, size, fabric, occasion, age_group, dress_style, available_colors, \
    available_sizes, stock_quantity, rating, review_count, image_url, is_active, created_at, \
    updated_at";

/// Internal row type for `PostgreSQL` product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    original_price: Option<Decimal>,
    category: String,
    clothing_type: Option<String>,
    color: Option<String>,
    size: Option<String>,
    fabric: Option<String>,
    occasion: Option<String>,
    age_group: Option<String>,
    dress_style: Option<String>,
    available_colors: Json<Vec<String>>,
    available_sizes: Json<Vec<String>>,
    stock_quantity: i32,
    rating: Decimal,
    review_count: i32,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            original_price: row.original_price,
            category: row.category,
            clothing_type: row.clothing_type,
            color: row.color,
            size: row.size,
            fabric: row.fabric,
            occasion: row.occasion,
            age_group: row.age_group,
            dress_style: row.dress_style,
            available_colors: row.available_colors.0,
            available_sizes: row.available_sizes.0,
            stock_quantity: row.stock_quantity,
            rating: row.rating,
            review_count: row.review_count,
            image_url: row.image_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Append `WHERE` conditions for every set field of `filter`.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE is_active");

    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", escape_like(query));
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    for (column, value) in [
        ("category", &filter.category),
        ("clothing_type", &filter.clothing_type),
        ("occasion", &filter.occasion),
        ("age_group", &filter.age_group),
        ("dress_style", &filter.dress_style),
    ] {
        if let Some(value) = value {
            qb.push(format!(" AND lower({column}) = lower("))
                .push_bind(value.clone())
                .push(")");
        }
    }

    if let Some(color) = &filter.color {
        qb.push(" AND (lower(color) = lower(")
            .push_bind(color.clone())
            .push(") OR EXISTS (SELECT 1 FROM jsonb_array_elements_text(available_colors) c WHERE lower(c) = lower(")
            .push_bind(color.clone())
            .push(")))");
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND price <= ").push_bind(max);
    }
    if filter.in_stock_only {
        qb.push(" AND stock_quantity > 0");
    }
}

const fn order_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Relevance => " ORDER BY (stock_quantity > 0) DESC, rating DESC, id",
        ProductSort::PriceAsc => " ORDER BY price ASC, id",
        ProductSort::PriceDesc => " ORDER BY price DESC, id",
        ProductSort::Rating => " ORDER BY rating DESC, review_count DESC, id",
        ProductSort::Newest => " ORDER BY created_at DESC, id DESC",
    }
}

/// Escape `%`, `_` and `\` so user text matches literally inside `ILIKE`.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Repository for product database operations.
pub struct ProductRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ProductRepository<'c> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Get an active product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM insightshop.product WHERE id = $1 AND is_active"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a product by ID, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_any(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM insightshop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get active products by ID, in the order of `ids`.
    ///
    /// Missing or inactive IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM insightshop.product WHERE id = ANY($1) AND is_active"
        ))
        .bind(&raw)
        .fetch_all(&mut *self.conn)
        .await?;

        let mut products: Vec<Product> = rows.into_iter().map(Into::into).collect();
        products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
        Ok(products)
    }

    /// Lock products for the rest of the transaction (`FOR UPDATE`).
    ///
    /// Rows are locked in ID order to avoid deadlocks between concurrent
    /// checkouts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_update(
        &mut self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM insightshop.product WHERE id = ANY($1) \
             ORDER BY id FOR UPDATE"
        ))
        .bind(&raw)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List active products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM insightshop.product"));
        push_filters(&mut qb, filter);
        qb.push(order_clause(filter.sort));
        qb.push(" LIMIT ")
            .push_bind(filter.effective_limit())
            .push(" OFFSET ")
            .push_bind(filter.effective_offset());

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count active products matching `filter`, ignoring paging.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&mut self, filter: &ProductFilter) -> Result<i64, RepositoryError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM insightshop.product");
        push_filters(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&mut *self.conn).await?;
        Ok(count)
    }

    /// Every active product, for index rebuilds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all_active(&mut self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM insightshop.product WHERE is_active ORDER BY id"
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&mut self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO insightshop.product (
                name, description, price, original_price, category, clothing_type, color,
                size, fabric, occasion, age_group, dress_style, available_colors,
                available_sizes, stock_quantity, image_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.original_price)
        .bind(&input.category)
        .bind(input.clothing_type.as_deref())
        .bind(input.color.as_deref())
        .bind(input.size.as_deref())
        .bind(input.fabric.as_deref())
        .bind(input.occasion.as_deref())
        .bind(input.age_group.as_deref())
        .bind(input.dress_style.as_deref())
        .bind(Json(&input.available_colors))
        .bind(Json(&input.available_sizes))
        .bind(input.stock_quantity)
        .bind(input.image_url.as_deref())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(row.into())
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &mut self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE insightshop.product SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                original_price = COALESCE($5, original_price),
                category = COALESCE($6, category),
                clothing_type = COALESCE($7, clothing_type),
                color = COALESCE($8, color),
                fabric = COALESCE($9, fabric),
                occasion = COALESCE($10, occasion),
                age_group = COALESCE($11, age_group),
                dress_style = COALESCE($12, dress_style),
                available_colors = COALESCE($13, available_colors),
                available_sizes = COALESCE($14, available_sizes),
                stock_quantity = COALESCE($15, stock_quantity),
                image_url = COALESCE($16, image_url),
                is_active = COALESCE($17, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.description.as_deref())
        .bind(update.price)
        .bind(update.original_price)
        .bind(update.category.as_deref())
        .bind(update.clothing_type.as_deref())
        .bind(update.color.as_deref())
        .bind(update.fabric.as_deref())
        .bind(update.occasion.as_deref())
        .bind(update.age_group.as_deref())
        .bind(update.dress_style.as_deref())
        .bind(update.available_colors.as_ref().map(Json))
        .bind(update.available_sizes.as_ref().map(Json))
        .bind(update.stock_quantity)
        .bind(update.image_url.as_deref())
        .bind(update.is_active)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Soft delete: hide the product everywhere.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn deactivate(&mut self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE insightshop.product SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set the stock level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_stock(
        &mut self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE insightshop.product SET stock_quantity = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Add `delta` (may be negative) to the stock level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock would go negative.
    pub async fn adjust_stock(&mut self, id: ProductId, delta: i32) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE insightshop.product
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1 AND stock_quantity + $2 >= 0
            ",
        )
        .bind(id)
        .bind(delta)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "insufficient stock for product {id}"
            )));
        }
        Ok(())
    }

    /// Recompute `rating` and `review_count` from the review table.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn refresh_rating(&mut self, id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE insightshop.product p SET
                rating = COALESCE(agg.avg_rating, 0),
                review_count = agg.review_count,
                updated_at = NOW()
            FROM (
                SELECT ROUND(AVG(rating)::numeric, 2) AS avg_rating, COUNT(*)::int AS review_count
                FROM insightshop.review WHERE product_id = $1
            ) agg
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("linen"), "linen");
    }

    #[test]
    fn test_push_filters_binds_each_field() {
        let filter = ProductFilter {
            query: Some("linen".to_owned()),
            category: Some("women".to_owned()),
            color: Some("red".to_owned()),
            max_price: Some(Decimal::new(50, 0)),
            in_stock_only: true,
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM insightshop.product");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("WHERE is_active"));
        assert!(sql.contains("name ILIKE $1 OR description ILIKE $2"));
        assert!(sql.contains("lower(category) = lower($3)"));
        assert!(sql.contains("lower(color) = lower($4)"));
        assert!(sql.contains("lower(c) = lower($5)"));
        assert!(sql.contains("price <= $6"));
        assert!(sql.contains("stock_quantity > 0"));
    }

    #[test]
    fn test_empty_filter_only_hides_inactive() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM insightshop.product");
        push_filters(&mut qb, &ProductFilter::default());
        assert_eq!(qb.sql(), "SELECT id FROM insightshop.product WHERE is_active");
    }
}
