/// Default implementation for a Repository that factors out the SQL shared
/// between Postgres and SQLite.
///
/// Usage:
///
/// The struct has to have certain fields, since this macro relies on them:
///
/// ```ignore
/// pub struct MyRepository {
///     pub executor: sqlx::Pool<sqlx::SqlxDatabaseType>
/// }
///
/// impl MyRepository {
///     pub const MIGRATOR: sqlx::Migrator = sqlx::migrate!("my/migrations");
///     pub fn interpret_error(error: sqlx::Error) -> Error {
///         // Interpret the database-specific error code and turn some sqlx errors
///         // into the Error enum values like UniqueConstraintViolation/FKConstraintViolation
///         // ...
///     }
/// }
///
/// implement_repository!(SqliteRepository)
/// ```
///
/// The implementations are generated instead of being generic over `sqlx::Database`:
/// a generic version needs a `where` clause per bound argument and result type, and
/// `#[async_trait]` doesn't compose with per-method default macros. The price is no
/// compile-time query checking.

pub const BASE_COLUMNS: &str =
    "id, name, description, color, owner_id, created_at, updated_at";
pub const TABLE_COLUMNS: &str =
    "id, base_id, name, description, owner_id, created_at, updated_at";
pub const FIELD_COLUMNS: &str = "id, table_id, name, field_type, options, required, \
    position, owner_id, created_at, updated_at";
pub const RECORD_COLUMNS: &str = "id, table_id, data, owner_id, created_at, updated_at";
pub const VIEW_COLUMNS: &str =
    "id, table_id, name, view_type, config, owner_id, created_at, updated_at";

#[macro_export]
macro_rules! implement_repository {
    ($repo: ident) => {
#[async_trait]
impl Repository for $repo {
    async fn setup(&self) {
        $repo::MIGRATOR
            .run(&self.executor)
            .await
            .expect("error running migrations");
    }

    async fn create_base(&self, base: &BaseRow) -> Result<BaseRow, Error> {
        let query = format!(
            "INSERT INTO base ({BASE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
            RETURNING {BASE_COLUMNS}"
        );
        let row = sqlx::query_as(&query)
            .bind(&base.id)
            .bind(&base.name)
            .bind(&base.description)
            .bind(&base.color)
            .bind(&base.owner_id)
            .bind(base.created_at)
            .bind(base.updated_at)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn get_base(&self, id: &str, owner_id: &str) -> Result<BaseRow, Error> {
        let query = format!("SELECT {BASE_COLUMNS} FROM base WHERE id = $1 AND owner_id = $2");
        let row = sqlx::query_as(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn list_bases(&self, owner_id: &str, order: OrderBy) -> Result<Vec<BaseRow>, Error> {
        let query = format!(
            "SELECT {BASE_COLUMNS} FROM base WHERE owner_id = $1 {}",
            order.to_sql()
        );
        let rows = sqlx::query_as(&query)
            .bind(owner_id)
            .fetch(&self.executor)
            .try_collect()
            .await
            .map_err($repo::interpret_error)?;

        Ok(rows)
    }

    async fn create_table(&self, table: &TableRow) -> Result<TableRow, Error> {
        let query = format!(
            "INSERT INTO base_table ({TABLE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
            RETURNING {TABLE_COLUMNS}"
        );
        let row = sqlx::query_as(&query)
            .bind(&table.id)
            .bind(&table.base_id)
            .bind(&table.name)
            .bind(&table.description)
            .bind(&table.owner_id)
            .bind(table.created_at)
            .bind(table.updated_at)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn get_table(&self, id: &str, owner_id: &str) -> Result<TableRow, Error> {
        let query = format!(
            "SELECT {TABLE_COLUMNS} FROM base_table WHERE id = $1 AND owner_id = $2"
        );
        let row = sqlx::query_as(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn list_tables(
        &self,
        base_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<TableRow>, Error> {
        let query = format!(
            "SELECT {TABLE_COLUMNS} FROM base_table WHERE base_id = $1 AND owner_id = $2 {}",
            order.to_sql()
        );
        let rows = sqlx::query_as(&query)
            .bind(base_id)
            .bind(owner_id)
            .fetch(&self.executor)
            .try_collect()
            .await
            .map_err($repo::interpret_error)?;

        Ok(rows)
    }

    async fn create_field(&self, field: &FieldRow) -> Result<FieldRow, Error> {
        let query = format!(
            "INSERT INTO table_field ({FIELD_COLUMNS}) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
            RETURNING {FIELD_COLUMNS}"
        );
        let row = sqlx::query_as(&query)
            .bind(&field.id)
            .bind(&field.table_id)
            .bind(&field.name)
            .bind(&field.field_type)
            .bind(&field.options)
            .bind(field.required)
            .bind(field.position)
            .bind(&field.owner_id)
            .bind(field.created_at)
            .bind(field.updated_at)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn list_fields(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<FieldRow>, Error> {
        let query = format!(
            "SELECT {FIELD_COLUMNS} FROM table_field WHERE table_id = $1 AND owner_id = $2 {}",
            order.to_sql()
        );
        let rows = sqlx::query_as(&query)
            .bind(table_id)
            .bind(owner_id)
            .fetch(&self.executor)
            .try_collect()
            .await
            .map_err($repo::interpret_error)?;

        Ok(rows)
    }

    async fn update_field(
        &self,
        id: &str,
        owner_id: &str,
        update: &FieldUpdate,
    ) -> Result<FieldRow, Error> {
        // RETURNING + fetch_one turns a missing row into RowNotFound
        let query = format!(
            "UPDATE table_field SET \
                name = COALESCE($1, name), \
                field_type = COALESCE($2, field_type), \
                options = COALESCE($3, options), \
                required = COALESCE($4, required), \
                updated_at = $5 \
            WHERE id = $6 AND owner_id = $7 \
            RETURNING {FIELD_COLUMNS}"
        );
        let row = sqlx::query_as(&query)
            .bind(&update.name)
            .bind(&update.field_type)
            .bind(&update.options)
            .bind(update.required)
            .bind(update.updated_at)
            .bind(id)
            .bind(owner_id)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn create_record(&self, record: &RecordRow) -> Result<RecordRow, Error> {
        let query = format!(
            "INSERT INTO table_record ({RECORD_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
            RETURNING {RECORD_COLUMNS}"
        );
        let row = sqlx::query_as(&query)
            .bind(&record.id)
            .bind(&record.table_id)
            .bind(&record.data)
            .bind(&record.owner_id)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn list_records(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<RecordRow>, Error> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM table_record WHERE table_id = $1 AND owner_id = $2 {}",
            order.to_sql()
        );
        let rows = sqlx::query_as(&query)
            .bind(table_id)
            .bind(owner_id)
            .fetch(&self.executor)
            .try_collect()
            .await
            .map_err($repo::interpret_error)?;

        Ok(rows)
    }

    async fn update_record(
        &self,
        id: &str,
        owner_id: &str,
        data: &str,
        updated_at: Timestamp,
    ) -> Result<RecordRow, Error> {
        let query = format!(
            "UPDATE table_record SET data = $1, updated_at = $2 \
            WHERE id = $3 AND owner_id = $4 \
            RETURNING {RECORD_COLUMNS}"
        );
        let row = sqlx::query_as(&query)
            .bind(data)
            .bind(updated_at)
            .bind(id)
            .bind(owner_id)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn create_view(&self, view: &ViewRow) -> Result<ViewRow, Error> {
        let query = format!(
            "INSERT INTO table_view ({VIEW_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
            RETURNING {VIEW_COLUMNS}"
        );
        let row = sqlx::query_as(&query)
            .bind(&view.id)
            .bind(&view.table_id)
            .bind(&view.name)
            .bind(&view.view_type)
            .bind(&view.config)
            .bind(&view.owner_id)
            .bind(view.created_at)
            .bind(view.updated_at)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;

        Ok(row)
    }

    async fn list_views(
        &self,
        table_id: &str,
        owner_id: &str,
        order: OrderBy,
    ) -> Result<Vec<ViewRow>, Error> {
        let query = format!(
            "SELECT {VIEW_COLUMNS} FROM table_view WHERE table_id = $1 AND owner_id = $2 {}",
            order.to_sql()
        );
        let rows = sqlx::query_as(&query)
            .bind(table_id)
            .bind(owner_id)
            .fetch(&self.executor)
            .try_collect()
            .await
            .map_err($repo::interpret_error)?;

        Ok(rows)
    }

    // In these methods, return the ID back so that we get an error if the
    // row didn't actually exist
    async fn delete_base(&self, id: &str, owner_id: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM base WHERE id = $1 AND owner_id = $2 RETURNING id")
            .bind(id)
            .bind(owner_id)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;
        Ok(())
    }

    async fn delete_table(&self, id: &str, owner_id: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM base_table WHERE id = $1 AND owner_id = $2 RETURNING id")
            .bind(id)
            .bind(owner_id)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;
        Ok(())
    }

    async fn delete_field(&self, id: &str, owner_id: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM table_field WHERE id = $1 AND owner_id = $2 RETURNING id")
            .bind(id)
            .bind(owner_id)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;
        Ok(())
    }

    async fn delete_view(&self, id: &str, owner_id: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM table_view WHERE id = $1 AND owner_id = $2 RETURNING id")
            .bind(id)
            .bind(owner_id)
            .fetch_one(&self.executor)
            .await.map_err($repo::interpret_error)?;
        Ok(())
    }
}

};
}
