//! Service catalog repository
//!
//! Services are keyed by name. Catalog syncs overwrite every mutable attribute
//! (last write wins) and never delete, so a service that disappears upstream
//! keeps its row with an aging `last_synced_at`.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{
    ApmPresence, ApmStatusRow, FilterOptions, ServiceFilter, ServiceRecord, ServiceRow,
    ServiceWithApm, TagFilter,
};
use crate::utils::time::now_secs;

use super::{decode_list, encode_list};

type ServiceTuple = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    String,
    String,
    i64,
    i64,
    i64,
);

type ServiceApmTuple = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    String,
    String,
    i64,
    i64,
    i64,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
);

const SERVICE_COLUMNS: &str = "s.name, s.team, s.environment, s.infra_type, s.customer_facing, s.tags, s.dependencies, s.last_synced_at, s.created_at, s.updated_at";

const SERVICE_APM_SELECT: &str = "SELECT s.name, s.team, s.environment, s.infra_type, s.customer_facing, s.tags, s.dependencies, s.last_synced_at, s.created_at, s.updated_at, \
     a.service_name, a.language, a.span_count, a.last_seen_at, a.updated_at \
     FROM services s LEFT JOIN apm_status a ON a.service_name = s.name";

fn service_from_tuple(t: ServiceTuple) -> Result<ServiceRow, SqliteError> {
    let (
        name,
        team,
        environment,
        infra_type,
        customer_facing,
        tags,
        dependencies,
        last_synced_at,
        created_at,
        updated_at,
    ) = t;
    Ok(ServiceRow {
        name,
        team,
        environment,
        infra_type,
        customer_facing,
        tags: decode_list("services", "tags", &tags)?,
        dependencies: decode_list("services", "dependencies", &dependencies)?,
        last_synced_at,
        created_at,
        updated_at,
    })
}

fn joined_from_tuple(t: ServiceApmTuple) -> Result<ServiceWithApm, SqliteError> {
    let (
        name,
        team,
        environment,
        infra_type,
        customer_facing,
        tags,
        dependencies,
        last_synced_at,
        created_at,
        updated_at,
        apm_name,
        language,
        span_count,
        last_seen_at,
        apm_updated_at,
    ) = t;

    let service = service_from_tuple((
        name,
        team,
        environment,
        infra_type,
        customer_facing,
        tags,
        dependencies,
        last_synced_at,
        created_at,
        updated_at,
    ))?;

    let apm = apm_name.map(|service_name| ApmStatusRow {
        service_name,
        language,
        span_count: span_count.unwrap_or(0),
        last_seen_at,
        updated_at: apm_updated_at.unwrap_or(0),
    });

    Ok(ServiceWithApm { service, apm })
}

/// Upsert one page of catalog records in a single transaction
///
/// Returns the number of records written.
pub async fn upsert_services(
    pool: &SqlitePool,
    records: &[ServiceRecord],
) -> Result<u64, SqliteError> {
    if records.is_empty() {
        return Ok(0);
    }
    let now = now_secs();

    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO services (name, team, environment, infra_type, customer_facing, tags, dependencies, last_synced_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                team = excluded.team,
                environment = excluded.environment,
                infra_type = excluded.infra_type,
                customer_facing = excluded.customer_facing,
                tags = excluded.tags,
                dependencies = excluded.dependencies,
                last_synced_at = excluded.last_synced_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.name)
        .bind(&record.team)
        .bind(&record.environment)
        .bind(&record.infra_type)
        .bind(record.customer_facing)
        .bind(encode_list(&record.tags))
        .bind(encode_list(&record.dependencies))
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(records.len() as u64)
}

/// Get one service with its APM status
pub async fn get_service(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<ServiceWithApm>, SqliteError> {
    let sql = format!("{} WHERE s.name = ?", SERVICE_APM_SELECT);
    let row = sqlx::query_as::<_, ServiceApmTuple>(&sql)
        .bind(name)
        .fetch_optional(pool)
        .await?;

    row.map(joined_from_tuple).transpose()
}

/// Fetch catalog rows for the given names (unknown names are skipped)
pub async fn get_services_by_name(
    pool: &SqlitePool,
    names: &[String],
) -> Result<Vec<ServiceRow>, SqliteError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM services s WHERE s.name IN ({}) ORDER BY s.name",
        SERVICE_COLUMNS, placeholders
    );
    let mut query = sqlx::query_as::<_, ServiceTuple>(&sql);
    for name in names {
        query = query.bind(name);
    }

    query
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(service_from_tuple)
        .collect()
}

/// Build the WHERE clause and its string binds for a service filter
fn filter_clause(filter: &ServiceFilter) -> (String, Vec<String>) {
    let mut conditions: Vec<&'static str> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(ref team) = filter.team {
        conditions.push("s.team = ?");
        binds.push(team.clone());
    }
    if let Some(ref environment) = filter.environment {
        conditions.push("s.environment = ?");
        binds.push(environment.clone());
    }
    if let Some(ref infra_type) = filter.infra_type {
        conditions.push("s.infra_type = ?");
        binds.push(infra_type.clone());
    }
    match filter.apm {
        Some(ApmPresence::Enabled) => conditions.push("a.service_name IS NOT NULL"),
        Some(ApmPresence::Disabled) => conditions.push("a.service_name IS NULL"),
        None => {}
    }
    if let Some(ref needle) = filter.name_contains {
        conditions.push("instr(lower(s.name), lower(?)) > 0");
        binds.push(needle.clone());
    }
    match filter.customer_facing {
        Some(true) => conditions.push("s.customer_facing = 1"),
        Some(false) => conditions.push("s.customer_facing = 0"),
        None => {}
    }
    match filter.tag {
        Some(TagFilter::KeyValue(ref key, ref value)) => {
            conditions.push("EXISTS (SELECT 1 FROM json_each(s.tags) WHERE json_each.value = ?)");
            binds.push(format!("{}:{}", key, value));
        }
        Some(TagFilter::Key(ref key)) => {
            conditions.push(
                "EXISTS (SELECT 1 FROM json_each(s.tags) WHERE json_each.value = ? OR instr(json_each.value, ?) = 1)",
            );
            binds.push(key.clone());
            binds.push(format!("{}:", key));
        }
        None => {}
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), binds)
    }
}

/// List services matching a filter, ordered by name
///
/// Returns the page and the total number of matching services.
pub async fn list_services(
    pool: &SqlitePool,
    filter: &ServiceFilter,
    page: u32,
    limit: u32,
) -> Result<(Vec<ServiceWithApm>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;
    let (where_clause, binds) = filter_clause(filter);

    let sql = format!(
        "{}{} ORDER BY s.name LIMIT ? OFFSET ?",
        SERVICE_APM_SELECT, where_clause
    );
    let mut query = sqlx::query_as::<_, ServiceApmTuple>(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let rows = query.bind(limit).bind(offset).fetch_all(pool).await?;

    let count_sql = format!(
        "SELECT COUNT(*) FROM services s LEFT JOIN apm_status a ON a.service_name = s.name{}",
        where_clause
    );
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total = count_query.fetch_one(pool).await?;

    let services = rows
        .into_iter()
        .map(joined_from_tuple)
        .collect::<Result<Vec<_>, _>>()?;

    Ok((services, total.0 as u64))
}

/// Declared runtime dependencies of every service that has any
pub async fn get_dependency_map(
    pool: &SqlitePool,
) -> Result<HashMap<String, Vec<String>>, SqliteError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT name, dependencies FROM services WHERE dependencies != '[]'",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(name, deps)| Ok((name, decode_list("services", "dependencies", &deps)?)))
        .collect()
}

/// Names of services that declare `name` as a dependency
pub async fn list_dependents(pool: &SqlitePool, name: &str) -> Result<Vec<String>, SqliteError> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT s.name FROM services s WHERE EXISTS (SELECT 1 FROM json_each(s.dependencies) WHERE json_each.value = ?) ORDER BY s.name",
    )
    .bind(name)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(n,)| n).collect())
}

/// Distinct non-null values for the listing filters
pub async fn get_filter_options(pool: &SqlitePool) -> Result<FilterOptions, SqliteError> {
    async fn distinct(pool: &SqlitePool, column: &str) -> Result<Vec<String>, SqliteError> {
        let sql = format!(
            "SELECT DISTINCT {col} FROM services WHERE {col} IS NOT NULL AND {col} != '' ORDER BY {col}",
            col = column
        );
        let rows = sqlx::query_as::<_, (String,)>(&sql).fetch_all(pool).await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    Ok(FilterOptions {
        teams: distinct(pool, "team").await?,
        environments: distinct(pool, "environment").await?,
        infra_types: distinct(pool, "infra_type").await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::apm_status::upsert_apm_statuses;
    use crate::data::sqlite::repositories::test_support::setup_test_pool;
    use crate::data::types::ApmStatusRecord;

    fn record(name: &str, team: &str) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            team: Some(team.to_string()),
            environment: Some("prod".to_string()),
            infra_type: Some("Container".to_string()),
            customer_facing: false,
            tags: vec![format!("team:{}", team), "env:prod".to_string()],
            dependencies: Vec::new(),
        }
    }

    fn apm(name: &str) -> ApmStatusRecord {
        ApmStatusRecord {
            service_name: name.to_string(),
            language: Some("Java".to_string()),
            span_count: 10,
            last_seen_at: Some(1_700_000_000),
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites() {
        let pool = setup_test_pool().await;

        upsert_services(&pool, &[record("checkout", "payments")])
            .await
            .unwrap();
        let first = get_service(&pool, "checkout").await.unwrap().unwrap();
        assert_eq!(first.service.team.as_deref(), Some("payments"));
        assert!(first.apm.is_none());

        let mut changed = record("checkout", "storefront");
        changed.customer_facing = true;
        upsert_services(&pool, &[changed]).await.unwrap();

        let second = get_service(&pool, "checkout").await.unwrap().unwrap();
        assert_eq!(second.service.team.as_deref(), Some("storefront"));
        assert!(second.service.customer_facing);
        assert_eq!(second.service.created_at, first.service.created_at);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM services")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_upsert_empty_page_is_noop() {
        let pool = setup_test_pool().await;
        assert_eq!(upsert_services(&pool, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_service_missing() {
        let pool = setup_test_pool().await;
        assert!(get_service(&pool, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let pool = setup_test_pool().await;
        let mut web = record("web-frontend", "storefront");
        web.customer_facing = true;
        web.tags.push("public".to_string());
        let mut batch = record("batch-export", "data");
        batch.environment = Some("staging".to_string());
        batch.infra_type = Some("Serverless".to_string());
        upsert_services(
            &pool,
            &[record("checkout", "payments"), web, batch],
        )
        .await
        .unwrap();
        upsert_apm_statuses(&pool, &[apm("checkout")]).await.unwrap();

        let all = list_services(&pool, &ServiceFilter::default(), 1, 10)
            .await
            .unwrap();
        assert_eq!(all.1, 3);
        let names: Vec<_> = all.0.iter().map(|s| s.service.name.as_str()).collect();
        assert_eq!(names, vec!["batch-export", "checkout", "web-frontend"]);

        let filter = ServiceFilter {
            apm: Some(ApmPresence::Enabled),
            ..Default::default()
        };
        let (rows, total) = list_services(&pool, &filter, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].service.name, "checkout");
        assert_eq!(rows[0].apm.as_ref().unwrap().language.as_deref(), Some("Java"));

        let filter = ServiceFilter {
            apm: Some(ApmPresence::Disabled),
            environment: Some("prod".to_string()),
            ..Default::default()
        };
        let (rows, _) = list_services(&pool, &filter, 1, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service.name, "web-frontend");

        let filter = ServiceFilter {
            name_contains: Some("CHECK".to_string()),
            ..Default::default()
        };
        assert_eq!(list_services(&pool, &filter, 1, 10).await.unwrap().1, 1);

        let filter = ServiceFilter {
            customer_facing: Some(true),
            ..Default::default()
        };
        assert_eq!(list_services(&pool, &filter, 1, 10).await.unwrap().1, 1);

        let filter = ServiceFilter {
            infra_type: Some("Serverless".to_string()),
            team: Some("data".to_string()),
            ..Default::default()
        };
        assert_eq!(list_services(&pool, &filter, 1, 10).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn test_list_tag_filter() {
        let pool = setup_test_pool().await;
        let mut web = record("web-frontend", "storefront");
        web.tags.push("public".to_string());
        upsert_services(&pool, &[record("checkout", "payments"), web])
            .await
            .unwrap();

        let by_pair = ServiceFilter {
            tag: TagFilter::parse("team:payments"),
            ..Default::default()
        };
        let (rows, _) = list_services(&pool, &by_pair, 1, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service.name, "checkout");

        let by_key = ServiceFilter {
            tag: TagFilter::parse("team"),
            ..Default::default()
        };
        assert_eq!(list_services(&pool, &by_key, 1, 10).await.unwrap().1, 2);

        let bare = ServiceFilter {
            tag: TagFilter::parse("public"),
            ..Default::default()
        };
        assert_eq!(list_services(&pool, &bare, 1, 10).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let pool = setup_test_pool().await;
        let records: Vec<_> = (0..5).map(|i| record(&format!("svc-{}", i), "t")).collect();
        upsert_services(&pool, &records).await.unwrap();

        let (page2, total) = list_services(&pool, &ServiceFilter::default(), 2, 2)
            .await
            .unwrap();
        assert_eq!(total, 5);
        let names: Vec<_> = page2.iter().map(|s| s.service.name.as_str()).collect();
        assert_eq!(names, vec!["svc-2", "svc-3"]);
    }

    #[tokio::test]
    async fn test_dependency_map_and_dependents() {
        let pool = setup_test_pool().await;
        let mut checkout = record("checkout", "payments");
        checkout.dependencies = vec!["inventory".to_string(), "payments-db".to_string()];
        let mut cart = record("cart", "storefront");
        cart.dependencies = vec!["inventory".to_string()];
        upsert_services(&pool, &[checkout, cart, record("inventory", "stock")])
            .await
            .unwrap();

        let map = get_dependency_map(&pool).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("checkout").unwrap(),
            &vec!["inventory".to_string(), "payments-db".to_string()]
        );
        assert!(!map.contains_key("inventory"));

        let dependents = list_dependents(&pool, "inventory").await.unwrap();
        assert_eq!(dependents, vec!["cart".to_string(), "checkout".to_string()]);
    }

    #[tokio::test]
    async fn test_get_services_by_name_skips_unknown() {
        let pool = setup_test_pool().await;
        upsert_services(&pool, &[record("checkout", "payments")])
            .await
            .unwrap();

        let rows = get_services_by_name(
            &pool,
            &["checkout".to_string(), "ghost".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(get_services_by_name(&pool, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filter_options() {
        let pool = setup_test_pool().await;
        let mut lambda = record("thumbnailer", "media");
        lambda.environment = None;
        lambda.infra_type = Some("Serverless".to_string());
        upsert_services(&pool, &[record("checkout", "payments"), lambda])
            .await
            .unwrap();

        let options = get_filter_options(&pool).await.unwrap();
        assert_eq!(options.teams, vec!["media", "payments"]);
        assert_eq!(options.environments, vec!["prod"]);
        assert_eq!(options.infra_types, vec!["Container", "Serverless"]);
    }
}
