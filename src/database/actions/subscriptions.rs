use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{query_error, ConflictError, NotFoundError, TypeError},
    pagination::{Page, PageContext},
    schema::{AuthorRecipe, AuthorRow, Id, RecipeShort, SubscribedAuthor},
};

use super::{begin_error, commit_error};

/// Which of `author_ids` the viewer follows. Anonymous viewers follow nobody.
pub async fn subscribed_author_ids(
    viewer: Option<&SessionData>,
    author_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Id>, potion::Error> {
    let viewer = match viewer {
        Some(viewer) if !author_ids.is_empty() => viewer,
        _ => return Ok(HashSet::new()),
    };

    let rows: Vec<(Id,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE subscriber_id = $1 AND author_id = ANY($2)",
    )
    .bind(viewer.user_id)
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Newest recipes of each author, at most `limit` per author when given.
async fn list_author_recipes(
    author_ids: &[Id],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipeShort>>, potion::Error> {
    let rows: Vec<AuthorRecipe> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM (
            SELECT r.author_id, r.id, r.name, r.image, r.cooking_time, r.created,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.created DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, created DESC, id DESC
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    let mut hashmap: HashMap<Id, Vec<RecipeShort>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.author_id).or_default().push(row.into());
    });

    Ok(hashmap)
}

async fn build_subscribed_authors(
    rows: Vec<AuthorRow>,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscribedAuthor>, potion::Error> {
    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut recipes = list_author_recipes(&ids, recipes_limit, pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| SubscribedAuthor {
            recipes: recipes.remove(&row.id).unwrap_or_default(),
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: true,
            recipes_count: row.recipes_count,
        })
        .collect())
}

pub async fn subscribe(
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscribedAuthor, potion::Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let mut tr = pool.begin().await.map_err(begin_error)?;

    let author: Option<AuthorRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            1::BIGINT AS count
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(author_id)
    .fetch_optional(&mut *tr)
    .await
    .map_err(query_error)?;

    let author = author.ok_or_else(|| NotFoundError::new("user", author_id))?;

    if author.id == session.user_id {
        return Err(TypeError::new("You cannot subscribe to yourself").into());
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (subscriber_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author_id)
    .execute(&mut *tr)
    .await
    .map_err(query_error)?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::new("You are already subscribed to this user").into());
    }

    tr.commit().await.map_err(commit_error)?;
    log::info!("User {} subscribed to {}", session.user_id, author_id);

    let mut authors = build_subscribed_authors(vec![author], recipes_limit, pool).await?;
    authors
        .pop()
        .ok_or_else(|| NotFoundError::new("user", author_id).into())
}

pub async fn unsubscribe(
    session: &SessionData,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let mut tr = pool.begin().await.map_err(begin_error)?;

    let author: Option<(Id,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(author_id)
        .fetch_optional(&mut *tr)
        .await
        .map_err(query_error)?;

    if author.is_none() {
        return Err(NotFoundError::new("user", author_id).into());
    }

    let result =
        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND author_id = $2")
            .bind(session.user_id)
            .bind(author_id)
            .execute(&mut *tr)
            .await
            .map_err(query_error)?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::new("You are not subscribed to this user").into());
    }

    tr.commit().await.map_err(commit_error)?;
    log::info!("User {} unsubscribed from {}", session.user_id, author_id);

    Ok(())
}

pub async fn fetch_subscriptions(
    session: &SessionData,
    page: Page,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscribedAuthor>, potion::Error> {
    let rows: Vec<AuthorRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.subscriber_id = $1
        ORDER BY s.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    if rows.is_empty() {
        let total_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = $1")
                .bind(session.user_id)
                .fetch_one(pool)
                .await
                .map_err(query_error)?;
        return Ok(PageContext::no_rows(total_count.0, page));
    }

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let authors = build_subscribed_authors(rows, recipes_limit, pool).await?;

    Ok(PageContext::from_rows(authors, total_count, page))
}
