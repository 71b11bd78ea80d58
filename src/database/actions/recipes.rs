use std::collections::HashSet;

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{query_error, ForbiddenError, NotFoundError},
    pagination::{Page, PageContext},
    schema::{Id, Recipe, RecipeDetail, RecipeRow, UserProfile, UserRow},
    validation::{validate_recipe, validate_references, RecipeDraft, RecipeLimits},
};

use super::{
    begin_error, commit_error, list_recipe_parts, list_recipe_tags, listed_recipe_ids,
    subscribed_author_ids, RecipeList,
};

/// Query-string filters of the recipe listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

fn push_membership_filter(
    query_builder: &mut QueryBuilder<'_, Postgres>,
    table: &str,
    wanted: bool,
    user_id: Id,
) {
    let exists = if wanted { "EXISTS" } else { "NOT EXISTS" };
    query_builder
        .push(format!(
            " AND {exists} (SELECT 1 FROM {table} l WHERE l.recipe_id = r.id AND l.user_id = "
        ))
        .push_bind(user_id)
        .push(")");
}

/// Appends the `WHERE` conditions of `filter` to a query over `recipes r`.
fn push_recipe_filters(
    query_builder: &mut QueryBuilder<'_, Postgres>,
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
) {
    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }

    if let Some(viewer) = viewer {
        if let Some(wanted) = filter.is_favorited {
            push_membership_filter(query_builder, "favorites", wanted, viewer.user_id);
        }
        if let Some(wanted) = filter.is_in_shopping_cart {
            push_membership_filter(query_builder, "shopping_cart", wanted, viewer.user_id);
        }
    }
}

async fn count_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<i64, potion::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
    push_recipe_filters(&mut query_builder, filter, viewer);

    let count: (i64,) = query_builder
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(query_error)?;

    Ok(count.0)
}

/// Newest recipes first, filtered and hydrated for `viewer`.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    page: Page,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeDetail>, potion::Error> {
    // An anonymous caller has no favorites or cart to match against
    if viewer.is_none()
        && (filter.is_favorited == Some(true) || filter.is_in_shopping_cart == Some(true))
    {
        return Ok(PageContext::no_rows(0, page));
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
    push_recipe_filters(&mut query_builder, filter, viewer);
    query_builder
        .push(" ORDER BY r.created DESC, r.id DESC LIMIT ")
        .push_bind(page.size)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(query_error)?;

    if rows.is_empty() {
        let total_count = match page.offset() {
            0 => 0,
            _ => count_recipes(filter, viewer, pool).await?,
        };
        return Ok(PageContext::no_rows(total_count, page));
    }

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let recipes: Vec<Recipe> = rows.into_iter().map(Recipe::from).collect();
    let details = hydrate_recipes(recipes, viewer, pool).await?;

    Ok(PageContext::from_rows(details, total_count, page))
}

/// Attaches tags, ingredient lines, author profiles and the viewer's flags,
/// batch-loading each kind of data once for the whole slice.
pub async fn hydrate_recipes(
    recipes: Vec<Recipe>,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeDetail>, potion::Error> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let author_ids: Vec<Id> = recipes
        .iter()
        .map(|recipe| recipe.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut tags = list_recipe_tags(&recipe_ids, pool).await?;
    let mut parts = list_recipe_parts(&recipe_ids, pool).await?;
    let favorited = listed_recipe_ids(RecipeList::Favorites, viewer, &recipe_ids, pool).await?;
    let in_cart = listed_recipe_ids(RecipeList::ShoppingCart, viewer, &recipe_ids, pool).await?;
    let subscribed = subscribed_author_ids(viewer, &author_ids, pool).await?;

    let authors: Vec<UserRow> = sqlx::query_as(
        "SELECT id, email, username, first_name, last_name, 0::BIGINT AS count FROM users WHERE id = ANY($1)",
    )
    .bind(author_ids.as_slice())
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    let mut details = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let author = authors
            .iter()
            .find(|author| author.id == recipe.author_id)
            .cloned()
            .ok_or_else(|| NotFoundError::new("user", recipe.author_id))?;
        let is_subscribed = subscribed.contains(&author.id);

        details.push(RecipeDetail {
            id: recipe.id,
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            author: UserProfile::from_row(author, is_subscribed),
            ingredients: parts.remove(&recipe.id).unwrap_or_default(),
            is_favorited: favorited.contains(&recipe.id),
            is_in_shopping_cart: in_cart.contains(&recipe.id),
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            created: recipe.created,
        });
    }

    Ok(details)
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, potion::Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(query_error)?;

    Ok(row)
}

pub async fn require_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Recipe, potion::Error> {
    get_recipe(id, pool)
        .await?
        .ok_or_else(|| NotFoundError::new("recipe", id).into())
}

pub async fn get_recipe_detail(
    id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error> {
    let recipe = require_recipe(id, pool).await?;
    let mut details = hydrate_recipes(vec![recipe], viewer, pool).await?;

    details
        .pop()
        .ok_or_else(|| NotFoundError::new("recipe", id).into())
}

/// Loads a recipe the caller is allowed to change: its author, or anyone
/// holding [`ActionType::ManageAllRecipes`].
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;
    let recipe = require_recipe(id, pool).await?;

    if recipe.author_id == session.user_id || ActionType::ManageAllRecipes.authenticate(session) {
        Ok(recipe)
    } else {
        Err(ForbiddenError::new("Only the author may change this recipe").into())
    }
}

async fn existing_ids(
    table: &str,
    ids: &[Id],
    tr: &mut sqlx::PgConnection,
) -> Result<HashSet<Id>, potion::Error> {
    let rows: Vec<(Id,)> = sqlx::query_as(&format!("SELECT id FROM {table} WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(&mut *tr)
        .await
        .map_err(query_error)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Writes the tag and ingredient associations of `recipe_id` from the draft.
async fn insert_recipe_links(
    recipe_id: Id,
    draft: &RecipeDraft,
    tr: &mut sqlx::PgConnection,
) -> Result<(), potion::Error> {
    let known_ingredients = existing_ids(
        "ingredients",
        &draft.ingredients.iter().map(|part| part.id).collect::<Vec<_>>(),
        &mut *tr,
    )
    .await?;
    let known_tags = existing_ids("tags", &draft.tags, &mut *tr).await?;
    validate_references(draft, &known_ingredients, &known_tags)?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(draft.tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    query_builder
        .build()
        .execute(&mut *tr)
        .await
        .map_err(query_error)?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(draft.ingredients.iter(), |mut b, part| {
        b.push_bind(recipe_id)
            .push_bind(part.id)
            .push_bind(part.amount);
    });
    query_builder
        .build()
        .execute(&mut *tr)
        .await
        .map_err(query_error)?;

    Ok(())
}

/// Validates and stores a recipe with its links; nothing is written unless
/// every part succeeds.
pub async fn create_recipe(
    session: &SessionData,
    draft: &RecipeDraft,
    limits: &RecipeLimits,
    pool: &Pool<Postgres>,
) -> Result<Id, potion::Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_recipe(draft, limits)?;

    let mut tr = pool.begin().await.map_err(begin_error)?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(draft.name.trim())
    .bind(&draft.text)
    .bind(&draft.image)
    .bind(draft.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(query_error)?;

    insert_recipe_links(id.0, draft, &mut *tr).await?;

    tr.commit().await.map_err(commit_error)?;
    log::info!("User {} created recipe {}", session.user_id, id.0);

    Ok(id.0)
}

/// Replaces a recipe's fields and links. A missing image keeps the stored one.
pub async fn update_recipe(
    id: Id,
    session: &SessionData,
    draft: &RecipeDraft,
    limits: &RecipeLimits,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    get_recipe_mut(id, session, pool).await?;
    validate_recipe(draft, limits)?;

    let mut tr = pool.begin().await.map_err(begin_error)?;

    let result = sqlx::query(
        "
        UPDATE recipes
        SET name = $1, text = $2, image = COALESCE($3, image), cooking_time = $4
        WHERE id = $5
    ",
    )
    .bind(draft.name.trim())
    .bind(&draft.text)
    .bind(&draft.image)
    .bind(draft.cooking_time)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(query_error)?;

    if result.rows_affected() == 0 {
        return Err(NotFoundError::new("recipe", id).into());
    }

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(query_error)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(query_error)?;

    insert_recipe_links(id, draft, &mut *tr).await?;

    tr.commit().await.map_err(commit_error)?;
    log::info!("User {} updated recipe {}", session.user_id, id);

    Ok(())
}

pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(query_error)?;

    log::info!("User {} deleted recipe {}", session.user_id, id);
    Ok(())
}
