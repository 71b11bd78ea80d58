use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{query_error, ConflictError, NotFoundError},
    schema::{Id, RecipeShort},
};

use super::{begin_error, commit_error};

/// Per-user recipe lists that behave the same way: favorites and the shopping cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }

    fn action(&self) -> ActionType {
        match self {
            RecipeList::Favorites => ActionType::ManageOwnFavorites,
            RecipeList::ShoppingCart => ActionType::ManageOwnShoppingCart,
        }
    }

    fn already_present(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is already in favorites",
            RecipeList::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn not_present(&self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is not in favorites",
            RecipeList::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

pub async fn add_to_list(
    list: RecipeList,
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, potion::Error> {
    session.authenticate(list.action())?;

    let mut tr = pool.begin().await.map_err(begin_error)?;

    let recipe: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(&mut *tr)
            .await
            .map_err(query_error)?;

    let recipe = recipe.ok_or_else(|| NotFoundError::new("recipe", recipe_id))?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        list.table()
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(&mut *tr)
    .await
    .map_err(query_error)?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::new(list.already_present()).into());
    }

    tr.commit().await.map_err(commit_error)?;
    log::debug!(
        "User {} added recipe {} to {}",
        session.user_id,
        recipe_id,
        list.table()
    );

    Ok(recipe)
}

pub async fn remove_from_list(
    list: RecipeList,
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(list.action())?;

    let mut tr = pool.begin().await.map_err(begin_error)?;

    let recipe: Option<(Id,)> = sqlx::query_as("SELECT id FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .fetch_optional(&mut *tr)
        .await
        .map_err(query_error)?;

    if recipe.is_none() {
        return Err(NotFoundError::new("recipe", recipe_id).into());
    }

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(&mut *tr)
    .await
    .map_err(query_error)?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::new(list.not_present()).into());
    }

    tr.commit().await.map_err(commit_error)?;
    log::debug!(
        "User {} removed recipe {} from {}",
        session.user_id,
        recipe_id,
        list.table()
    );

    Ok(())
}

/// Which of `recipe_ids` are on the viewer's list. Anonymous viewers have empty lists.
pub async fn listed_recipe_ids(
    list: RecipeList,
    viewer: Option<&SessionData>,
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Id>, potion::Error> {
    let viewer = match viewer {
        Some(viewer) if !recipe_ids.is_empty() => viewer,
        _ => return Ok(HashSet::new()),
    };

    let rows: Vec<(Id,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
        list.table()
    ))
    .bind(viewer.user_id)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}
