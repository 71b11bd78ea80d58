use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::query_error,
    schema::{CartIngredientRow, Id},
    shopping_list::shopping_list_text,
};

/// Every (ingredient, amount) pairing of every recipe in the user's cart, in
/// cart order and then recipe order.
pub async fn list_cart_ingredients(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredientRow>, potion::Error> {
    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shopping_cart sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        ORDER BY sc.id, ri.id
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    Ok(rows)
}

pub async fn download_shopping_cart(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let rows = list_cart_ingredients(session.user_id, pool).await?;
    log::debug!(
        "Exporting shopping cart of user {} ({} rows)",
        session.user_id,
        rows.len()
    );

    Ok(shopping_list_text(&rows))
}
