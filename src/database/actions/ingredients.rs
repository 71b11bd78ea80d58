use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    constants::{INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH},
    error::{query_error, NotFoundError, TypeError},
    form::check_length,
    schema::{Id, Ingredient, RecipePart},
};

fn check_ingredient(name: &str, measurement_unit: &str) -> Result<(), TypeError> {
    if name.is_empty() || measurement_unit.is_empty() {
        return Err(TypeError::new("Ingredient name and measurement unit must not be empty"));
    }
    check_length("name", name, INGREDIENT_NAME_MAX_LENGTH)?;
    check_length("measurement_unit", measurement_unit, MEASUREMENT_UNIT_MAX_LENGTH)
}

pub async fn create_ingredient(
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, potion::Error> {
    check_ingredient(name.trim(), measurement_unit.trim())?;

    let ingredient: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(name.trim())
    .bind(measurement_unit.trim())
    .fetch_one(pool)
    .await
    .map_err(query_error)?;

    log::info!("Created ingredient {} ({})", ingredient.name, ingredient.id);
    Ok(ingredient)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Ingredient, potion::Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(query_error)?;

    row.ok_or_else(|| NotFoundError::new("ingredient", id).into())
}

/// Case-insensitive prefix search on the name; everything when `name` is empty.
pub async fn search_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let pattern = format!("{}%", escape_like(name.unwrap_or("").trim()));

    let rows: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name, id")
            .bind(pattern)
            .fetch_all(pool)
            .await
            .map_err(query_error)?;

    Ok(rows)
}

/// Ingredient lines of every recipe in `recipe_ids`, keyed by recipe.
pub async fn list_recipe_parts(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipePart>>, potion::Error> {
    let rows: Vec<RecipePart> = sqlx::query_as("
        SELECT ri.recipe_id AS recipe_id, i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ")
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    let mut hashmap: HashMap<Id, Vec<RecipePart>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.recipe_id).or_default().push(row);
    });

    Ok(hashmap)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_ingredient_fields() {
        assert!(check_ingredient("Salt", "g").is_ok());
        assert!(check_ingredient("", "g").is_err());
        assert!(check_ingredient("Salt", "").is_err());
        assert!(check_ingredient(&"s".repeat(201), "g").is_err());
        assert!(check_ingredient("Salt", &"g".repeat(201)).is_err());
        assert!(check_ingredient(&"s".repeat(200), &"g".repeat(200)).is_ok());
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("salt"), "salt");
    }
}
