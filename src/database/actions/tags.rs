use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    constants::{TAG_COLOR_MAX_LENGTH, TAG_NAME_MAX_LENGTH, TAG_SLUG_MAX_LENGTH},
    error::{query_error, ConflictError, NotFoundError, TypeError},
    form::check_length,
    schema::{Id, LinkedRecipeTag, Tag},
};

fn check_tag(name: &str, color: &str, slug: &str) -> Result<(), TypeError> {
    if name.trim().is_empty() || slug.trim().is_empty() {
        return Err(TypeError::new("Tag name and slug must not be empty"));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TypeError::new("Slug may only contain latin letters, digits, '-' and '_'"));
    }
    check_length("name", name, TAG_NAME_MAX_LENGTH)?;
    check_length("color", color, TAG_COLOR_MAX_LENGTH)?;
    check_length("slug", slug, TAG_SLUG_MAX_LENGTH)
}

pub async fn create_tag(
    name: &str,
    color: &str,
    slug: &str,
    pool: &Pool<Postgres>,
) -> Result<Tag, potion::Error> {
    check_tag(name, color, slug)?;

    let tag: Option<Tag> = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(name)
    .bind(color)
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(query_error)?;

    match tag {
        Some(tag) => {
            log::info!("Created tag {} ({})", tag.slug, tag.id);
            Ok(tag)
        }
        None => Err(
            ConflictError::new("A tag with that name, color or slug already exists").into(),
        ),
    }
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Tag, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(query_error)?;

    tag.ok_or_else(|| NotFoundError::new("tag", id).into())
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(query_error)?;

    Ok(list)
}

/// Tags of every recipe in `recipe_ids`, keyed by recipe.
pub async fn list_recipe_tags(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<Tag>>, potion::Error> {
    let rows: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY rt.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    let mut hashmap: HashMap<Id, Vec<Tag>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.recipe_id).or_default().push(row.into());
    });

    Ok(hashmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_tag() {
        assert!(check_tag("Breakfast", "#E26C2D", "breakfast").is_ok());
    }

    #[test]
    fn rejects_malformed_slug() {
        assert!(check_tag("Breakfast", "#E26C2D", "").is_err());
        assert!(check_tag("Breakfast", "#E26C2D", "bread & butter").is_err());
    }

    #[test]
    fn rejects_oversized_fields() {
        assert!(check_tag("Breakfast", "#E26C2D#E26C2D#E2", "breakfast").is_err());
        assert!(check_tag("Breakfast", "#E26C2D", &"b".repeat(51)).is_err());
        assert!(check_tag(&"B".repeat(151), "#E26C2D", "breakfast").is_err());
        assert!(check_tag(&"B".repeat(150), "#E26C2D", &"b".repeat(50)).is_ok());
    }
}
