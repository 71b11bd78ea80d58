use std::collections::HashMap;

use serde_json::Value;

use super::{
    error::TypeError,
    validation::{IngredientAmount, RecipeDraft},
};

pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Object(map) => Ok(Self {
                inner: map.into_iter().collect(),
            }),
            _ => Err(TypeError::new("Expected an object")),
        }
    }

    /// Accepts both JSON numbers and numeric strings.
    pub fn get_number<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: TryFrom<i64>,
    {
        match self.inner.get(key) {
            Some(value) => parse_number(value)
                .ok_or_else(|| TypeError::new(&format!("Invalid number: {key}"))),
            None => Err(TypeError::new(&format!("Missing key: {key}"))),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new(&format!("Failed to parse value as str: {key}"))),
            },
            None => Err(TypeError::new(&format!("Missing key: {key}"))),
        }
    }

    /// Missing keys and `null` both read as `None`.
    pub fn get_optional_str(&self, key: &str) -> Result<Option<String>, TypeError> {
        match self.inner.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_str(key).map(Some),
        }
    }

    fn get_list(&self, key: &str) -> Result<Vec<Value>, TypeError> {
        match self.inner.get(key) {
            Some(Value::Array(values)) => Ok(values.to_owned()),
            Some(_) => Err(TypeError::new(&format!("Expected a list: {key}"))),
            None => Err(TypeError::new(&format!("Missing key: {key}"))),
        }
    }
}

/// Rejects values longer than the `VARCHAR` column they are stored in.
pub fn check_length(key: &str, value: &str, max: usize) -> Result<(), TypeError> {
    if value.chars().count() > max {
        return Err(TypeError::new(&format!("{key} must be at most {max} characters long")));
    }
    Ok(())
}

fn parse_number<T>(value: &Value) -> Option<T>
where
    T: TryFrom<i64>,
{
    let number = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;

    T::try_from(number).ok()
}

impl TryFrom<&Form> for RecipeDraft {
    type Error = TypeError;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let tags = form
            .get_list("tags")?
            .iter()
            .map(|tag| parse_number(tag).ok_or_else(|| TypeError::new("Invalid tag id")))
            .collect::<Result<Vec<_>, _>>()?;

        let ingredients = form
            .get_list("ingredients")?
            .into_iter()
            .map(|part| {
                let part = Form::from_value(part)?;
                Ok(IngredientAmount {
                    id: part.get_number("id")?,
                    amount: part.get_number("amount")?,
                })
            })
            .collect::<Result<Vec<_>, TypeError>>()?;

        Ok(Self {
            name: form.get_str("name")?,
            text: form.get_str("text")?,
            image: form.get_optional_str("image")?,
            cooking_time: form.get_number("cooking_time")?,
            tags,
            ingredients,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn form(value: Value) -> Form {
        Form::from_value(value).unwrap()
    }

    #[test]
    fn parses_recipe_payload() {
        let form = form(json!({
            "ingredients": [{"id": 1, "amount": 10}, {"id": "2", "amount": "25"}],
            "tags": [1, "2"],
            "image": "recipes/borscht.png",
            "name": "Borscht",
            "text": "Boil everything.",
            "cooking_time": "90"
        }));

        let draft = RecipeDraft::try_from(&form).unwrap();
        assert_eq!(draft.tags, vec![1, 2]);
        assert_eq!(
            draft.ingredients,
            vec![
                IngredientAmount { id: 1, amount: 10 },
                IngredientAmount { id: 2, amount: 25 },
            ]
        );
        assert_eq!(draft.cooking_time, 90);
        assert_eq!(draft.image.as_deref(), Some("recipes/borscht.png"));
    }

    #[test]
    fn image_is_optional() {
        let form = form(json!({
            "ingredients": [],
            "tags": [],
            "image": null,
            "name": "Tea",
            "text": "Steep.",
            "cooking_time": 3
        }));

        let draft = RecipeDraft::try_from(&form).unwrap();
        assert_eq!(draft.image, None);
        assert!(draft.ingredients.is_empty());
    }

    #[test]
    fn rejects_malformed_payload() {
        let missing_tags = form(json!({
            "ingredients": [],
            "name": "Tea",
            "text": "Steep.",
            "cooking_time": 3
        }));
        assert!(RecipeDraft::try_from(&missing_tags).is_err());

        let bad_amount = form(json!({
            "ingredients": [{"id": 1, "amount": "lots"}],
            "tags": [1],
            "name": "Tea",
            "text": "Steep.",
            "cooking_time": 3
        }));
        assert!(RecipeDraft::try_from(&bad_amount).is_err());

        let overflowing = form(json!({
            "ingredients": [],
            "tags": [],
            "name": "Tea",
            "text": "Steep.",
            "cooking_time": 9_999_999_999i64
        }));
        assert!(RecipeDraft::try_from(&overflowing).is_err());
    }

    #[test]
    fn reads_strings() {
        let form = form(json!({"name": 5, "title": "Soup", "image": null}));
        assert!(form.get_str("name").is_err());
        assert!(form.get_str("missing").is_err());
        assert_eq!(form.get_str("title").unwrap(), "Soup");
        assert_eq!(form.get_optional_str("image").unwrap(), None);
        assert_eq!(form.get_optional_str("missing").unwrap(), None);
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert!(check_length("color", "#49B64E", 16).is_ok());
        assert!(check_length("color", "#49B64E#49B64E#49", 16).is_err());
        assert!(check_length("name", &"ё".repeat(150), 150).is_ok());
        assert!(check_length("name", &"ё".repeat(151), 150).is_err());
    }
}
