use std::collections::HashSet;

use crate::{
    constants::{
        MAX_COOKING_TIME, MAX_INGREDIENT_AMOUNT, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT,
        RECIPE_NAME_MAX_LENGTH,
    },
    error::ValidationError,
    schema::Id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationRule {
    RequiredIngredients,
    DuplicateIngredients,
    AmountOutOfRange,
    RequiredTags,
    DuplicateTags,
    CookingTimeOutOfRange,
    InvalidName,
    UnknownIngredient,
    UnknownTag,
}

impl ValidationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationRule::RequiredIngredients => "required-ingredients",
            ValidationRule::DuplicateIngredients => "duplicate-ingredients",
            ValidationRule::AmountOutOfRange => "amount-out-of-range",
            ValidationRule::RequiredTags => "required-tags",
            ValidationRule::DuplicateTags => "duplicate-tags",
            ValidationRule::CookingTimeOutOfRange => "cooking-time-out-of-range",
            ValidationRule::InvalidName => "invalid-name",
            ValidationRule::UnknownIngredient => "unknown-ingredient",
            ValidationRule::UnknownTag => "unknown-tag",
        }
    }
}

/// Inclusive `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: i32,
    pub max: i32,
}

impl Bounds {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeLimits {
    pub cooking_time: Bounds,
    pub amount: Bounds,
}

impl Default for RecipeLimits {
    fn default() -> Self {
        Self {
            cooking_time: Bounds::new(MIN_COOKING_TIME, MAX_COOKING_TIME),
            amount: Bounds::new(MIN_INGREDIENT_AMOUNT, MAX_INGREDIENT_AMOUNT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

/// Candidate recipe parsed from a create/update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
}

/// Checks everything that can be decided without the database.
/// Fails on the first violated rule.
pub fn validate_recipe(draft: &RecipeDraft, limits: &RecipeLimits) -> Result<(), ValidationError> {
    if draft.ingredients.is_empty() {
        return Err(ValidationError::new(
            ValidationRule::RequiredIngredients,
            "A recipe needs at least one ingredient",
        ));
    }

    let mut seen = HashSet::with_capacity(draft.ingredients.len());
    for part in draft.ingredients.iter() {
        if !seen.insert(part.id) {
            return Err(ValidationError::new(
                ValidationRule::DuplicateIngredients,
                format!("Ingredient {} is listed more than once", part.id),
            ));
        }
    }

    if let Some(part) = draft
        .ingredients
        .iter()
        .find(|part| !limits.amount.contains(part.amount))
    {
        return Err(ValidationError::new(
            ValidationRule::AmountOutOfRange,
            format!(
                "Amount of ingredient {} must be between {} and {}, got {}",
                part.id, limits.amount.min, limits.amount.max, part.amount
            ),
        ));
    }

    if draft.tags.is_empty() {
        return Err(ValidationError::new(
            ValidationRule::RequiredTags,
            "A recipe needs at least one tag",
        ));
    }

    let mut seen = HashSet::with_capacity(draft.tags.len());
    for tag in draft.tags.iter() {
        if !seen.insert(*tag) {
            return Err(ValidationError::new(
                ValidationRule::DuplicateTags,
                format!("Tag {tag} is listed more than once"),
            ));
        }
    }

    if !limits.cooking_time.contains(draft.cooking_time) {
        return Err(ValidationError::new(
            ValidationRule::CookingTimeOutOfRange,
            format!(
                "Cooking time must be between {} and {}, got {}",
                limits.cooking_time.min, limits.cooking_time.max, draft.cooking_time
            ),
        ));
    }

    let name_length = draft.name.trim().chars().count();
    if name_length == 0 || name_length > RECIPE_NAME_MAX_LENGTH {
        return Err(ValidationError::new(
            ValidationRule::InvalidName,
            format!("Name must be between 1 and {RECIPE_NAME_MAX_LENGTH} characters"),
        ));
    }

    Ok(())
}

/// Checks the draft's references against the ids that exist in storage.
pub fn validate_references(
    draft: &RecipeDraft,
    known_ingredients: &HashSet<Id>,
    known_tags: &HashSet<Id>,
) -> Result<(), ValidationError> {
    if let Some(part) = draft
        .ingredients
        .iter()
        .find(|part| !known_ingredients.contains(&part.id))
    {
        return Err(ValidationError::new(
            ValidationRule::UnknownIngredient,
            format!("No ingredient exists with specified id ({})", part.id),
        ));
    }

    if let Some(tag) = draft.tags.iter().find(|tag| !known_tags.contains(tag)) {
        return Err(ValidationError::new(
            ValidationRule::UnknownTag,
            format!("No tag exists with specified id ({tag})"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: String::from("Borscht"),
            text: String::from("Boil everything."),
            image: None,
            cooking_time: 90,
            tags: vec![1, 2],
            ingredients: vec![
                IngredientAmount { id: 10, amount: 500 },
                IngredientAmount { id: 11, amount: 2 },
            ],
        }
    }

    fn rule_of(draft: &RecipeDraft) -> ValidationRule {
        validate_recipe(draft, &RecipeLimits::default())
            .expect_err("draft should be rejected")
            .rule()
    }

    #[test]
    fn accepts_well_formed_draft() {
        assert!(validate_recipe(&draft(), &RecipeLimits::default()).is_ok());
    }

    #[test]
    fn accepts_bounds_inclusive() {
        let mut d = draft();
        d.cooking_time = 500;
        d.ingredients[0].amount = 1;
        d.ingredients[1].amount = 5000;
        assert!(validate_recipe(&d, &RecipeLimits::default()).is_ok());
    }

    #[test]
    fn rejects_empty_ingredients() {
        let mut d = draft();
        d.ingredients.clear();
        assert_eq!(rule_of(&d), ValidationRule::RequiredIngredients);
    }

    #[test]
    fn rejects_repeated_ingredient() {
        let mut d = draft();
        d.ingredients[1].id = 10;
        assert_eq!(rule_of(&d), ValidationRule::DuplicateIngredients);
    }

    #[test]
    fn rejects_zero_amount() {
        let mut d = draft();
        d.ingredients[0].amount = 0;
        assert_eq!(rule_of(&d), ValidationRule::AmountOutOfRange);
    }

    #[test]
    fn rejects_amount_above_max() {
        let mut d = draft();
        d.ingredients[1].amount = 5001;
        assert_eq!(rule_of(&d), ValidationRule::AmountOutOfRange);
    }

    #[test]
    fn rejects_empty_tags() {
        let mut d = draft();
        d.tags.clear();
        assert_eq!(rule_of(&d), ValidationRule::RequiredTags);
    }

    #[test]
    fn rejects_repeated_tag() {
        let mut d = draft();
        d.tags = vec![3, 3];
        assert_eq!(rule_of(&d), ValidationRule::DuplicateTags);
    }

    #[test]
    fn rejects_zero_cooking_time() {
        let mut d = draft();
        d.cooking_time = 0;
        assert_eq!(rule_of(&d), ValidationRule::CookingTimeOutOfRange);
    }

    #[test]
    fn rejects_blank_name() {
        let mut d = draft();
        d.name = String::from("   ");
        assert_eq!(rule_of(&d), ValidationRule::InvalidName);
    }

    #[test]
    fn rejection_reasons_are_distinct() {
        let mut repeated = draft();
        repeated.ingredients[1].id = 10;
        let mut no_tags = draft();
        no_tags.tags.clear();
        let mut zero_amount = draft();
        zero_amount.ingredients[0].amount = 0;
        let mut zero_time = draft();
        zero_time.cooking_time = 0;

        let rules: HashSet<ValidationRule> = [repeated, no_tags, zero_amount, zero_time]
            .iter()
            .map(rule_of)
            .collect();
        assert_eq!(rules.len(), 4);
    }

    #[test]
    fn respects_configured_limits() {
        let limits = RecipeLimits {
            cooking_time: Bounds::new(5, 10),
            amount: Bounds::new(1, 100),
        };
        let mut d = draft();
        d.cooking_time = 11;
        d.ingredients = vec![IngredientAmount { id: 1, amount: 50 }];
        let err = validate_recipe(&d, &limits).unwrap_err();
        assert_eq!(err.rule(), ValidationRule::CookingTimeOutOfRange);
        assert!(err.to_string().starts_with("cooking-time-out-of-range"));
    }

    #[test]
    fn reports_unknown_references() {
        let d = draft();
        let tags: HashSet<Id> = [1, 2].into_iter().collect();
        let ingredients: HashSet<Id> = [10].into_iter().collect();
        let err = validate_references(&d, &ingredients, &tags).unwrap_err();
        assert_eq!(err.rule(), ValidationRule::UnknownIngredient);

        let ingredients: HashSet<Id> = [10, 11].into_iter().collect();
        let tags: HashSet<Id> = [1].into_iter().collect();
        let err = validate_references(&d, &ingredients, &tags).unwrap_err();
        assert_eq!(err.rule(), ValidationRule::UnknownTag);

        let tags: HashSet<Id> = [1, 2].into_iter().collect();
        assert!(validate_references(&d, &ingredients, &tags).is_ok());
    }
}
