use std::collections::HashMap;

use crate::schema::CartIngredientRow;

/*
Shopping list export

*** Salt (g) -- 25
*** Potato (pcs) -- 4

One line per ingredient name. The unit of the first row seen for a name is
kept, later rows only add their amount.
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListEntry {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

pub fn aggregate(rows: &[CartIngredientRow]) -> Vec<ShoppingListEntry> {
    let mut entries: Vec<ShoppingListEntry> = vec![];
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows.iter() {
        match index.get(row.name.as_str()) {
            Some(&i) => {
                let entry = &mut entries[i];
                if entry.measurement_unit != row.measurement_unit {
                    log::warn!(
                        "Ingredient {:?} appears as both {:?} and {:?}; summing as {:?}",
                        row.name,
                        entry.measurement_unit,
                        row.measurement_unit,
                        entry.measurement_unit
                    );
                }
                entry.amount += i64::from(row.amount);
            }
            None => {
                index.insert(row.name.as_str(), entries.len());
                entries.push(ShoppingListEntry {
                    name: row.name.to_owned(),
                    measurement_unit: row.measurement_unit.to_owned(),
                    amount: i64::from(row.amount),
                });
            }
        }
    }

    entries
}

pub fn render(entries: &[ShoppingListEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            format!(
                "*** {} ({}) -- {}\n",
                entry.name, entry.measurement_unit, entry.amount
            )
        })
        .collect()
}

pub fn shopping_list_text(rows: &[CartIngredientRow]) -> String {
    render(&aggregate(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> CartIngredientRow {
        CartIngredientRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn empty_cart_is_empty_string() {
        assert_eq!(shopping_list_text(&[]), "");
    }

    #[test]
    fn sums_same_ingredient_across_recipes() {
        let rows = vec![row("Salt", "g", 10), row("Salt", "g", 15)];
        assert_eq!(shopping_list_text(&rows), "*** Salt (g) -- 25\n");
    }

    #[test]
    fn keeps_first_seen_order() {
        let rows = vec![
            row("Potato", "pcs", 3),
            row("Salt", "g", 5),
            row("Dill", "bunch", 1),
            row("Salt", "g", 5),
            row("Potato", "pcs", 1),
        ];
        assert_eq!(
            shopping_list_text(&rows),
            "*** Potato (pcs) -- 4\n*** Salt (g) -- 10\n*** Dill (bunch) -- 1\n"
        );
    }

    #[test]
    fn one_line_per_name_with_exact_sums() {
        let rows: Vec<CartIngredientRow> = (0..300)
            .map(|i| row(["Flour", "Milk", "Egg"][i % 3], "g", (i as i32) % 17 + 1))
            .collect();
        let entries = aggregate(&rows);

        assert_eq!(entries.len(), 3);
        for entry in entries.iter() {
            let expected: i64 = rows
                .iter()
                .filter(|r| r.name == entry.name)
                .map(|r| i64::from(r.amount))
                .sum();
            assert_eq!(entry.amount, expected);
        }
    }

    #[test]
    fn output_is_deterministic() {
        let rows = vec![
            row("Rice", "g", 200),
            row("Soy sauce", "ml", 30),
            row("Rice", "g", 100),
        ];
        assert_eq!(shopping_list_text(&rows), shopping_list_text(&rows));
    }

    #[test]
    fn mismatched_unit_keeps_first() {
        let rows = vec![row("Sugar", "g", 100), row("Sugar", "tbsp", 2)];
        assert_eq!(shopping_list_text(&rows), "*** Sugar (g) -- 102\n");
    }

    #[test]
    fn large_amounts_do_not_overflow() {
        let rows: Vec<CartIngredientRow> =
            (0..1000).map(|_| row("Water", "ml", i32::MAX)).collect();
        let entries = aggregate(&rows);
        assert_eq!(entries[0].amount, i64::from(i32::MAX) * 1000);
    }
}
