use chrono::{Duration, Utc};

use crate::auth::models::Caller;
use crate::db::repository::RecipeRepository;
use crate::error::AppError;
use crate::models::recipe::{Category, Ingredient, NewRecipe};
use crate::query::builder::QueryBuilder;

fn ingredient(amount: &str, unit: &str, name: &str) -> Ingredient {
    Ingredient {
        amount: amount.to_string(),
        unit: unit.to_string(),
        name: name.to_string(),
    }
}

fn demo_recipes() -> Vec<NewRecipe> {
    let now = Utc::now();
    vec![
        NewRecipe {
            name: "Shakshuka".to_string(),
            category: Category::EggsBreakfast,
            directions: "Simmer the tomatoes with the spices, crack in the eggs and cover until set.".to_string(),
            serves: 2,
            total_time: 25,
            publish_date: now - Duration::days(10),
            is_published: true,
            ingredients: vec![
                ingredient("4", "", "eggs"),
                ingredient("400", "g", "crushed tomatoes"),
                ingredient("1", "tsp", "cumin"),
            ],
            image_url: String::new(),
        },
        NewRecipe {
            name: "Focaccia".to_string(),
            category: Category::BreadsSandwichesPizza,
            directions: "Mix, rest overnight, dimple with olive oil and bake at 230C for 20 minutes.".to_string(),
            serves: 8,
            total_time: 90,
            publish_date: now - Duration::days(3),
            is_published: true,
            ingredients: vec![
                ingredient("500", "g", "flour"),
                ingredient("400", "ml", "water"),
                ingredient("10", "g", "salt"),
            ],
            image_url: String::new(),
        },
        NewRecipe {
            name: "Roasted Cauliflower".to_string(),
            category: Category::Vegetables,
            directions: "Toss the florets in oil and roast until the edges char.".to_string(),
            serves: 4,
            total_time: 40,
            publish_date: now - Duration::days(1),
            is_published: true,
            ingredients: vec![
                ingredient("1", "head", "cauliflower"),
                ingredient("3", "tbsp", "olive oil"),
            ],
            image_url: String::new(),
        },
        NewRecipe {
            name: "Salmon en Papillote".to_string(),
            category: Category::FishSeafood,
            directions: "Seal the fillets in parchment with lemon and herbs, bake for 15 minutes.".to_string(),
            serves: 2,
            total_time: 30,
            publish_date: now + Duration::days(7),
            is_published: false,
            ingredients: vec![
                ingredient("2", "", "salmon fillets"),
                ingredient("1", "", "lemon"),
            ],
            image_url: String::new(),
        },
    ]
}

/// Insert a handful of sample recipes unless the collection already has some.
///
/// Returns the number of recipes inserted.
pub async fn seed_demo_data(repo: &dyn RecipeRepository) -> Result<usize, AppError> {
    let seeder = Caller::service("demo-seeder");
    let probe = QueryBuilder::new().page_size(1).build(&seeder)?;
    if !repo.query(&probe).await?.is_empty() {
        tracing::info!("Recipes already present, skipping demo seeding.");
        return Ok(0);
    }

    let mut inserted = 0;
    for recipe in demo_recipes() {
        let name = recipe.name.clone();
        match repo.insert(recipe).await {
            Ok(created) => {
                tracing::info!(recipe = %created.id, "Seeded demo recipe '{}'", name);
                inserted += 1;
            }
            Err(e) => tracing::error!("Failed to seed demo recipe '{}': {}", name, e),
        }
    }

    tracing::info!("Demo data seeding completed.");
    Ok(inserted)
}
