mod common;

use axum::http::StatusCode;
use recipebox::api::recipes::RecipeCountsResponse;
use recipebox::counters::CounterSnapshot;

fn ids(body: &serde_json::Value) -> Vec<&str> {
    body["documents"]
        .as_array()
        .expect("Response should contain documents")
        .iter()
        .filter_map(|d| d["id"].as_str())
        .collect()
}

#[tokio::test]
async fn create_then_fetch_recipe() {
    let env = common::TestEnv::in_memory();
    let server = env.server();

    let id = env.create_recipe(&server, "Ratatouille", 4, true).await;

    let response = server.get(&format!("/api/v1/recipes/{id}")).await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["name"], "Ratatouille");
    assert_eq!(body["category"], "vegetables");
    assert_eq!(body["publishDate"], 1_700_000_000);
    assert_eq!(body["ingredients"][0]["name"], "potatoes");
}

#[tokio::test]
async fn mutations_require_a_valid_token() {
    let env = common::TestEnv::in_memory();
    let server = env.server_permissive();

    let response = server
        .post("/api/v1/recipes")
        .json(&common::recipe_json("Soup", 2, true))
        .await;
    response.assert_status_unauthorized();

    let response = server
        .post("/api/v1/recipes")
        .authorization_bearer("not-a-jwt")
        .json(&common::recipe_json("Soup", 2, true))
        .await;
    response.assert_status_unauthorized();

    let response = server.delete("/api/v1/recipes/anything").await;
    response.assert_status_unauthorized();

    env.wait_for_counters(CounterSnapshot { all: 0, published: 0 })
        .await;
}

#[tokio::test]
async fn invalid_payload_lists_every_missing_field() {
    let env = common::TestEnv::in_memory();
    let server = env.server_permissive();

    let response = server
        .post("/api/v1/recipes")
        .authorization_bearer(env.token())
        .json(&serde_json::json!({
            "name": "Half a recipe",
            "serves": 2,
            "totalTime": 10,
        }))
        .await;
    response.assert_status_bad_request();

    let body: serde_json::Value = response.json();
    let missing: Vec<&str> = body["missing"]
        .as_array()
        .expect("Response should list missing fields")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(
        missing,
        vec![
            "category",
            "directions",
            "isPublished",
            "publishDate",
            "ingredients",
            "imageUrl"
        ]
    );

    // Nothing was written.
    let body: serde_json::Value = server
        .get("/api/v1/recipes")
        .authorization_bearer(env.token())
        .await
        .json();
    assert_eq!(body["documents"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn anonymous_callers_only_see_published_recipes() {
    let env = common::TestEnv::in_memory();
    let server = env.server();

    let published = env.create_recipe(&server, "Published", 2, true).await;
    let draft = env.create_recipe(&server, "Draft", 2, false).await;

    let permissive = env.server_permissive();
    permissive
        .get(&format!("/api/v1/recipes/{draft}"))
        .await
        .assert_status_not_found();
    server
        .get(&format!("/api/v1/recipes/{draft}"))
        .authorization_bearer(env.token())
        .await
        .assert_status_ok();

    env.wait_for_counters(CounterSnapshot { all: 2, published: 1 })
        .await;

    // Asking for drafts explicitly does not help an anonymous caller.
    let body: serde_json::Value = server
        .get("/api/v1/recipes")
        .add_query_param("isPublished", "false")
        .await
        .json();
    assert_eq!(ids(&body), vec![published.as_str()]);
    assert_eq!(body["recipeCount"], 1);

    // An authenticated caller gets exactly what they asked for.
    let body: serde_json::Value = server
        .get("/api/v1/recipes")
        .authorization_bearer(env.token())
        .add_query_param("isPublished", "false")
        .await
        .json();
    assert_eq!(ids(&body), vec![draft.as_str()]);

    let body: serde_json::Value = server
        .get("/api/v1/recipes")
        .authorization_bearer(env.token())
        .await
        .json();
    assert_eq!(body["documents"].as_array().unwrap().len(), 2);
    assert_eq!(body["recipeCount"], 2);
}

#[tokio::test]
async fn anonymous_counts_hide_unpublished_recipes() {
    let env = common::TestEnv::in_memory();
    let server = env.server();

    env.create_recipe(&server, "Published", 2, true).await;
    env.create_recipe(&server, "Draft", 2, false).await;
    env.wait_for_counters(CounterSnapshot { all: 2, published: 1 })
        .await;

    let body: serde_json::Value = server.get("/api/v1/recipe-counts").await.json();
    assert_eq!(body, serde_json::json!({ "published": 1 }));

    let counts: RecipeCountsResponse = server
        .get("/api/v1/recipe-counts")
        .authorization_bearer(env.token())
        .await
        .json();
    assert_eq!(
        counts,
        RecipeCountsResponse {
            all: Some(2),
            published: 1
        }
    );
}

#[tokio::test]
async fn replace_and_delete_keep_counters_in_step() {
    let env = common::TestEnv::in_memory();
    let server = env.server();

    let id = env.create_recipe(&server, "Gratin", 6, false).await;
    env.wait_for_counters(CounterSnapshot { all: 1, published: 0 })
        .await;

    server
        .put(&format!("/api/v1/recipes/{id}"))
        .authorization_bearer(env.token())
        .json(&common::recipe_json("Gratin", 6, true))
        .await
        .assert_status_ok();
    env.wait_for_counters(CounterSnapshot { all: 1, published: 1 })
        .await;

    server
        .delete(&format!("/api/v1/recipes/{id}"))
        .authorization_bearer(env.token())
        .await
        .assert_status(StatusCode::NO_CONTENT);
    env.wait_for_counters(CounterSnapshot { all: 0, published: 0 })
        .await;

    let counts: RecipeCountsResponse = server
        .get("/api/v1/recipe-counts")
        .authorization_bearer(env.token())
        .await
        .json();
    assert_eq!(
        counts,
        RecipeCountsResponse {
            all: Some(0),
            published: 0
        }
    );
}

#[tokio::test]
async fn missing_recipes_are_not_found() {
    let env = common::TestEnv::in_memory();
    let server = env.server_permissive();

    server
        .get("/api/v1/recipes/nope")
        .await
        .assert_status_not_found();
    server
        .put("/api/v1/recipes/nope")
        .authorization_bearer(env.token())
        .json(&common::recipe_json("Ghost", 1, true))
        .await
        .assert_status_not_found();
    server
        .delete("/api/v1/recipes/nope")
        .authorization_bearer(env.token())
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn listing_rejects_malformed_parameters() {
    let env = common::TestEnv::in_memory();
    let server = env.server_permissive();

    for (key, value) in [
        ("perPage", "0"),
        ("pageNumber", "0"),
        ("category", "soups"),
        ("serves", "many"),
        ("orderByField", "calories"),
        ("isPublished", "maybe"),
    ] {
        let response = server.get("/api/v1/recipes").add_query_param(key, value).await;
        response.assert_status_bad_request();
    }

    let response = server
        .get("/api/v1/recipes")
        .add_query_param("pageNumber", 2)
        .add_query_param("cursorId", "abc")
        .await;
    response.assert_status_bad_request();
}
