use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{json, with_header, with_status},
    Filter, Reply,
};

use crate::{
    actions::{
        add_to_list, create_recipe, delete_recipe, download_shopping_cart, fetch_recipes,
        get_recipe_detail, remove_from_list, update_recipe, RecipeFilter, RecipeList,
    },
    constants::{RECIPE_COUNT_PER_PAGE, SHOPPING_CART_FILENAME},
    error::{reject, TypeError},
    form::Form,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::Page,
    schema::Id,
    validation::RecipeDraft,
};

use super::{with_form, with_state, AppState};

fn parse_flag(key: &str, value: &str) -> Result<bool, TypeError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(TypeError::new(&format!("Invalid value for {key}: {value}"))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<i64, TypeError> {
    value
        .trim()
        .parse()
        .map_err(|_| TypeError::new(&format!("Invalid value for {key}: {value}")))
}

/// Reads the listing query. `tags` may repeat; unknown keys are ignored.
fn parse_recipe_query(pairs: &[(String, String)]) -> Result<(RecipeFilter, Page), TypeError> {
    let mut filter = RecipeFilter::default();
    let mut page = None;
    let mut limit = None;

    for (key, value) in pairs {
        match key.as_str() {
            "author" => {
                let author = parse_number(key, value)?;
                let author = Id::try_from(author)
                    .map_err(|_| TypeError::new(&format!("Invalid value for author: {value}")))?;
                filter.author = Some(author);
            }
            "tags" => {
                if !value.trim().is_empty() {
                    filter.tags.push(value.trim().to_string());
                }
            }
            "is_favorited" => filter.is_favorited = Some(parse_flag(key, value)?),
            "is_in_shopping_cart" => filter.is_in_shopping_cart = Some(parse_flag(key, value)?),
            "page" => page = Some(parse_number(key, value)?),
            "limit" => limit = Some(parse_number(key, value)?),
            _ => {}
        }
    }

    Ok((filter, Page::new(page, limit, RECIPE_COUNT_PER_PAGE)))
}

pub(super) fn routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let secret = state.jwt_secret.clone();

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(handle_create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_download_shopping_cart);

    let detail = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_get_recipe);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(handle_update_recipe);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_delete_recipe);

    let favorite = warp::path!("recipes" / Id / "favorite")
        .map(|id: Id| (id, RecipeList::Favorites))
        .untuple_one();
    let shopping_cart = warp::path!("recipes" / Id / "shopping_cart")
        .map(|id: Id| (id, RecipeList::ShoppingCart))
        .untuple_one();
    let recipe_list = favorite.or(shopping_cart).unify();

    let add = recipe_list
        .clone()
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_add_to_list);

    let remove = recipe_list
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_state(state))
        .and_then(handle_remove_from_list);

    list.or(create)
        .or(download)
        .or(detail)
        .or(update)
        .or(delete)
        .or(add)
        .or(remove)
}

async fn handle_list_recipes(
    query: Vec<(String, String)>,
    viewer: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let (filter, page) = parse_recipe_query(&query).map_err(|e| reject(e.into()))?;
    let recipes = fetch_recipes(&filter, page, viewer.as_ref(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&recipes))
}

async fn handle_create_recipe(
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let draft = RecipeDraft::try_from(&form).map_err(|e| reject(e.into()))?;
    let id = create_recipe(&session, &draft, &state.limits, &state.pool)
        .await
        .map_err(reject)?;

    let recipe = get_recipe_detail(id, Some(&session), &state.pool)
        .await
        .map_err(reject)?;

    Ok(with_status(json(&recipe), StatusCode::CREATED))
}

async fn handle_get_recipe(
    id: Id,
    viewer: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let recipe = get_recipe_detail(id, viewer.as_ref(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&recipe))
}

async fn handle_update_recipe(
    id: Id,
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let draft = RecipeDraft::try_from(&form).map_err(|e| reject(e.into()))?;
    update_recipe(id, &session, &draft, &state.limits, &state.pool)
        .await
        .map_err(reject)?;

    let recipe = get_recipe_detail(id, Some(&session), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&recipe))
}

async fn handle_delete_recipe(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    delete_recipe(id, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(with_status(warp::reply(), StatusCode::NO_CONTENT))
}

async fn handle_add_to_list(
    id: Id,
    list: RecipeList,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let recipe = add_to_list(list, id, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(with_status(json(&recipe), StatusCode::CREATED))
}

async fn handle_remove_from_list(
    id: Id,
    list: RecipeList,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    remove_from_list(list, id, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(with_status(warp::reply(), StatusCode::NO_CONTENT))
}

async fn handle_download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let text = download_shopping_cart(&session, &state.pool)
        .await
        .map_err(reject)?;

    let reply = with_header(text, "Content-Type", "text/plain; charset=UTF-8");
    Ok(with_header(
        reply,
        "Content-Disposition",
        format!("attachment; filename={SHOPPING_CART_FILENAME}"),
    ))
}
