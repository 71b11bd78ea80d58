use serde::Deserialize;
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{json, with_status},
    Filter, Reply,
};

use crate::{
    actions::{create_ingredient, get_ingredient, search_ingredients},
    error::reject,
    form::Form,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::Id,
};

use super::{with_form, with_state, AppState};

#[derive(Debug, Deserialize)]
struct IngredientQuery {
    name: Option<String>,
}

pub(super) fn routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let search = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<IngredientQuery>())
        .and(with_state(state.clone()))
        .and_then(handle_search);

    let detail = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_get_ingredient);

    let create = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(state.jwt_secret.clone()))
        .and(with_form())
        .and(with_state(state))
        .and_then(handle_create_ingredient);

    search.or(detail).or(create)
}

async fn handle_search(query: IngredientQuery, state: AppState) -> Result<impl Reply, Rejection> {
    let ingredients = search_ingredients(query.name.as_deref(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&ingredients))
}

async fn handle_get_ingredient(id: Id, state: AppState) -> Result<impl Reply, Rejection> {
    let ingredient = get_ingredient(id, &state.pool).await.map_err(reject)?;
    Ok(json(&ingredient))
}

async fn handle_create_ingredient(
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::CreateIngredients)
        .map_err(reject)?;

    let name = form.get_str("name").map_err(|e| reject(e.into()))?;
    let measurement_unit = form
        .get_str("measurement_unit")
        .map_err(|e| reject(e.into()))?;

    let ingredient = create_ingredient(&name, &measurement_unit, &state.pool)
        .await
        .map_err(reject)?;

    Ok(with_status(json(&ingredient), StatusCode::CREATED))
}
