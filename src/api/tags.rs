use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{json, with_status},
    Filter, Reply,
};

use crate::{
    actions::{create_tag, get_tag, list_tags},
    error::reject,
    form::Form,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::Id,
};

use super::{with_form, with_state, AppState};

pub(super) fn routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_list_tags);

    let detail = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_get_tag);

    let create = warp::path!("tags")
        .and(warp::post())
        .and(with_session(state.jwt_secret.clone()))
        .and(with_form())
        .and(with_state(state))
        .and_then(handle_create_tag);

    list.or(detail).or(create)
}

async fn handle_list_tags(state: AppState) -> Result<impl Reply, Rejection> {
    let tags = list_tags(&state.pool).await.map_err(reject)?;
    Ok(json(&tags))
}

async fn handle_get_tag(id: Id, state: AppState) -> Result<impl Reply, Rejection> {
    let tag = get_tag(id, &state.pool).await.map_err(reject)?;
    Ok(json(&tag))
}

async fn handle_create_tag(
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::CreateTags)
        .map_err(reject)?;

    let name = form.get_str("name").map_err(|e| reject(e.into()))?;
    let color = form.get_str("color").map_err(|e| reject(e.into()))?;
    let slug = form.get_str("slug").map_err(|e| reject(e.into()))?;

    let tag = create_tag(name.trim(), color.trim(), slug.trim(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(with_status(json(&tag), StatusCode::CREATED))
}
