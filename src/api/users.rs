use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{json, with_status},
    Filter, Reply,
};

use crate::{
    actions::{
        delete_user, fetch_subscriptions, fetch_users, get_user_profile, login_user, register_user,
        subscribe, unsubscribe, update_user, NewUser, UserUpdate,
    },
    constants::USER_COUNT_PER_PAGE,
    error::{reject, TypeError},
    form::Form,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::Page,
    schema::{Id, UserProfile, UserRole},
};

use super::{with_form, with_state, AppState, PageQuery};

#[derive(Debug, Deserialize)]
struct SubscriptionQuery {
    page: Option<i64>,
    limit: Option<i64>,
    recipes_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RecipesLimitQuery {
    recipes_limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    auth_token: String,
}

/// `recipes_limit` below zero reads as zero.
fn recipes_limit(limit: Option<i64>) -> Option<i64> {
    limit.map(|limit| limit.max(0))
}

pub(super) fn routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let secret = state.jwt_secret.clone();

    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(handle_login);

    let list = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_list_users);

    let register = warp::path!("users")
        .and(warp::post())
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(handle_register);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_me);

    let update_me = warp::path!("users" / "me")
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(handle_update_me);

    let delete_me = warp::path!("users" / "me")
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_delete_me);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<SubscriptionQuery>())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_subscriptions);

    let profile = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_profile);

    let subscribe_route = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(warp::query::<RecipesLimitQuery>())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_subscribe);

    let unsubscribe_route = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_state(state))
        .and_then(handle_unsubscribe);

    login
        .or(list)
        .or(register)
        .or(me)
        .or(update_me)
        .or(delete_me)
        .or(subscriptions)
        .or(profile)
        .or(subscribe_route)
        .or(unsubscribe_route)
}

async fn handle_login(form: Form, state: AppState) -> Result<impl Reply, Rejection> {
    let username = form.get_str("username").map_err(|e| reject(e.into()))?;
    let password = form.get_str("password").map_err(|e| reject(e.into()))?;

    let auth_token = login_user(
        &username,
        &password,
        &state.jwt_secret,
        state.session_ttl_hours,
        &state.pool,
    )
    .await
    .map_err(reject)?;

    Ok(json(&TokenResponse { auth_token }))
}

async fn handle_list_users(
    query: PageQuery,
    viewer: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let page = Page::new(query.page, query.limit, USER_COUNT_PER_PAGE);
    let users = fetch_users(page, viewer.as_ref(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&users))
}

async fn handle_register(form: Form, state: AppState) -> Result<impl Reply, Rejection> {
    let user = NewUser::try_from(&form).map_err(|e: TypeError| reject(e.into()))?;
    let user = register_user(&user, UserRole::User, &state.pool)
        .await
        .map_err(reject)?;

    Ok(with_status(
        json(&UserProfile::from_user(user, false)),
        StatusCode::CREATED,
    ))
}

async fn handle_me(session: SessionData, state: AppState) -> Result<impl Reply, Rejection> {
    let profile = get_user_profile(session.user_id, Some(&session), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&profile))
}

async fn handle_update_me(
    session: SessionData,
    form: Form,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let update = UserUpdate::try_from(&form).map_err(|e| reject(e.into()))?;
    let user = update_user(&session, &update, &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&UserProfile::from_user(user, false)))
}

async fn handle_delete_me(session: SessionData, state: AppState) -> Result<impl Reply, Rejection> {
    delete_user(&session, &state.pool).await.map_err(reject)?;

    Ok(with_status(warp::reply(), StatusCode::NO_CONTENT))
}

async fn handle_subscriptions(
    query: SubscriptionQuery,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let page = Page::new(query.page, query.limit, USER_COUNT_PER_PAGE);
    let authors = fetch_subscriptions(
        &session,
        page,
        recipes_limit(query.recipes_limit),
        &state.pool,
    )
    .await
    .map_err(reject)?;

    Ok(json(&authors))
}

async fn handle_profile(
    id: Id,
    viewer: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let profile = get_user_profile(id, viewer.as_ref(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&profile))
}

async fn handle_subscribe(
    id: Id,
    query: RecipesLimitQuery,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let author = subscribe(
        &session,
        id,
        recipes_limit(query.recipes_limit),
        &state.pool,
    )
    .await
    .map_err(reject)?;

    Ok(with_status(json(&author), StatusCode::CREATED))
}

async fn handle_unsubscribe(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    unsubscribe(&session, id, &state.pool)
        .await
        .map_err(reject)?;

    Ok(with_status(warp::reply(), StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_negative_recipes_limit() {
        assert_eq!(recipes_limit(Some(-3)), Some(0));
        assert_eq!(recipes_limit(Some(2)), Some(2));
        assert_eq!(recipes_limit(None), None);
    }
}
