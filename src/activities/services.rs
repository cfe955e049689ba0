use tracing::{info, warn};
use uuid::Uuid;

use super::dto::NewActivity;
use crate::{
    db::{Activity, User, UserStore},
    error::AppError,
};

/// Loads the document holding `activity_id` and checks it belongs to
/// `requester`.
async fn owning_document(
    store: &dyn UserStore,
    requester: &User,
    activity_id: Uuid,
) -> Result<User, AppError> {
    let owner = store
        .find_by_activity(activity_id)
        .await?
        .ok_or(AppError::NotFound("Activity"))?;
    if owner.id != requester.id {
        warn!(requester = %requester.id, owner = %owner.id, %activity_id, "activity owned by another user");
        return Err(AppError::Forbidden);
    }
    Ok(owner)
}

/// Appends to `user` and saves the whole document.
pub async fn create(
    store: &dyn UserStore,
    user: &mut User,
    new: NewActivity,
) -> Result<Activity, AppError> {
    let activity = user.add_activity(new.name, new.date).clone();
    store.save(user).await?;
    info!(user_id = %user.id, activity_id = %activity.id, "activity added");
    Ok(activity)
}

pub async fn fetch(
    store: &dyn UserStore,
    requester: &User,
    activity_id: Uuid,
) -> Result<Activity, AppError> {
    let owner = owning_document(store, requester, activity_id).await?;
    owner
        .activity(activity_id)
        .cloned()
        .ok_or(AppError::NotFound("Activity"))
}

pub async fn rename(
    store: &dyn UserStore,
    requester: &User,
    activity_id: Uuid,
    name: String,
) -> Result<Activity, AppError> {
    let mut owner = owning_document(store, requester, activity_id).await?;
    let activity = owner
        .rename_activity(activity_id, name)
        .cloned()
        .ok_or(AppError::NotFound("Activity"))?;
    store.save(&owner).await?;
    info!(user_id = %owner.id, %activity_id, "activity renamed");
    Ok(activity)
}

pub async fn delete(
    store: &dyn UserStore,
    requester: &User,
    activity_id: Uuid,
) -> Result<Activity, AppError> {
    let mut owner = owning_document(store, requester, activity_id).await?;
    let removed = owner
        .remove_activity(activity_id)
        .ok_or(AppError::NotFound("Activity"))?;
    store.save(&owner).await?;
    info!(user_id = %owner.id, %activity_id, "activity deleted");
    Ok(removed)
}
