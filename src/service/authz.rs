use crate::db::models::{DbComment, DbPost, DbUser, UserId};

/// Whether `actor` is the owner recorded on a resource.
pub fn owns(actor: &DbUser, owner_id: UserId) -> bool {
    actor.id == owner_id
}

/// Only the author may edit or delete a post.
pub fn can_modify_post(actor: &DbUser, post: &DbPost) -> bool {
    owns(actor, post.user_id)
}

/// A comment may be removed by whoever wrote it or by the owner of the post
/// it sits under.
pub fn can_delete_comment(actor: &DbUser, comment: &DbComment, post: &DbPost) -> bool {
    owns(actor, comment.user_id) || owns(actor, post.user_id)
}
