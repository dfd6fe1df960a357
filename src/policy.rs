// src/policy.rs

//! Read gating for profiles and posts.

use crate::models::user::{Privacy, User};

/// The authenticated account performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub id: i64,
    pub is_staff: bool,
}

/// Fields of the target account that visibility depends on.
#[derive(Debug, Clone, Copy)]
pub struct Audience {
    pub id: i64,
    pub privacy: Privacy,
    pub is_active: bool,
    pub is_staff: bool,
}

impl From<&User> for Audience {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            privacy: user.privacy,
            is_active: user.is_active,
            is_staff: user.is_staff,
        }
    }
}

/// Decides whether `viewer` may read `target`'s profile and posts.
///
/// Anonymous viewers (`None`) have no follow edges and only see public
/// accounts. Inactive accounts are hidden from everyone but themselves and
/// staff; privacy still applies to staff.
pub fn can_view(viewer: Option<&Viewer>, target: &Audience, viewer_follows_target: bool) -> bool {
    if viewer.is_some_and(|v| v.id == target.id) {
        return true;
    }

    let target_active = target.is_active || target.is_staff;
    if !target_active && !viewer.is_some_and(|v| v.is_staff) {
        return false;
    }

    match target.privacy {
        Privacy::Public => true,
        Privacy::Private => false,
        Privacy::FollowersOnly => viewer.is_some() && viewer_follows_target,
    }
}

/// SQL counterpart of [`can_view`] for listings.
///
/// Expects the author row aliased as `u`, the viewer id bound as `$1`
/// (NULL for anonymous) and the viewer's staff flag bound as `$2`.
pub const VISIBLE_AUTHOR_SQL: &str = r#"
    (u.id = $1 OR (
        (u.is_active = 1 OR u.is_staff = 1 OR $2 = 1)
        AND (
            u.privacy = 'public'
            OR (u.privacy = 'followers_only' AND EXISTS (
                SELECT 1 FROM follows vf
                WHERE vf.follower_id = $1 AND vf.following_id = u.id
            ))
        )
    ))
"#;

/// Splits an optional viewer into the two bind values `VISIBLE_AUTHOR_SQL` expects.
pub fn viewer_binds(viewer: Option<&Viewer>) -> (Option<i64>, bool) {
    (viewer.map(|v| v.id), viewer.is_some_and(|v| v.is_staff))
}
