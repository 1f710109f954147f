//! Role aggregation over the active authorizer set.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::auth::backend::User;
use crate::auth::domain::AuthorizerDomain;

/// Collect roles for `user` from `authorizers`, in order.
///
/// A failing authorizer is logged and skipped. With `multi_rolespan` the
/// roles of every successful authorizer are unioned; without it the first
/// successful authorizer wins and the rest are not asked.
pub fn aggregate_roles(
    authorizers: &[Arc<AuthorizerDomain>],
    user: &User,
    multi_rolespan: bool,
) -> BTreeSet<String> {
    let mut roles = BTreeSet::new();

    for authorizer in authorizers {
        match authorizer.backend().authorize(user) {
            Ok(found) => {
                tracing::debug!(
                    authorizer = %authorizer.name(),
                    user = %user.name,
                    roles = found.len(),
                    "Authorizer resolved roles"
                );
                roles.extend(found);
                if !multi_rolespan {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(
                    authorizer = %authorizer.name(),
                    user = %user.name,
                    error = %e,
                    "Authorizer failed, excluding it from role aggregation"
                );
            }
        }
    }

    roles
}
