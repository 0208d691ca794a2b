use async_trait::async_trait;

use super::{Id, model::UserInfo};

#[async_trait]
pub trait UserRepository {
    /// Unknown ids are skipped rather than reported.
    async fn find_by_ids(&self, ids: &[Id]) -> super::Result<Vec<UserInfo>>;
}
