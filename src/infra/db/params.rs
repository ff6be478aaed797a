use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::{
    application::repos::{ParamsRepo, RepoError},
    domain::params::{PageId, ParameterSet},
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl ParamsRepo for PostgresRepositories {
    async fn load_params(&self, page_id: PageId) -> Result<ParameterSet, RepoError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT param_name
            FROM page_request_params
            WHERE page_id = $1
            "#,
        )
        .bind(page_id.get())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(names.into_iter().collect())
    }

    async fn replace_params(
        &self,
        page_id: PageId,
        params: &ParameterSet,
    ) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM page_request_params WHERE page_id = $1")
            .bind(page_id.get())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if !params.is_empty() {
            let mut qb =
                QueryBuilder::<Postgres>::new("INSERT INTO page_request_params (page_id, param_name) ");
            qb.push_values(params.iter(), |mut row, name| {
                row.push_bind(page_id.get()).push_bind(name.to_string());
            });
            qb.build().execute(&mut *tx).await.map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
