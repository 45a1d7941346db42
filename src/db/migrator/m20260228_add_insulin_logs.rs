use crate::entities::insulin_logs;
use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(InsulinLogs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // The history endpoint always reads newest-first per user.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_insulin_logs_user_timestamp")
                    .table(InsulinLogs)
                    .col(insulin_logs::Column::UserId)
                    .col(insulin_logs::Column::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InsulinLogs).to_owned())
            .await?;

        Ok(())
    }
}
