//! Database migrations.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_suspension_table;
mod m20250101_000003_create_warning_table;
mod m20250101_000004_create_report_table;
mod m20250101_000005_create_content_filter_rule_table;
mod m20250101_000006_create_moderation_log_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_suspension_table::Migration),
            Box::new(m20250101_000003_create_warning_table::Migration),
            Box::new(m20250101_000004_create_report_table::Migration),
            Box::new(m20250101_000005_create_content_filter_rule_table::Migration),
            Box::new(m20250101_000006_create_moderation_log_table::Migration),
        ]
    }
}
