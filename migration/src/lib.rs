//! Database migrations for the ReactShare service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_01_10_090000_create_social_accounts;
mod m2025_01_10_090100_create_folders;
mod m2025_01_10_090200_create_source_videos;
mod m2025_01_10_090300_create_reactions;
mod m2025_01_10_090400_create_social_shares;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_10_090000_create_social_accounts::Migration),
            Box::new(m2025_01_10_090100_create_folders::Migration),
            Box::new(m2025_01_10_090200_create_source_videos::Migration),
            Box::new(m2025_01_10_090300_create_reactions::Migration),
            Box::new(m2025_01_10_090400_create_social_shares::Migration),
        ]
    }
}
