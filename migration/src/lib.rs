pub use sea_orm_migration::prelude::*;

mod m20261015_000001_create_polls;
mod m20261015_000002_create_votes;
mod m20261015_000003_create_likes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261015_000001_create_polls::Migration),
            Box::new(m20261015_000002_create_votes::Migration),
            Box::new(m20261015_000003_create_likes::Migration),
        ]
    }
}
