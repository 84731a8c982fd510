pub mod models;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
    sea_query::Index,
};
use std::time::Duration;
use tracing::{info, instrument};

use models::proposal;

pub const PROPOSAL_KEY_INDEX: &str = "proposal_title_protocol_key";

/// Opens a connection pool against `database_url`.
#[instrument(skip(database_url))]
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(15))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(5 * 60))
        .max_lifetime(Duration::from_secs(30 * 60))
        .sqlx_logging(false);

    Database::connect(opt).await
}

/// Creates the `proposal` table and its `(title, protocol)` unique index when missing.
///
/// Upserts rely on that index to turn a repeated insert into a no-op.
#[instrument(skip(db))]
pub async fn ensure_schema<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(proposal::Entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    let index = Index::create()
        .if_not_exists()
        .name(PROPOSAL_KEY_INDEX)
        .table(proposal::Entity)
        .col(proposal::Column::Title)
        .col(proposal::Column::Protocol)
        .unique()
        .to_owned();
    db.execute(backend.build(&index)).await?;

    info!("Proposal schema ready");
    Ok(())
}
