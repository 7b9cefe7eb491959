mod cli;
mod infra;
mod routes;
mod server;

use school_records::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
