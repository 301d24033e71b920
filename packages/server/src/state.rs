use std::sync::Arc;

use common::storage::BinaryStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::mail::Mailer;
use crate::media::probe::DurationProber;
use crate::pipeline::staging::Staging;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn BinaryStore>,
    pub mailer: Arc<dyn Mailer>,
    pub prober: Arc<dyn DurationProber>,
    pub staging: Staging,
}
