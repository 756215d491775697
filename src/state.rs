use crate::config::AppConfig;
use crate::services::scheduling::AppointmentLifecycle;

pub struct AppState {
    pub config: AppConfig,
    pub appointments: AppointmentLifecycle,
}
