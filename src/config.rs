use std::env;

use crate::services::availability::ClinicHours;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub mail_relay_url: String,
    pub mail_relay_key: String,
    pub mail_sender: String,
    pub clinic_hours: ClinicHours,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = ClinicHours::default();
        Self {
            port: parse_var("PORT").unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "dentbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            mail_relay_url: env::var("MAIL_RELAY_URL").unwrap_or_default(),
            mail_relay_key: env::var("MAIL_RELAY_KEY").unwrap_or_default(),
            mail_sender: env::var("MAIL_SENDER")
                .unwrap_or_else(|_| "citas@clinica.local".to_string()),
            clinic_hours: ClinicHours {
                opens: parse_var("CLINIC_OPENS").unwrap_or(defaults.opens),
                closes: parse_var("CLINIC_CLOSES").unwrap_or(defaults.closes),
                step_minutes: parse_var("SLOT_STEP_MINUTES").unwrap_or(defaults.step_minutes),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
