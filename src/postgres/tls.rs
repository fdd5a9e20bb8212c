// ABOUTME: Maps the configured sslmode onto tokio-postgres and native-tls settings
// ABOUTME: Certificate checks follow libpq: only verify-ca and verify-full verify

use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;

use crate::config::{CredentialTemplate, SslMode};

pub fn pg_config(template: &CredentialTemplate) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&template.host)
        .port(template.port)
        .user(&template.user)
        .dbname(&template.dbname)
        .application_name(env!("CARGO_PKG_NAME"))
        .ssl_mode(driver_ssl_mode(template.sslmode));
    if !template.password.is_empty() {
        config.password(&template.password);
    }
    config
}

fn driver_ssl_mode(mode: SslMode) -> tokio_postgres::config::SslMode {
    use tokio_postgres::config::SslMode as Driver;
    match mode {
        SslMode::Disable => Driver::Disable,
        SslMode::Allow | SslMode::Prefer => Driver::Prefer,
        SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => Driver::Require,
    }
}

pub fn make_connector(mode: SslMode) -> Result<MakeTlsConnector, native_tls::Error> {
    let mut builder = TlsConnector::builder();
    match mode {
        SslMode::VerifyFull => {}
        SslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::Disable | SslMode::Allow | SslMode::Prefer | SslMode::Require => {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
    }
    Ok(MakeTlsConnector::new(builder.build()?))
}
