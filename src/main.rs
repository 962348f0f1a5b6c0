use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;

use lead_crm::api::{AppState, build_router};
use lead_crm::auth::AdminAuth;
use lead_crm::booking::CalendlyClient;
use lead_crm::config::{AppConfig, MailConfig};
use lead_crm::leads::LeadService;
use lead_crm::mail::build_mailer;
use lead_crm::store::{Database, LibSqlBackend};
use lead_crm::worker::{ReminderWorker, spawn_reminder_worker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lead-crm.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    if config.admin.uses_default_password() {
        tracing::warn!("ADMIN_PASSWORD not set, using the built-in default");
    }

    eprintln!("📇 Lead CRM v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   HTTP: http://0.0.0.0:{}", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.database_path)
            .await
            .with_context(|| {
                format!("Failed to open database at {}", config.database_path.display())
            })?,
    );
    eprintln!("   Database: {}", config.database_path.display());

    // ── Mail ─────────────────────────────────────────────────────────────
    let mailer = build_mailer(&config.mail);
    eprintln!(
        "   Mail: {}",
        match &config.mail {
            MailConfig::OneSignal { .. } => "OneSignal".to_string(),
            MailConfig::Smtp(smtp) => format!("SMTP ({}:{})", smtp.host, smtp.port),
            MailConfig::Log => "log only (not delivered)".to_string(),
        }
    );

    // ── Lead service ─────────────────────────────────────────────────────
    let mut leads = LeadService::new(Arc::clone(&db), Arc::clone(&mailer), config.links.clone());
    match &config.scheduler {
        Some(scheduler) => {
            leads = leads.with_event_lookup(Arc::new(CalendlyClient::new(scheduler)));
            eprintln!("   Calendly lookups: enabled ({})", scheduler.api_base);
        }
        None => eprintln!("   Calendly lookups: disabled (no CALENDLY_PERSONAL_TOKEN)"),
    }

    // ── Reminder worker ──────────────────────────────────────────────────
    let _reminder_handle = if config.reminder.enabled {
        let worker = Arc::new(ReminderWorker::new(
            Arc::clone(&db),
            Arc::clone(&mailer),
            config.links.clone(),
            config.reminder.clone(),
        ));
        let handle = spawn_reminder_worker(worker, &config.reminder.schedule)?;
        eprintln!(
            "   Reminders: enabled (schedule \"{}\", after {}h, max {} concurrent)",
            config.reminder.schedule,
            config.reminder.delay.num_hours(),
            config.reminder.max_concurrent,
        );
        Some(handle)
    } else {
        eprintln!("   Reminders: disabled");
        None
    };

    // ── HTTP ─────────────────────────────────────────────────────────────
    let state = AppState {
        leads: Arc::new(leads),
        auth: Arc::new(AdminAuth::new(Arc::clone(&db), config.admin.clone())),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
