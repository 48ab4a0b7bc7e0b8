use clap::Parser;
use driptrap::dashboard::{self, Dashboard};
use driptrap::events::{EventLogger, FileSink};
use driptrap::session::SessionRegistry;
use driptrap::{ContentType, DashboardConfig, DripTrapConfig, DripTrapServer, TarpitConfig};
use std::error::Error;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Structured session events, one JSON object per line
const EVENT_LOG: &str = "tiw.log";
/// Diagnostics of the server itself
const DIAGNOSTIC_LOG: &str = "driptrap.log";

/// HTTP tarpit that never finishes a response
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Host to listen for connections on
    #[arg(short('H'), long, env = "DRIPTRAP_HOST", default_value("0.0.0.0"))]
    host: IpAddr,

    /// Port where the webserver should listen
    #[arg(short, long, env = "DRIPTRAP_PORT", default_value("8800"))]
    port: u16,

    /// Milliseconds between two chunks sent to the same client
    #[arg(short, long, env = "DRIPTRAP_TICK_MS", default_value("50"))]
    tick_ms: u64,

    /// Filler lines in every chunk
    #[arg(short('l'), long, env = "DRIPTRAP_FILLER_LINES", default_value("100"))]
    filler_lines: usize,

    /// Content type to send the filler as
    #[arg(short, long, env = "DRIPTRAP_CONTENT_TYPE", default_value("text/html"))]
    content_type: ContentType,

    /// Directory for the event and diagnostic logs
    #[arg(long, env = "DRIPTRAP_LOG_DIR", default_value("log"))]
    log_dir: PathBuf,

    /// Milliseconds between two dashboard redraws
    #[arg(long, env = "DRIPTRAP_REFRESH_MS", default_value("250"))]
    refresh_ms: u64,

    /// Log to stderr instead of drawing the live dashboard
    #[arg(long, env = "DRIPTRAP_NO_DASHBOARD")]
    no_dashboard: bool,
}

fn init_tracing(log_dir: &Path, console: bool) -> Result<WorkerGuard, Box<dyn Error>> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(DIAGNOSTIC_LOG)
        .build(log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let console_layer = console.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(fmt::layer().json().with_ansi(false).with_writer(writer))
        .with(console_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    Ok(guard)
}

/// The error followed by its chain of causes.
fn describe(err: &dyn Error) -> String {
    let mut text = err.to_string();
    let mut cause = err.source();
    while let Some(source) = cause {
        text.push_str(": ");
        text.push_str(&source.to_string());
        cause = source.source();
    }
    text
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let _ = dashboard::restore_terminal();
        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
    }));
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let (event_sink, _event_guard) =
        FileSink::daily(&args.log_dir, EVENT_LOG).map_err(|err| {
            eprintln!("{}", describe(&err));
            err
        })?;
    let _log_guard = init_tracing(&args.log_dir, args.no_dashboard)?;

    let config = DripTrapConfig::new(
        (args.host, args.port),
        TarpitConfig::new(
            Duration::from_millis(args.tick_ms),
            args.filler_lines,
            args.content_type,
        ),
        DashboardConfig::new(
            !args.no_dashboard,
            Duration::from_millis(args.refresh_ms),
            50,
        ),
    );
    let registry = SessionRegistry::new();
    let events = EventLogger::new(event_sink);

    let server = match DripTrapServer::new(config.clone(), registry.clone(), events)
        .bind()
        .await
    {
        Ok(server) => server,
        Err(err) => {
            error!("{}", describe(&err));
            eprintln!("{}", describe(&err));
            return Err(err.into());
        }
    };

    let (stop_dashboard, dashboard_stopped) = oneshot::channel::<()>();
    let dashboard = config.dashboard_config().enabled().then(|| {
        setup_panic_handler();
        let dashboard = Dashboard::new(
            registry.clone(),
            *config.dashboard_config(),
            server.local_addr().port(),
        );
        tokio::spawn(dashboard.run(async move {
            let _ = dashboard_stopped.await;
        }))
    });

    server
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Could not listen for interrupts: {}", err);
                std::future::pending::<()>().await;
            }
            info!("Interrupt received");
        })
        .await;

    let _ = stop_dashboard.send(());
    if let Some(dashboard) = dashboard {
        if let Ok(Err(err)) = dashboard.await {
            error!("Could not restore the terminal: {}", err);
        }
    }
    Ok(())
}
