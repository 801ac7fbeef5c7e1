mod cli;
mod hook;
mod logging;
mod paths;
mod router;

use std::io::Read;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use clap::Parser;

use cli::{Cli, Command};
use hn_notify::NotifierFacade;
use hook::{HookEvent, HookPayload};

/// Bounded wait for in-flight webhook sends before the process exits
/// (spec §4.6 step 5, default from §5's "bounded wait").
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let exit_code = if e.use_stderr() { 1 } else { 0 };
            e.print().ok();
            std::process::exit(exit_code);
        }
    };

    match cli.command {
        None => {
            Cli::parse_from(["hook-notify", "--help"]);
        }
        Some(Command::Version) => {
            println!("hook-notify {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Command::HandleHook { event }) => run_hook(event),
    }
}

/// Reads one JSON hook payload from stdin and dispatches it through the
/// router. Wrapped in [`std::panic::catch_unwind`] per spec §4.6 step 3:
/// any unhandled failure is logged and the process still exits 0 rather
/// than blocking the host.
fn run_hook(event: HookEvent) {
    let (cfg, root) = cli::load_config();
    let _guard = logging::init(&paths::log_dir(&root));

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to start tokio runtime");
        runtime.block_on(dispatch(event, &cfg, &root));
    }));

    if let Err(panic) = outcome {
        tracing::error!(panic = %panic_message(&panic), "hook-notify panicked; exiting cleanly");
    }
}

async fn dispatch(event: HookEvent, cfg: &hn_domain::config::Config, root: &std::path::Path) {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        tracing::warn!(error = %e, "failed to read hook payload from stdin");
        return;
    }
    let payload: HookPayload = match serde_json::from_str(&raw) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse hook payload");
            return;
        }
    };

    let notifier = match NotifierFacade::new() {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize notifier facade");
            return;
        }
    };

    let state_dir = paths::state_base_dir(root);
    let router = router::Router::new(cfg, &state_dir, &notifier);
    router.handle(event, payload).await;

    notifier.shutdown(SHUTDOWN_TIMEOUT).await;
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
