use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use pairlink_session::{ChannelBuilder, ChannelConfig, LinkConfig, SocketSession};
use tracing::info;

use crate::cmd::DisplayArgs;
use crate::exit::{channel_error, link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_ui_state, OutputFormat};

const TICK: Duration = Duration::from_millis(100);

pub fn run(args: DisplayArgs, format: OutputFormat) -> CliResult<i32> {
    let link = LinkConfig::default().with_app_installed(!args.no_app);
    let session =
        SocketSession::listen(&args.path, link).map_err(|err| link_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (updates_tx, updates) = mpsc::channel();
    let _channel = ChannelBuilder::new(session)
        .with_config(ChannelConfig::default().with_name("display"))
        .with_observer(move |state| {
            let _ = updates_tx.send(state.clone());
        })
        .open()
        .map_err(|err| channel_error("display start failed", err))?;
    info!(path = ?args.path, "display waiting for a picker");

    while running.load(Ordering::SeqCst) {
        let state = match updates.recv_timeout(TICK) {
            Ok(state) => state,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        print_ui_state(&state, format);

        if args.count.is_some_and(|count| state.colors_received >= count) {
            return Ok(SUCCESS);
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
