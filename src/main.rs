mod cli;
mod core;
mod tui;
mod util;

use std::sync::mpsc;

use clap::Parser;

use crate::cli::{Cli, Commands, WatchArgs};
use crate::core::engine::Engine;
use crate::core::error::JobwatchError;
use crate::core::listener::{self, IngestionListener};
use crate::core::notify::{DesktopNotifier, LogNotifier, Notifier};
use crate::core::registry::JobRegistry;
use crate::core::render_loop::RenderLoop;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), JobwatchError> {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Add(args)) => {
            util::init_stderr_logging();
            let reply = listener::send_registration(&args.listen, &args.id)?;
            println!("{reply}");
            Ok(())
        }
        Some(Commands::Watch(args)) => watch(args),
        None => watch(cli.watch),
    }
}

fn watch(args: WatchArgs) -> Result<(), JobwatchError> {
    util::init_file_logging(&args.log_file)?;
    let source = args.source_config()?;

    let registry = JobRegistry::load(&args.registry)?;
    tracing::info!(path = %args.registry.display(), jobs = registry.len(), "opened job registry");
    let (mut engine, intake) = Engine::new(source.into_factory());
    engine.replay(registry.all());

    let listener = IngestionListener::bind(&args.listen, registry, intake)?;
    listener.spawn()?;

    let notifier: Box<dyn Notifier> = if args.no_notify {
        Box::new(LogNotifier)
    } else {
        Box::new(DesktopNotifier)
    };
    let (snapshot_tx, snapshot_rx) = mpsc::channel();
    RenderLoop::new(engine, notifier, args.interval()).spawn(snapshot_tx)?;
    tui::run(snapshot_rx)
}
