//! Process entry point of the decision service.
use anyhow::Result;
use clap::Parser;
use log::info;
use qbridge::{config::SessionConfig, session::Session};
use qbridge_core::record::{NullRecorder, Recorder};
use qbridge_tensorboard::TensorboardRecorder;
use std::{net::TcpListener, path::PathBuf};

/// Online Double-DQN decision service for a simulation peer.
#[derive(Debug, Parser)]
#[command(name = "qbridge", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:50007")]
    bind: String,

    /// Session configuration file (YAML); built-in defaults when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Telemetry directory for TFRecord summaries.
    #[arg(long, default_value = "./logs")]
    logdir: PathBuf,

    /// Disables telemetry output.
    #[arg(long)]
    no_telemetry: bool,

    /// Overrides the checkpoint directory of the configuration.
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(dir) = args.checkpoint_dir {
        config.checkpoint_dir = dir;
    }

    let (step_recorder, episode_recorder): (Box<dyn Recorder>, Box<dyn Recorder>) =
        if args.no_telemetry {
            (Box::new(NullRecorder::new()), Box::new(NullRecorder::new()))
        } else {
            (
                Box::new(TensorboardRecorder::new(
                    args.logdir.join("steps"),
                    "env_step",
                )),
                Box::new(TensorboardRecorder::new(
                    args.logdir.join("episodes"),
                    "episode",
                )),
            )
        };

    let listener = TcpListener::bind(&args.bind)?;
    info!("listening on {} ...", args.bind);

    // Single-peer, single-session model: one accepted connection, processed
    // to EOF, then the process exits.
    let (stream, addr) = listener.accept()?;
    info!("accepted connection from {}", addr);

    let mut session = Session::new(config, step_recorder, episode_recorder);
    session.run(stream)
}
