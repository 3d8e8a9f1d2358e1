mod local_fs;

use clap::{Parser, Subcommand};
use local_fs::LocalFsDriver;
use std::error::Error;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use storage_protocol_core::{ProtocolServer, SessionConfig, SessionType, StreamChannel};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the storage protocol over TCP, rooted at a local directory.
    Serve(ServeCmd),
}

#[derive(Parser, Debug)]
struct ServeCmd {
    /// Local directory the session's paths resolve against.
    root: PathBuf,

    #[arg(long, default_value = "127.0.0.1:4447")]
    listen: String,

    #[arg(long, default_value = "backup")]
    session_type: String,

    #[arg(long, default_value_t = SessionConfig::DEFAULT_IO_BUFFER_SIZE)]
    io_buffer_size: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Serve(cmd) => serve(cmd)?,
    }

    Ok(())
}

fn serve(cmd: &ServeCmd) -> Result<(), Box<dyn Error>> {
    let session_type = SessionType::parse(&cmd.session_type)
        .ok_or_else(|| format!("unknown session type '{}'", cmd.session_type))?;

    let listener = TcpListener::bind(&cmd.listen)?;
    log::info!("listening on {} rooted at {:?}", cmd.listen, cmd.root);

    for stream in listener.incoming() {
        let stream = stream?;
        let root = cmd.root.clone();
        let config = SessionConfig::new(session_type).with_io_buffer_size(cmd.io_buffer_size);
        thread::spawn(move || {
            if let Err(e) = handle_connection(stream, root, config) {
                log::error!("session ended with error: {e}");
            }
        });
    }

    Ok(())
}

fn handle_connection(
    stream: TcpStream,
    root: PathBuf,
    config: SessionConfig,
) -> Result<(), Box<dyn Error>> {
    let peer = stream.peer_addr().ok();
    log::info!("session started: {peer:?}");

    let driver = LocalFsDriver::new(root);
    let server = ProtocolServer::new(driver, config)?;
    let mut channel = StreamChannel::new(stream);
    server.serve(&mut channel)?;

    log::info!("session ended: {peer:?}");
    Ok(())
}
