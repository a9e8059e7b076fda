use clap::Parser;
use log::info;
use server::network::Server;
use shared::{Codec, NetConfig, SceneConfig, ServerSettings, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative server for networked Pong")]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "66")]
    tick_rate: u32,

    /// Wire codec: json, bson, ubjson, bincode or postcard
    #[arg(short, long, default_value = "json")]
    codec: Codec,

    /// LZ4-compress every datagram
    #[arg(long)]
    compress: bool,

    /// Points needed to win a match
    #[arg(short, long, default_value = "10")]
    score_limit: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let net = NetConfig {
        codec: args.codec,
        compression: args.compress,
    };
    let scene = SceneConfig {
        tick_rate: args.tick_rate,
        score_limit: args.score_limit,
        ..SceneConfig::default()
    };

    let addr = format!("{}:{}", args.host, args.port);
    info!("Starting server on {}", addr);

    let mut server = Server::bind(&addr, &net, scene, ServerSettings::default())?;
    server.run().await?;

    info!("Server stopped");
    Ok(())
}
