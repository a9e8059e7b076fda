use clap::Parser;
use client::input::InputManager;
use client::network::{ClientError, PlayerClient};
use client::rendering::{Renderer, UiConfig};
use log::{error, info};
use macroquad::prelude::*;
use macroquad::Window;
use shared::{ClientConfig, Codec, NetConfig, SceneConfig, DEFAULT_PORT};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Player client for networked Pong")]
struct Args {
    /// Server host to connect to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Wire codec: json, bson, ubjson, bincode or postcard (must match the server)
    #[arg(short, long, default_value = "json")]
    codec: Codec,

    /// LZ4-compress every datagram (must match the server)
    #[arg(long)]
    compress: bool,

    /// Movement commands per second
    #[arg(long, default_value = "30")]
    cmd_rate: u32,

    /// Server updates accepted per second
    #[arg(long, default_value = "20")]
    update_rate: u32,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

async fn play(args: Args) -> Result<(), ClientError> {
    let net = NetConfig {
        codec: args.codec,
        compression: args.compress,
    };
    let config = ClientConfig {
        cmd_rate: args.cmd_rate,
        update_rate: args.update_rate,
    };

    let mut player = PlayerClient::connect(&args.host, args.port, &net, config)?;
    let mut input_manager = InputManager::new();
    let mut renderer = Renderer::new(args.width, args.height, &SceneConfig::default());
    let server = player.server_addr().to_string();

    loop {
        let input = input_manager.update();
        if input.quit {
            break;
        }

        player.frame(get_frame_time(), input)?;

        let ui = UiConfig {
            connected: player.is_connected(),
            server: server.clone(),
        };
        renderer.render(player.game(), &ui);

        next_frame().await;
    }

    player.disconnect();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}:{}", args.host, args.port);
    info!("Controls: W/S or arrows to move, any key to ready, Escape to quit");

    let conf = Conf {
        window_title: "Pong".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    };

    Window::from_config(conf, async move {
        if let Err(e) = play(args).await {
            error!("Client stopped: {}", e);
            std::process::exit(1);
        }
    });

    Ok(())
}
