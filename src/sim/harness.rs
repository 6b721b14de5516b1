// sim-harness - Scripted UDP host for driving the navap client end to end
//
// Binds a socket, opens the session by pinging the client (which echoes the
// ping back), then serves the query/command protocol from a small scripted
// world: the vessel, one obstacle on the direct path and a navigation
// target. Pair it with a client configured with `nav.destination_object = 2`.
use clap::Parser;
use navap::geometry::Vector3;
use navap::sim::{serve, HostModel, SimObject};
use tokio::net::UdpSocket;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "sim-harness", about = "Scripted simulator host for the navap client")]
struct Args {
    /// Client address to open the session with, e.g. 127.0.0.1:8888
    #[arg(short, long)]
    client: String,

    /// Local port to bind (0 picks an ephemeral port)
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Delay replies by a random slice of this many milliseconds
    #[arg(long, default_value_t = 0)]
    jitter_ms: u64,

    /// Verbose protocol logging
    #[arg(short, long)]
    debug: bool,
}

fn scripted_world() -> HostModel {
    let mut model = HostModel::new(vec![
        SimObject {
            position: Vector3::zero(),
            radius: 1.0,
            is_vessel: true,
        },
        SimObject {
            position: Vector3::new(50.0, 0.0, 0.0),
            radius: 5.0,
            is_vessel: false,
        },
        SimObject {
            position: Vector3::new(100.0, 0.0, 0.0),
            radius: 2.0,
            is_vessel: false,
        },
    ]);
    model.velocity = Vector3::new(0.5, 0.1, 0.0);
    model
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();
    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let socket = UdpSocket::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(local = %socket.local_addr()?, client = %args.client, "harness up");

    // Open the session: ping the client and wait for the echo
    socket.send_to(b"ping", &args.client).await?;
    let mut buf = [0u8; 64];
    let (len, addr) = socket.recv_from(&mut buf).await?;
    tracing::info!(client = %addr, echo = %String::from_utf8_lossy(&buf[..len]), "client answered");

    let jitter = (args.jitter_ms > 0).then(|| Duration::from_millis(args.jitter_ms));
    serve(socket, scripted_world(), jitter).await?;
    Ok(())
}
