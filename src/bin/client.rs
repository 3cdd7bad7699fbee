//! RUDP 클라이언트 데모
//!
//! 서버에 연결해 매 틱 고정 크기 패킷을 주고받으며 통계를 출력한다.
//! 연결 실패나 연결 끊김 시 종료.
//!
//! 사용법:
//!   cargo run --release --bin rudp-client -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin rudp-client -- --server 127.0.0.1:30000
//!
//!   # 다른 로컬 포트 + 30% 드롭
//!   cargo run --release --bin rudp-client -- -p 30002 --loss 0.3

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rudp::{Config, DatagramSocket, Endpoint, LossySocket, ReliableConnection};

/// 데모 페이로드 크기
const PACKET_SIZE: usize = 256;

/// 클라이언트 설정
struct ClientConfig {
    port: u16,
    server: Endpoint,
    tick: Duration,
    loss: f64,
    verbose: bool,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: 30001,
            server: Endpoint::from_octets(127, 0, 0, 1, 30000),
            tick: Duration::from_millis(33),
            loss: 0.0,
            verbose: false,
            config: Config::default(),
        }
    }
}

fn parse_value<T: FromStr>(args: &[String], i: usize) -> T {
    match args.get(i + 1).map(|value| value.parse()) {
        Some(Ok(value)) => value,
        _ => {
            eprintln!("{} 옵션에 유효한 값이 필요합니다", args[i]);
            std::process::exit(2);
        }
    }
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                config.port = parse_value(&args, i);
                i += 1;
            }
            "--server" | "-s" => {
                let addr: SocketAddr = parse_value(&args, i);
                config.server = match Endpoint::from_socket_addr(addr) {
                    Some(endpoint) => endpoint,
                    None => {
                        eprintln!("IPv4 서버 주소가 필요합니다: {}", addr);
                        std::process::exit(2);
                    }
                };
                i += 1;
            }
            "--tick-ms" => {
                config.tick = Duration::from_millis(parse_value(&args, i));
                i += 1;
            }
            "--timeout" => {
                config.config.timeout = parse_value(&args, i);
                i += 1;
            }
            "--loss" => {
                config.loss = parse_value(&args, i);
                i += 1;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"RUDP Client - Reliable UDP 데모 클라이언트

서버에 연결해 매 틱 {PACKET_SIZE}바이트 패킷을 주고받는다.

사용법:
  cargo run --release --bin rudp-client -- [OPTIONS]

옵션:
  -s, --server <ADDR>     서버 주소 (기본: 127.0.0.1:30000)
  -p, --port <PORT>       로컬 포트 (기본: 30001)
  --tick-ms <MS>          틱 간격 밀리초 (기본: 33)
  --timeout <SECS>        연결 타임아웃 초 (기본: 5.0)
  --loss <RATIO>          송신 패킷 드롭 비율 0.0~1.0 (기본: 0.0)
  -v, --verbose           DEBUG 로그 출력 (ack 목록 포함)
  -h, --help              이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("알 수 없는 옵션: {}", other);
            }
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client_config = parse_args();

    // 로깅 설정
    let level = if client_config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("RUDP Client starting...");
    info!("Server: {}", client_config.server);
    info!("Local port: {}", client_config.port);
    info!("Simulated loss: {:.1}%", client_config.loss * 100.0);

    let socket = LossySocket::new(DatagramSocket::open(client_config.port)?, client_config.loss);
    let mut connection = ReliableConnection::with_hooks(client_config.config, ())?;
    connection.start_with(socket)?;
    connection.connect(client_config.server);

    let payload = vec![0u8; PACKET_SIZE];
    let mut buf = vec![0u8; connection.config().max_payload_size()];

    let dt = client_config.tick.as_secs_f32();
    let mut ticker = tokio::time::interval(client_config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut connected = false;
    let mut stats_timer = 0.0f32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }

        if !connected && connection.is_connected() {
            info!("Connected to {}", client_config.server);
            connected = true;
        }
        if connection.is_connect_failed() {
            warn!("Connect to {} failed", client_config.server);
            break;
        }
        if connected && !connection.is_connected() {
            warn!("Connection lost");
            break;
        }

        connection.send_packet(&payload);
        while connection.receive_packet(&mut buf) > 0 {}

        if !connection.acks().is_empty() {
            debug!("acks: {:?}", connection.acks());
        }

        connection.update(dt);

        stats_timer += dt;
        if stats_timer >= 1.0 {
            stats_timer = 0.0;
            if connection.is_connected() {
                info!("{}", connection.stats().summary());
            }
        }
    }

    connection.stop();
    Ok(())
}
