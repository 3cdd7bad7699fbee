//! RUDP 서버 데모
//!
//! 클라이언트 하나를 기다렸다가 매 틱 고정 크기 패킷을 주고받으며
//! ack/손실/RTT 통계를 출력한다.
//!
//! 사용법:
//!   cargo run --release --bin rudp-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 포트 30000
//!   cargo run --release --bin rudp-server
//!
//!   # 송신 패킷 10% 드롭
//!   cargo run --release --bin rudp-server -- --loss 0.1 --verbose

use std::str::FromStr;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use rudp::{Config, DatagramSocket, LossySocket, ReliableConnection};

/// 데모 페이로드 크기
const PACKET_SIZE: usize = 256;

/// 서버 설정
struct ServerConfig {
    port: u16,
    tick: Duration,
    loss: f64,
    verbose: bool,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 30000,
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

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                config.port = parse_value(&args, i);
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
                    r#"RUDP Server - Reliable UDP 데모 서버

첫 번째 유효 패킷의 송신자를 피어로 받아들이고
매 틱 {PACKET_SIZE}바이트 패킷을 주고받는다.

사용법:
  cargo run --release --bin rudp-server -- [OPTIONS]

옵션:
  -p, --port <PORT>       리슨 포트 (기본: 30000)
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
    let server_config = parse_args();

    // 로깅 설정
    let level = if server_config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("RUDP Server starting...");
    info!("Port: {}", server_config.port);
    info!("Tick: {} ms", server_config.tick.as_millis());
    info!("Timeout: {:.1}s", server_config.config.timeout);
    info!("Simulated loss: {:.1}%", server_config.loss * 100.0);

    let socket = LossySocket::new(DatagramSocket::open(server_config.port)?, server_config.loss);
    let mut connection = ReliableConnection::with_hooks(server_config.config, ())?;
    connection.start_with(socket)?;
    connection.listen();

    let payload = vec![0u8; PACKET_SIZE];
    let mut buf = vec![0u8; connection.config().max_payload_size()];

    let dt = server_config.tick.as_secs_f32();
    let mut ticker = tokio::time::interval(server_config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut was_connected = false;
    let mut stats_timer = 0.0f32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }

        if connection.is_connected() != was_connected {
            was_connected = connection.is_connected();
            match connection.peer() {
                Some(peer) if was_connected => info!("Client connected: {}", peer),
                _ => info!("Client disconnected, waiting for next client..."),
            }
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
