//! Web server command.

use console::style;

use crate::cli::helpers::build_engine;
use crate::config::Settings;

const DEFAULT_PORT: u16 = 8000;

/// Start the web server and the scheduler.
pub async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let addr = parse_bind_address(bind.unwrap_or(&settings.bind));
    settings.ensure_directories()?;

    println!(
        "{} Starting marketlead server at http://{}",
        style("→").cyan(),
        addr
    );
    println!(
        "  Crawling {} cities every {}s",
        settings.cities.len(),
        settings.scrape_interval().as_secs()
    );
    println!("  Press Ctrl+C to stop");

    let engine = build_engine(settings)?;
    crate::server::serve(engine, &addr).await
}

/// Parse a bind address that can be:
/// - Just a port: "8000" -> 127.0.0.1:8000
/// - Just a host: "0.0.0.0" -> 0.0.0.0:8000
/// - Host and port: "0.0.0.0:8000" -> 0.0.0.0:8000
fn parse_bind_address(bind: &str) -> String {
    if let Ok(port) = bind.parse::<u16>() {
        return format!("127.0.0.1:{}", port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if port_str.parse::<u16>().is_ok() {
            return format!("{}:{}", host, port_str);
        }
    }

    format!("{}:{}", bind, DEFAULT_PORT)
}
