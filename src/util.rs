use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const API_ADDR: &str = "INVENTORY_API_ADDR";

const DEFAULT_API_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 3000);

pub fn get_api_addr() -> SocketAddr {
    let addr_from_env = std::env::var(API_ADDR);
    addr_from_env.map_or(DEFAULT_API_ADDR, |res| res.parse().unwrap_or(DEFAULT_API_ADDR))
}

const DB_PATH: &str = "INVENTORY_DB_PATH";

const DEFAULT_DB_PATH: &str = "./servers.db";

pub fn get_db_path() -> PathBuf {
    let path_from_env = std::env::var(DB_PATH);
    PathBuf::from(path_from_env.unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()))
}
