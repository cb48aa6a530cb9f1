const HUB_TOKEN: &str = "LOOKOUT_TOKEN";

pub fn get_token() -> Option<String> {
    std::env::var(HUB_TOKEN).ok()
}

const HUB_DB: &str = "LOOKOUT_DB";

pub fn get_db_path() -> Option<String> {
    std::env::var(HUB_DB).ok()
}

const DEFAULT_MONITOR_PORT: u16 = 443;

pub fn get_default_port() -> u16 {
    DEFAULT_MONITOR_PORT
}
