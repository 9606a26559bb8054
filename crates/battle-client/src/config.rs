const DEFAULT_SERVER_URL: &str = "wss://match.codebattle.dev";

/// Match service WebSocket URL.
pub fn server_url() -> String {
    std::env::var("BATTLE_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string())
}

/// HTTP base derived from the WebSocket URL, for request/response services.
pub fn http_base_url() -> String {
    let ws_url = server_url();
    ws_url
        .replace("wss://", "https://")
        .replace("ws://", "http://")
}

/// Execution service base URL. Defaults to the match service's HTTP base.
pub fn exec_url() -> String {
    std::env::var("BATTLE_EXEC_URL").unwrap_or_else(|_| http_base_url())
}

/// Profile service base URL. Defaults to the match service's HTTP base.
pub fn profile_url() -> String {
    std::env::var("BATTLE_PROFILE_URL").unwrap_or_else(|_| http_base_url())
}
