//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Rollcall Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[presence]
status_root = "status"
# heartbeat_interval_secs = 15    # 5-300
# network_debounce_ms = 2000      # 0-30000
# channel_debounce_ms = 3000      # 0-30000
# directory_refresh_secs = 30     # 5-600
# probe_timeout_secs = 5          # 1-60
# channel_probe_attempts = 2      # 1-10
# channel_probe_wait_ms = 500     # 0-10000

[realtime]
# url = "wss://presence.example.org/socket"
# heartbeat_interval_secs = 25    # 5-120
# reconnect_delay_secs = 1        # 1-60
# max_reconnect_delay_secs = 30   # 1-600
# request_timeout_secs = 10       # 1-120
# connect_timeout_secs = 15       # 1-120

[reachability]
# probe_target = "1.1.1.1:443"
# poll_interval_secs = 5          # 1-300

[logging]
level = "info"                    # trace | debug | info | warn | error
"##
    .to_string()
}
