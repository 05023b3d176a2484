//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Warden Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[rate_limit]
# max_requests = 5          # per user, per window (1-10000)
# window_ms = 60000         # 100-86400000
# sweep_interval_ms = 1000  # how often expired counters are dropped

[sessions.text]
# max_output_tokens = 8192
# temperature = 0.7         # 0.0-2.0
# top_p = 0.95              # 0.0-1.0
# system_instruction = "..."

[sessions.voice]
# max_output_tokens = 1024
# temperature = 0.7
# top_p = 0.95
# system_instruction = "..."

[resolver]
# max_tool_rounds = 10      # 1-100
# progress_notices = true
# confirmation_tools = ["send_email"]
# message_scoped_tools = ["add_reaction", "pin_message"]
# confirmation_ttl_secs = 900  # unanswered confirm/cancel prompts expire

[bootstrap]
# enabled = true
# tools = ["get_user_profile", "get_memories", "get_rules"]

[output]
# inline_limit = 2000
# overflow_notice = "The response was too long, so it was sent as a file."
# attachments_notice = "Here are the attached file(s)."
# overflow_file_name = "response.txt"
# temp_dir = "/tmp/warden"

[backend]
# model = "gemini-2.0-flash"
# api_key_env = "GEMINI_API_KEY"
# request_timeout_secs = 120

[logging]
# level = "INFO"            # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
