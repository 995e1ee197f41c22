pub mod api;
pub mod config;
pub mod error;
pub mod report;
pub mod tools;

pub use config::Config;
pub use error::ToolError;
pub use tools::{ToolCall, ToolOutcome, Toolbox, render_outcome, tool_definitions};

pub fn print_banner() {
    eprintln!(
        r#"
                                      _
   ___ _ __ ___  ___  ___ ___  _   _| |_
  / __| '_ ` _ \/ __|/ __/ _ \| | | | __|
 | (__| | | | | \__ \ (_| (_) | |_| | |_
  \___|_| |_| |_|___/\___\___/ \__,_|\__|
                          v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
