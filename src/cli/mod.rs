//! Command-line interface

pub mod commands;

pub use commands::{
    cmd_address, cmd_approval, cmd_bundle, cmd_config_init, cmd_prev_owner, cmd_sign,
    cmd_simulate, load_context, CliResult,
};
