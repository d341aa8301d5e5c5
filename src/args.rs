//! Command-line argument parsing and processing.
//!
//! This module handles parsing of command-line arguments and provides a clean
//! interface for the main application logic. It supports the standard help,
//! version, and debug flags plus the inspection commands.

use crate::logger::Log;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// List every stored alarm with its overrides
    Run { debug_enabled: bool },
    /// Show one alarm's preferences and next skip date
    Status {
        debug_enabled: bool,
        alarm_id: String,
    },
    /// List the holiday catalog of one country
    Holidays {
        debug_enabled: bool,
        country_code: String,
    },
    /// Show today's sunrise/sunset and the resulting auto-set times
    Sun { debug_enabled: bool },
    /// Remove passed skip dates from every stored alarm
    Prune { debug_enabled: bool },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown or incomplete arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is ignored. Version takes
    /// precedence over help, and help over any command.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut status_id: Option<String> = None;
        let mut holiday_code: Option<String> = None;
        let mut run_sun = false;
        let mut run_prune = false;
        let mut unknown_arg_found = false;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            match arg_str.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--sun" | "-s" => run_sun = true,
                "--prune" | "-p" => run_prune = true,
                "--status" | "--holidays" => {
                    let flag = arg_str.clone();
                    match args_vec.get(i + 1).filter(|v| !v.starts_with('-')) {
                        Some(value) => {
                            if flag == "--status" {
                                status_id = Some(value.clone());
                            } else {
                                holiday_code = Some(value.clone());
                            }
                            i += 1;
                        }
                        None => {
                            let usage = if flag == "--status" {
                                "--status <alarm-id>"
                            } else {
                                "--holidays <country-code>"
                            };
                            Log::log_warning(&format!(
                                "Missing argument for {}. Usage: {}",
                                flag, usage
                            ));
                            unknown_arg_found = true;
                        }
                    }
                }
                _ => {
                    if arg_str.starts_with('-') {
                        Log::log_warning(&format!("Unknown option: {}", arg_str));
                        unknown_arg_found = true;
                    }
                    // Non-option arguments are currently ignored
                }
            }
            i += 1;
        }

        let commands = [
            status_id.is_some(),
            holiday_code.is_some(),
            run_sun,
            run_prune,
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if commands > 1 {
            Log::log_warning("Only one of --status, --holidays, --sun, --prune may be given");
            unknown_arg_found = true;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else if let Some(alarm_id) = status_id {
            CliAction::Status {
                debug_enabled,
                alarm_id,
            }
        } else if let Some(country_code) = holiday_code {
            CliAction::Holidays {
                debug_enabled,
                country_code,
            }
        } else if run_sun {
            CliAction::Sun { debug_enabled }
        } else if run_prune {
            CliAction::Prune { debug_enabled }
        } else {
            CliAction::Run { debug_enabled }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    Log::log_version();
    Log::log_pipe();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    Log::log_version();
    Log::log_block_start(env!("CARGO_PKG_DESCRIPTION"));
    Log::log_block_start("Usage: sleeper [OPTIONS]");
    Log::log_block_start("Options:");
    Log::log_indented("-d, --debug               Enable detailed debug output");
    Log::log_indented("-h, --help                Print help information");
    Log::log_indented("    --holidays <CC>       List holidays for a country code");
    Log::log_indented("-p, --prune               Remove passed skip dates from every alarm");
    Log::log_indented("-s, --sun                 Show sunrise/sunset and auto-set times");
    Log::log_indented("    --status <alarm-id>   Show one alarm's overrides");
    Log::log_indented("-V, --version             Print version information");
    Log::log_end();
}
