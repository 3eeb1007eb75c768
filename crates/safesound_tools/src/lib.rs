#![forbid(unsafe_code)]

pub mod args;
pub mod gate_cli;
pub mod notify_cli;

pub const USAGE: &str = "usage:
  safesound gate --label <label> --confidence <0-100> [--emergency] [--threshold <0-100>] [--lexicon <csv>]
  safesound notify-test --users-file <path> --user-id <id> [--type <label>] [--confidence <0-100>] [--location <text>]";
