mod source;

pub use source::{command_keyword, parse_script, NON_INSTANT_COMMANDS};
