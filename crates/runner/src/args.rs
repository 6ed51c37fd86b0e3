//! Command-line arguments of the runner.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(
    name = "pvscript-runner",
    about = "Run one widget script through the interpreter gateway"
)]
pub struct RunArgs {
    /// Macro used to expand the script path.
    #[arg(short = 'm', long = "macro", value_name = "NAME=VALUE", value_parser = parse_macro)]
    pub macros: Vec<(String, String)>,

    /// Widget property with its initial value.
    #[arg(short = 'p', long = "property", value_name = "PROPERTY=VALUE", value_parser = parse_binding)]
    pub properties: Vec<(String, Value)>,

    /// Script file, relative to the working directory.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Script inputs in declaration order.
    #[arg(value_name = "INPUT=VALUE", value_parser = parse_binding)]
    pub inputs: Vec<(String, Value)>,
}

impl RunArgs {
    pub fn macro_map(&self) -> HashMap<String, String> {
        self.macros.iter().cloned().collect()
    }
}

fn split_pair(pair: &str) -> Result<(String, &str), String> {
    match pair.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value)),
        _ => Err(format!("expected NAME=VALUE, got {pair:?}")),
    }
}

fn parse_macro(pair: &str) -> Result<(String, String), String> {
    split_pair(pair).map(|(name, value)| (name, value.to_string()))
}

fn parse_binding(pair: &str) -> Result<(String, Value), String> {
    split_pair(pair).map(|(name, value)| (name, parse_value(value)))
}

/// JSON if it parses, otherwise the raw text as a string.
fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
