//! Generated-program template for the runtime under test.
//!
//! Two fixed forms share one driver: `ast` blocks parse the source text and
//! print a serialized form of the structure (tables as JSON, anything else
//! via `tostring`); `run` blocks parse and fully interpret it.
use crate::blocks::Block;
use anyhow::{bail, Result};

pub const DRIVER_LUA: &str = include_str!("../templates/driver.lua");

/// Realizes the driver program for one block. An `ast` entry wins over a
/// `run` entry when both are present.
pub fn render_driver(block: &Block) -> Result<String> {
    let (item, ast) = if let Some(item) = block.get("ast") {
        (item, "true")
    } else if let Some(item) = block.get("run") {
        (item, "false")
    } else {
        bail!("block has no run or ast entry");
    };
    Ok(DRIVER_LUA
        .replace("@CODE@", &item.text())
        .replace("@AST@", ast))
}
