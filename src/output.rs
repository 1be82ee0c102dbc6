use std::io::{self, Write};

use serde::Serialize;

pub struct JsonOutput;

impl JsonOutput {
    pub fn render<T: Serialize>(value: &T) -> io::Result<String> {
        serde_json::to_string_pretty(value).map_err(io::Error::other)
    }

    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = Self::render(value)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
