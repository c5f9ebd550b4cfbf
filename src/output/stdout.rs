//! Debug output printing every frame to stdout.

use std::io::Write as _;

use crate::error::PipeError;
use crate::plugins::Writer;

pub struct StdOutput;

impl Writer for StdOutput {
    fn write(&mut self, data: &[u8]) -> Result<usize, PipeError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(data)?;
        handle.write_all(b"\n")?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_acknowledges_full_length() {
        let mut output = StdOutput;
        assert_eq!(output.write(b"1 aaa 42\nping").unwrap(), 13);
    }
}
