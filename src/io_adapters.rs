use std::cell::RefCell;
use std::io::{Result as IoResult, Write};
use std::rc::Rc;

/// Output streams of a session.
///
/// An interactive session hands the terminal straight to the wrapped command; any
/// other session captures the child's output and copies it to its own writers.
pub struct Io {
    /// Destination of regular output.
    pub stdout: Box<dyn Write>,
    /// Destination of diagnostics.
    pub stderr: Box<dyn Write>,
    inherit: bool,
}

impl Io {
    /// Process stdout/stderr, inherited by spawned commands.
    pub fn inherited() -> Self {
        Self {
            stdout: Box::new(std::io::stdout()),
            stderr: Box::new(std::io::stderr()),
            inherit: true,
        }
    }

    /// Arbitrary writers; spawned commands have their output captured into them.
    pub fn new(stdout: Box<dyn Write>, stderr: Box<dyn Write>) -> Self {
        Self {
            stdout,
            stderr,
            inherit: false,
        }
    }

    /// Whether spawned commands should inherit the terminal.
    pub fn inherits_terminal(&self) -> bool {
        self.inherit
    }
}

/// Shared in-memory sink standing in for a terminal stream.
///
/// Clones of the handle returned by [`MemWriter::with_handle`] see every byte written.
#[derive(Default)]
pub struct MemWriter {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the collected bytes.
    pub fn into_inner(self) -> Rc<RefCell<Vec<u8>>> {
        self.bytes
    }

    /// A writer plus a handle that stays readable once the writer is boxed into [`Io`].
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let writer = Self::new();
        let handle = Rc::clone(&writer.bytes);
        (writer, handle)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.bytes.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_writer_collects_output() {
        let (mut writer, handle) = MemWriter::with_handle();
        write!(writer, "a{}", 1).unwrap();
        writer.write_all(b"b").unwrap();

        assert_eq!(handle.borrow().as_slice(), b"a1b");
        assert_eq!(writer.into_inner().borrow().len(), 3);
    }

    #[test]
    fn test_captured_io_does_not_inherit() {
        let io = Io::new(Box::new(MemWriter::new()), Box::new(MemWriter::new()));
        assert!(!io.inherits_terminal());
        assert!(Io::inherited().inherits_terminal());
    }
}
