use std::io::Write;

/// External collaborator surfaced to `print` and stringification: the only
/// thing the evaluator asks of its embedder is somewhere to write bytes.
pub trait Context {
    fn output_stream(&mut self) -> &mut dyn Write;
}

/// Context writing program output to any byte sink, e.g. stdout or a
/// `Vec<u8>` capture buffer in tests.
pub struct StreamContext<W: Write> {
    output: W,
}

impl<W: Write> StreamContext<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> Context for StreamContext<W> {
    fn output_stream(&mut self) -> &mut dyn Write {
        &mut self.output
    }
}
