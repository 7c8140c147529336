use encoding_rs::{CoderResult, Encoder, Encoding, UTF_8};
use std::io::{self, Write};

/// Smallest scratch buffer handed to the encoder, large enough for the
/// longest numeric character reference plus any shift sequence.
const MIN_SCRATCH: usize = 32;

/// Wraps a byte sink and encodes UTF-8 text into the configured encoding.
///
/// UTF-8 output is written straight through. For any other encoding the text
/// runs through an `encoding_rs` encoder; characters the encoding cannot
/// represent are written as decimal numeric character references, which
/// markup parsers decode back to the original character.
pub struct EncodedSink<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    encoder: Option<Encoder>,
    scratch: Vec<u8>,
}

impl<W: Write> EncodedSink<W> {
    pub fn new(inner: W, encoding: &'static Encoding) -> Self {
        // UTF-16 labels encode as UTF-8, like every encoding_rs encoder does.
        let encoding = encoding.output_encoding();
        let encoder = (encoding != UTF_8).then(|| encoding.new_encoder());
        Self {
            inner,
            encoding,
            encoder,
            scratch: Vec::new(),
        }
    }

    /// The encoding bytes are actually written in.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.encode(text, false)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Writes any state the encoder still holds, flushes, and returns the
    /// underlying sink.
    pub fn finish(mut self) -> io::Result<W> {
        if self.encoder.is_some() {
            self.encode("", true)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn encode(&mut self, mut text: &str, last: bool) -> io::Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return self.inner.write_all(text.as_bytes());
        };

        loop {
            let capacity = encoder
                .max_buffer_length_from_utf8_if_no_unmappables(text.len())
                .unwrap_or(text.len().saturating_mul(4))
                .max(MIN_SCRATCH);
            self.scratch.resize(capacity, 0);

            let (result, read, written, _) = encoder.encode_from_utf8(text, &mut self.scratch, last);
            self.inner.write_all(&self.scratch[..written])?;
            text = &text[read..];

            if let CoderResult::InputEmpty = result {
                return Ok(());
            }
        }
    }
}
