/// Little-endian u32 accumulator for shader-program cache keys.
///
/// Nodes append their key material while a program is assembled; the finished
/// byte string identifies the generated shader text (not uniform values).
#[derive(Clone, Debug, Default)]
pub struct ProgramKeyBuilder {
    bytes: Vec<u8>,
}

impl ProgramKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
