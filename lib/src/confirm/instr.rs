use std::mem::size_of;

use crate::class::ByteClass;
use crate::confirm::instr::Instr::{
    Alternation, AssertEnd, AssertStart, Class, Literal, MaskedLiteral, Match,
    NotClass, Seek,
};

/// Instructions supported by confirmation automata.
#[derive(Debug)]
pub(crate) enum Instr<'a> {
    /// The candidate is confirmed.
    Match,

    /// Match a literal string at the cursor and advance the cursor past it.
    Literal(&'a [u8]),

    /// Match a masked literal string. The first slice is the literal and
    /// the second one is the mask. A byte `b` matches the literal byte `l`
    /// with mask `m` if `b & m == l`.
    MaskedLiteral(&'a [u8], &'a [u8]),

    /// Match a byte that belongs to the class.
    Class(ByteClass),

    /// Match a byte that doesn't belong to the class.
    NotClass(ByteClass),

    /// Move the cursor by the given number of bytes, without matching
    /// anything. Negative values move the cursor backwards.
    Seek(i16),

    /// The cursor must be at the start of the stream.
    AssertStart,

    /// The cursor must be at the end of the stream.
    AssertEnd,

    /// Matches the first of the alternative instructions returned by the
    /// [`InstrParser`] that matches at the cursor. The alternatives are
    /// either [`Literal`] or [`MaskedLiteral`], and they are tried in order.
    Alternation(InstrParser<'a>),
}

impl<'a> Instr<'a> {
    pub const MATCH: u8 = 0x00;
    pub const LITERAL: u8 = 0x01;
    pub const MASKED_LITERAL: u8 = 0x02;
    pub const CLASS: u8 = 0x03;
    pub const NOT_CLASS: u8 = 0x04;
    pub const SEEK: u8 = 0x05;
    pub const ASSERT_START: u8 = 0x06;
    pub const ASSERT_END: u8 = 0x07;
    pub const ALTERNATION: u8 = 0x08;
}

/// Error returned when the code can't be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DecodeError {
    UnknownOpcode(u8),
    Truncated,
}

/// Parses a slice of bytes that contains automaton instructions, returning
/// individual instructions and their arguments.
#[derive(Debug)]
pub(crate) struct InstrParser<'a> {
    code: &'a [u8],
}

impl<'a> InstrParser<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self { code }
    }

    /// Decodes the instruction at the start of `code`, returning the
    /// instruction and its size in bytes.
    #[inline]
    pub fn decode_instr(
        code: &'a [u8],
    ) -> Result<(Instr<'a>, usize), DecodeError> {
        const ARG: usize = 1 + size_of::<u16>();

        match code {
            [Instr::MATCH, ..] => Ok((Match, 1)),
            [Instr::LITERAL, ..] => {
                let len = Self::decode_u16(code, 1)? as usize;
                let literal = Self::slice(code, ARG, len)?;
                Ok((Literal(literal), ARG + len))
            }
            [Instr::MASKED_LITERAL, ..] => {
                let len = Self::decode_u16(code, 1)? as usize;
                let literal = Self::slice(code, ARG, len)?;
                let mask = Self::slice(code, ARG + len, len)?;
                Ok((MaskedLiteral(literal, mask), ARG + 2 * len))
            }
            [Instr::CLASS | Instr::NOT_CLASS, ..] => {
                let raw = Self::slice(code, 1, ByteClass::ENCODED_SIZE)?;
                let mut bits = [0; ByteClass::ENCODED_SIZE];
                bits.copy_from_slice(raw);
                let class = ByteClass::from_raw(bits);
                let instr = if code[0] == Instr::CLASS {
                    Class(class)
                } else {
                    NotClass(class)
                };
                Ok((instr, 1 + ByteClass::ENCODED_SIZE))
            }
            [Instr::SEEK, ..] => {
                let delta = Self::decode_u16(code, 1)? as i16;
                Ok((Seek(delta), ARG))
            }
            [Instr::ASSERT_START, ..] => Ok((AssertStart, 1)),
            [Instr::ASSERT_END, ..] => Ok((AssertEnd, 1)),
            [Instr::ALTERNATION, ..] => {
                let len = Self::decode_u16(code, 1)? as usize;
                let alternatives = Self::slice(code, ARG, len)?;
                Ok((Alternation(InstrParser::new(alternatives)), ARG + len))
            }
            [opcode, ..] => Err(DecodeError::UnknownOpcode(*opcode)),
            [] => Err(DecodeError::Truncated),
        }
    }

    /// Returns the code that has not been parsed yet.
    pub fn remaining(&self) -> &'a [u8] {
        self.code
    }

    fn decode_u16(code: &[u8], at: usize) -> Result<u16, DecodeError> {
        let bytes = Self::slice(code, at, size_of::<u16>())?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn slice(
        code: &[u8],
        at: usize,
        len: usize,
    ) -> Result<&[u8], DecodeError> {
        code.get(at..at + len).ok_or(DecodeError::Truncated)
    }
}

impl<'a> Iterator for InstrParser<'a> {
    type Item = Result<Instr<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.code.is_empty() {
            return None;
        }
        match InstrParser::decode_instr(self.code) {
            Ok((instr, size)) => {
                self.code = &self.code[size..];
                Some(Ok(instr))
            }
            Err(err) => {
                self.code = &[];
                Some(Err(err))
            }
        }
    }
}

/// An alternative in an alternation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alternative {
    /// A literal string.
    Literal(Vec<u8>),
    /// A literal string with a mask, both with the same length.
    Masked(Vec<u8>, Vec<u8>),
}

/// Emits the code for a confirmation automaton.
///
/// The cursor of the automaton starts at the first byte of the literal that
/// triggered it. Instructions that match bytes advance the cursor, and
/// [`AutomatonBuilder::emit_seek`] moves it in either direction. The code
/// must end with [`AutomatonBuilder::emit_match`].
///
/// ```
/// # use mpscan::AutomatonBuilder;
/// // Confirms the literal "bar" only when preceded by "foo".
/// let mut code = AutomatonBuilder::new();
/// code.emit_seek(-3);
/// code.emit_literal(b"foo");
/// code.emit_match();
/// let code = code.into_inner();
/// ```
#[derive(Default, Debug)]
pub struct AutomatonBuilder {
    seq: Vec<u8>,
}

impl AutomatonBuilder {
    /// Creates a new [`AutomatonBuilder`].
    pub fn new() -> Self {
        Self { seq: Vec::new() }
    }

    /// Consumes the [`AutomatonBuilder`] and returns the code.
    pub fn into_inner(self) -> Vec<u8> {
        self.seq
    }

    pub fn emit_match(&mut self) -> &mut Self {
        self.seq.push(Instr::MATCH);
        self
    }

    /// # Panics
    ///
    /// If the literal is longer than 65535 bytes.
    pub fn emit_literal(&mut self, literal: &[u8]) -> &mut Self {
        self.seq.push(Instr::LITERAL);
        self.emit_len(literal.len());
        self.seq.extend_from_slice(literal);
        self
    }

    /// # Panics
    ///
    /// If the literal is longer than 65535 bytes, or if the literal and the
    /// mask have different lengths.
    pub fn emit_masked_literal(
        &mut self,
        literal: &[u8],
        mask: &[u8],
    ) -> &mut Self {
        assert_eq!(literal.len(), mask.len());
        self.seq.push(Instr::MASKED_LITERAL);
        self.emit_len(literal.len());
        self.seq.extend_from_slice(literal);
        self.seq.extend_from_slice(mask);
        self
    }

    pub fn emit_class(&mut self, class: &ByteClass) -> &mut Self {
        self.seq.push(Instr::CLASS);
        self.seq.extend_from_slice(class.to_raw().as_slice());
        self
    }

    pub fn emit_not_class(&mut self, class: &ByteClass) -> &mut Self {
        self.seq.push(Instr::NOT_CLASS);
        self.seq.extend_from_slice(class.to_raw().as_slice());
        self
    }

    pub fn emit_seek(&mut self, delta: i16) -> &mut Self {
        self.seq.push(Instr::SEEK);
        self.seq.extend_from_slice(delta.to_le_bytes().as_slice());
        self
    }

    pub fn emit_assert_start(&mut self) -> &mut Self {
        self.seq.push(Instr::ASSERT_START);
        self
    }

    pub fn emit_assert_end(&mut self) -> &mut Self {
        self.seq.push(Instr::ASSERT_END);
        self
    }

    /// # Panics
    ///
    /// If the code for the alternatives exceeds 65535 bytes.
    pub fn emit_alternation(
        &mut self,
        alternatives: &[Alternative],
    ) -> &mut Self {
        // The opcode is followed by an u16 with the size of all the
        // alternatives, which is patched once the alternatives are emitted.
        self.seq.push(Instr::ALTERNATION);
        let len_location = self.seq.len();
        self.seq.extend_from_slice(&[0x00; size_of::<u16>()]);
        let alternatives_loc = self.seq.len();

        for alternative in alternatives {
            match alternative {
                Alternative::Literal(literal) => self.emit_literal(literal),
                Alternative::Masked(literal, mask) => {
                    self.emit_masked_literal(literal, mask)
                }
            };
        }

        let alternatives_len = self.seq.len() - alternatives_loc;
        let alternatives_len: u16 = alternatives_len
            .try_into()
            .expect("alternation code exceeds 65535 bytes");

        self.seq[len_location..alternatives_loc]
            .copy_from_slice(alternatives_len.to_le_bytes().as_slice());
        self
    }

    fn emit_len(&mut self, len: usize) {
        let len: u16 = len.try_into().expect("literal exceeds 65535 bytes");
        self.seq.extend_from_slice(len.to_le_bytes().as_slice());
    }
}
