#[cfg(feature = "logging")]
use std::time::Instant;

#[cfg(feature = "logging")]
use log::*;

use crate::class::ByteClass;
use crate::config::EngineConfig;
use crate::confirm::Automaton;
use crate::errors::BuildError;
use crate::literals::LiteralTable;
use crate::program::{
    AutomatonId, LiteralFlagSet, LiteralFlags, LiteralInfo, LiteralTarget,
    PatternFlagSet, PatternFlags, PatternId, PatternInfo, PatternKind,
    Program, ProgramHeader, RepeatId,
};
use crate::repeat::{Depth, RepeatDescriptor, RepeatKind};
use crate::state::StateLayout;

/// Maximum length of a literal.
pub const MAX_LITERAL_LEN: usize = 4096;

/// A literal that makes a pattern match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    bytes: Vec<u8>,
    anchored: bool,
    automaton: Option<AutomatonId>,
}

impl Literal {
    /// Creates a literal with the given bytes.
    pub fn new<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self { bytes: bytes.into(), anchored: false, automaton: None }
    }

    /// The literal only matches at the start of the stream.
    pub fn anchored(mut self) -> Self {
        self.anchored = true;
        self
    }

    /// Every occurrence of the literal must be confirmed by the given
    /// automaton.
    pub fn confirmed_by(mut self, automaton: AutomatonId) -> Self {
        self.automaton = Some(automaton);
        self
    }
}

enum PatternDef {
    Literals(Vec<Literal>),
    Repeat { class: ByteClass, min: u32, max: Depth },
}

/// Assembles a [`Program`] from pattern descriptors.
///
/// The builder doesn't parse regular expressions, it receives the pieces
/// in which some pattern compiler already decomposed each pattern: the
/// literals that make the pattern match, the bounds of bounded repeats, and
/// the code of confirmation automata.
///
/// ```
/// # use mpscan::{ByteClass, Depth, ProgramBuilder};
/// let mut builder = ProgramBuilder::new();
///
/// builder.add_literal("ab").unwrap();
/// builder.add_repeat(ByteClass::byte(b'b'), 3, Depth::new(5)).unwrap();
///
/// let program = builder.build().unwrap();
///
/// assert_eq!(program.num_patterns(), 2);
/// ```
pub struct ProgramBuilder {
    config: EngineConfig,
    header: ProgramHeader,
    patterns: Vec<(PatternDef, PatternFlagSet)>,
    automata: Vec<Automaton>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    /// Creates a new builder with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a new builder with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            header: ProgramHeader::current(),
            patterns: Vec::new(),
            automata: Vec::new(),
        }
    }

    /// Replaces the header of the program. Used for testing how programs
    /// built elsewhere are rejected.
    #[doc(hidden)]
    pub fn header(&mut self, header: ProgramHeader) -> &mut Self {
        self.header = header;
        self
    }

    /// Adds a pattern that matches a single literal.
    pub fn add_literal<B: Into<Vec<u8>>>(
        &mut self,
        bytes: B,
    ) -> Result<PatternId, BuildError> {
        self.add_literals([Literal::new(bytes)])
    }

    /// Adds a pattern that matches when any of the given literals is found.
    ///
    /// Automata referenced by the literals must have been added with
    /// [`ProgramBuilder::add_automaton`] before.
    pub fn add_literals<I: IntoIterator<Item = Literal>>(
        &mut self,
        literals: I,
    ) -> Result<PatternId, BuildError> {
        let id = PatternId::from(self.patterns.len());
        let literals: Vec<Literal> = literals.into_iter().collect();

        if literals.is_empty() {
            return Err(BuildError::NoLiterals(id));
        }

        for literal in &literals {
            if literal.bytes.is_empty() {
                return Err(BuildError::EmptyLiteral(id));
            }
            if literal.bytes.len() > MAX_LITERAL_LEN {
                return Err(BuildError::LiteralTooLong {
                    pattern: id,
                    len: literal.bytes.len(),
                    max: MAX_LITERAL_LEN,
                });
            }
            if let Some(automaton) = literal.automaton {
                if usize::from(automaton) >= self.automata.len() {
                    return Err(BuildError::UnknownAutomaton(automaton));
                }
            }
        }

        self.patterns
            .push((PatternDef::Literals(literals), PatternFlagSet::none()));

        Ok(id)
    }

    /// Adds a pattern that matches every maximal run of bytes in `class`
    /// with a length between `min` and `max`.
    pub fn add_repeat(
        &mut self,
        class: ByteClass,
        min: u32,
        max: Depth,
    ) -> Result<PatternId, BuildError> {
        let id = PatternId::from(self.patterns.len());

        if class.is_empty() {
            return Err(BuildError::EmptyClass(id));
        }

        if max == Depth::new(0) || max.value().is_some_and(|max| min > max) {
            return Err(BuildError::RepeatBounds {
                pattern: id,
                min,
                max: max.to_string(),
            });
        }

        self.patterns.push((
            PatternDef::Repeat { class, min, max },
            PatternFlagSet::none(),
        ));

        Ok(id)
    }

    /// Adds a confirmation automaton, whose code was produced with
    /// [`crate::AutomatonBuilder`].
    pub fn add_automaton(
        &mut self,
        code: Vec<u8>,
    ) -> Result<AutomatonId, BuildError> {
        let id = AutomatonId::from(self.automata.len());
        let automaton = Automaton::new(code)
            .map_err(|reason| BuildError::Automaton { id, reason })?;
        self.automata.push(automaton);
        Ok(id)
    }

    /// Sets the flags of a pattern.
    pub fn set_flags(
        &mut self,
        pattern: PatternId,
        flags: PatternFlagSet,
    ) -> Result<&mut Self, BuildError> {
        let (_, pattern_flags) = self
            .patterns
            .get_mut(usize::from(pattern))
            .ok_or(BuildError::UnknownPattern(pattern))?;
        *pattern_flags = flags;
        Ok(self)
    }

    /// Builds the program.
    pub fn build(self) -> Result<Program, BuildError> {
        #[cfg(feature = "logging")]
        let start = Instant::now();

        self.config.validate().map_err(BuildError::Config)?;

        let mut patterns = Vec::with_capacity(self.patterns.len());
        let mut literals = Vec::new();
        let mut repeats = Vec::new();

        for (i, (def, flags)) in self.patterns.into_iter().enumerate() {
            let pattern = PatternId::from(i);
            match def {
                PatternDef::Literals(defs) => {
                    for def in defs {
                        let mut literal_flags = LiteralFlagSet::none();
                        if def.anchored {
                            literal_flags.set(LiteralFlags::Anchored);
                        }
                        literals.push(LiteralInfo {
                            bytes: def.bytes,
                            target: LiteralTarget::Pattern(pattern),
                            flags: literal_flags,
                            automaton: def.automaton,
                        });
                    }
                    patterns.push(PatternInfo {
                        kind: PatternKind::Literals,
                        flags,
                    });
                }
                PatternDef::Repeat { class, min, max } => {
                    let id = RepeatId::from(repeats.len());
                    // Every byte in the class is a literal that can start a
                    // run of the repeat.
                    for b in class.iter() {
                        literals.push(LiteralInfo {
                            bytes: vec![b],
                            target: LiteralTarget::Repeat(id),
                            flags: LiteralFlagSet::none(),
                            automaton: None,
                        });
                    }
                    repeats.push(RepeatDescriptor {
                        id,
                        pattern,
                        class,
                        min,
                        max,
                        kind: RepeatKind::select(max, &self.config.repeat),
                        ranks: Vec::with_capacity(class.len()),
                    });
                    patterns.push(PatternInfo {
                        kind: PatternKind::Repeat(id),
                        flags,
                    });
                }
            }
        }

        let bytes: Vec<&[u8]> =
            literals.iter().map(|literal| literal.bytes.as_slice()).collect();

        let table = LiteralTable::new(bytes.as_slice())?;

        // Literals are pushed in increasing byte order for each repeat, so
        // the ranks end up sorted by byte.
        for (i, literal) in literals.iter().enumerate() {
            if let LiteralTarget::Repeat(id) = literal.target {
                repeats[usize::from(id)]
                    .ranks
                    .push((literal.bytes[0], table.rank(i.into())));
            }
        }

        let max_literal_len = literals
            .iter()
            .map(|literal| literal.bytes.len())
            .max()
            .unwrap_or(0);

        let mut lookbehind = 0;
        let mut lookahead = 0;

        for literal in &literals {
            if let Some(automaton) = literal.automaton {
                let reach = self.automata[usize::from(automaton)].reach();
                lookbehind = lookbehind.max(reach.lookbehind());
                lookahead =
                    lookahead.max(reach.lookahead(literal.bytes.len()));
            }
        }

        // The history must contain every byte that can be needed for
        // finding or confirming a literal that ends in a future chunk, or
        // a candidate that was deferred in the current one. Candidates are
        // deferred when they need bytes beyond the end of the chunk, or when
        // they end right at the end of the chunk.
        let history_size = (max_literal_len + lookahead + lookbehind).max(1);

        if history_size > u16::MAX as usize {
            return Err(BuildError::TooLarge("history"));
        }

        let layout = StateLayout::new(history_size, patterns.len(), &repeats);

        let checksum = checksum(
            &self.header,
            &self.config,
            &patterns,
            &literals,
            &repeats,
            &self.automata,
        );

        #[cfg(feature = "logging")]
        {
            info!("Program build time: {:?}", Instant::elapsed(&start));
            info!("Number of patterns: {}", patterns.len());
            info!("Number of literals: {}", literals.len());
            info!("Number of repeats: {}", repeats.len());
            info!("Number of automata: {}", self.automata.len());
            info!("Longest literal: {}", max_literal_len);
            info!("Lookbehind: {}, lookahead: {}", lookbehind, lookahead);
            info!("Stream state size: {}", layout.size());
        }

        Ok(Program {
            header: self.header,
            config: self.config,
            patterns,
            literals,
            table,
            repeats,
            automata: self.automata,
            max_literal_len,
            lookbehind,
            lookahead,
            layout,
            checksum,
        })
    }
}

/// Computes the CRC-32 of everything that affects the layout or the
/// interpretation of stream states.
fn checksum(
    header: &ProgramHeader,
    config: &EngineConfig,
    patterns: &[PatternInfo],
    literals: &[LiteralInfo],
    repeats: &[RepeatDescriptor],
    automata: &[Automaton],
) -> u32 {
    let mut hasher = crc32fast::Hasher::new();

    hasher.update(header.magic.as_slice());
    hasher.update(header.version.to_le_bytes().as_slice());
    hasher.update(header.platform.as_bytes());
    hasher.update(config.repeat.bitmap_limit.to_le_bytes().as_slice());
    hasher.update(config.repeat.ring_limit.to_le_bytes().as_slice());

    for pattern in patterns {
        let kind = match pattern.kind {
            PatternKind::Literals => u32::MAX,
            PatternKind::Repeat(id) => id.into(),
        };
        hasher.update(kind.to_le_bytes().as_slice());
        hasher.update(&[
            pattern.flags.contains(PatternFlags::SingleMatch) as u8,
            pattern.flags.contains(PatternFlags::NoStart) as u8,
        ]);
    }

    for literal in literals {
        hasher.update((literal.bytes.len() as u32).to_le_bytes().as_slice());
        hasher.update(literal.bytes.as_slice());
        let target = match literal.target {
            LiteralTarget::Pattern(id) => (0_u8, u32::from(id)),
            LiteralTarget::Repeat(id) => (1_u8, u32::from(id)),
        };
        hasher.update(&[target.0]);
        hasher.update(target.1.to_le_bytes().as_slice());
        hasher.update(&[literal.flags.contains(LiteralFlags::Anchored) as u8]);
        let automaton = literal.automaton.map_or(u32::MAX, u32::from);
        hasher.update(automaton.to_le_bytes().as_slice());
    }

    for repeat in repeats {
        hasher.update(repeat.class.to_raw().as_slice());
        hasher.update(repeat.min.to_le_bytes().as_slice());
        hasher.update(repeat.max.to_string().as_bytes());
        hasher.update(&[repeat.kind as u8]);
    }

    for automaton in automata {
        let len = automaton.code().len() as u32;
        hasher.update(len.to_le_bytes().as_slice());
        hasher.update(automaton.code());
    }

    hasher.finalize()
}
